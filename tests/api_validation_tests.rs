// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation and access control for task and team routes.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{authed, body_json};

#[tokio::test]
async fn test_blank_task_title_rejected() {
    let (app, state, _) = common::create_test_app();
    let token = common::registered_user(&state, "alice").await;

    let response = app
        .oneshot(authed(
            "POST",
            "/api/tasks",
            &token,
            Some(json!({ "title": "   " })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn test_invalid_username_rejected() {
    let (app, state, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed(
            "POST",
            "/api/me/username",
            &token,
            Some(json!({ "username": "no spaces allowed" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_taken_username_is_conflict() {
    let (app, state, _) = common::create_test_app();
    common::registered_user(&state, "alice").await;
    let token = common::create_test_jwt("acct-2", &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed(
            "POST",
            "/api/me/username",
            &token,
            Some(json!({ "username": "alice" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_personal_task_round_trip() {
    let (app, state, _) = common::create_test_app();
    let token = common::registered_user(&state, "alice").await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/tasks",
            &token,
            Some(json!({ "title": "Pay rent", "description": "before Friday" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            &format!("/api/tasks/{}/toggle", id),
            &token,
            Some(json!({ "completed": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["completed"], true);

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/tasks", &token, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["tasks"][0]["title"], "Pay rent");
    assert_eq!(body["tasks"][0]["completed"], true);
    assert_eq!(body["tasks"][0]["owner"], "alice");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed("DELETE", &format!("/api/tasks/{}", id), &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn test_personal_tasks_are_private() {
    let (app, state, _) = common::create_test_app();
    let alice = common::registered_user(&state, "alice").await;
    let bob = common::registered_user(&state, "bob").await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/tasks",
            &alice,
            Some(json!({ "title": "Secret" })),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/tasks", &bob, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["tasks"], json!([]));

    let response = app
        .oneshot(authed("DELETE", &format!("/api/tasks/{}", id), &bob, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_team_flow_and_membership_gate() {
    let (app, state, _) = common::create_test_app();
    let alice = common::registered_user(&state, "alice").await;
    let bob = common::registered_user(&state, "bob").await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/teams",
            &alice,
            Some(json!({ "name": "Flatmates" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let team_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let tasks_uri = format!("/api/teams/{}/tasks", team_id);

    // Not a member yet.
    let response = app
        .clone()
        .oneshot(authed("GET", &tasks_uri, &bob, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            &format!("/api/teams/{}/join", team_id),
            &bob,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let joined = body_json(response).await;
    assert_eq!(joined["team_name"], "Flatmates");
    assert_eq!(joined["already_member"], false);

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            &tasks_uri,
            &bob,
            Some(json!({ "title": "Buy bin bags" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(authed("GET", &tasks_uri, &alice, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["tasks"][0]["title"], "Buy bin bags");
    assert_eq!(body["tasks"][0]["team_id"], team_id.as_str());

    let response = app
        .clone()
        .oneshot(authed(
            "GET",
            &format!("/api/teams/{}/members", team_id),
            &alice,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await["members"],
        json!(["alice", "bob"])
    );

    let response = app
        .oneshot(authed("GET", "/api/teams", &bob, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["teams"][0]["id"], team_id.as_str());
}

#[tokio::test]
async fn test_join_unknown_team_is_not_found() {
    let (app, state, _) = common::create_test_app();
    let token = common::registered_user(&state, "alice").await;

    let response = app
        .oneshot(authed("POST", "/api/teams/does-not-exist/join", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rename_over_http_moves_membership() {
    let (app, state, _) = common::create_test_app();
    let token = common::registered_user(&state, "alice").await;

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/teams",
            &token,
            Some(json!({ "name": "Book club" })),
        ))
        .await
        .unwrap();
    let team_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(authed(
            "PUT",
            "/api/me/username",
            &token,
            Some(json!({ "username": "alicia" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "alicia");

    // Same token, new identity, still a member.
    let response = app
        .oneshot(authed(
            "GET",
            &format!("/api/teams/{}/members", team_id),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["members"], json!(["alicia"]));
}

#[tokio::test]
async fn test_backend_outage_is_database_error() {
    let (app, state, store) = common::create_test_app();
    let token = common::registered_user(&state, "alice").await;
    store.set_offline(true);

    let response = app
        .oneshot(authed("GET", "/api/me", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "database_error");
}
