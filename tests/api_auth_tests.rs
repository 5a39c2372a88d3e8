// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Sign-up and sign-in issue tokens the API accepts
//! 3. Task and team routes require a registered username
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/tasks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(common::authed("GET", "/api/me", "invalid.token.here", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_key_rejected() {
    let (app, _, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-1", b"some_other_key_that_is_32_bytes!");

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_valid_token_and_no_username() {
    let (app, state, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["account_id"], "acct-1");
    assert!(body["username"].is_null());
}

#[tokio::test]
async fn test_task_routes_require_username() {
    let (app, state, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-1", &state.config.jwt_signing_key);

    let response = app
        .oneshot(common::authed("GET", "/api/teams", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_signup_signin_and_register_flow() {
    let (app, _, _) = common::create_test_app();
    let credentials = json!({ "email": "Ada@Example.com", "password": "hunter22" });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth/signup", credentials.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    let signup = common::body_json(response).await;

    // Email is matched case-insensitively
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signin",
            json!({ "email": "ada@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let signin = common::body_json(response).await;
    assert_eq!(signin["account_id"], signup["account_id"]);
    let token = signin["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(common::authed(
            "POST",
            "/api/me/username",
            &token,
            Some(json!({ "username": "ada" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(common::authed("GET", "/api/me", &token, None))
        .await
        .unwrap();
    let me = common::body_json(response).await;
    assert_eq!(me["username"], "ada");
}

#[tokio::test]
async fn test_signin_failures_are_indistinguishable() {
    let (app, _, _) = common::create_test_app();

    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            json!({ "email": "bob@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();

    let wrong_password = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/signin",
            json!({ "email": "bob@example.com", "password": "nope-nope" }),
        ))
        .await
        .unwrap();
    let unknown_email = app
        .oneshot(json_request(
            "POST",
            "/auth/signin",
            json!({ "email": "nobody@example.com", "password": "hunter22" }),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        common::body_json(wrong_password).await,
        common::body_json(unknown_email).await
    );
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let (app, state, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-9", &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/me")
                .header(header::COOKIE, format!("teamtodo_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stale_cookie_falls_back_to_bearer_token() {
    let (app, state, _) = common::create_test_app();
    let token = common::create_test_jwt("acct-9", &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/me")
                .header(header::COOKIE, "teamtodo_token=expired.session.token")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stale_cookie_without_header_is_rejected() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/me")
                .header(header::COOKIE, "teamtodo_token=expired.session.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signout_clears_cookie() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/signout")
                .header(header::COOKIE, "teamtodo_token=some.session.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("teamtodo_token="));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/tasks")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
