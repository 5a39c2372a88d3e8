// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: profile, username and personal tasks.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Identity, Scope, Task};
use crate::services::tasks::snapshot_json;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Routes that need a valid session but no username.
pub fn me_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route(
            "/api/me/username",
            post(register_username).put(change_username),
        )
}

/// Personal task routes. The caller's [`Identity`] is resolved by middleware.
pub fn task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(add_task))
        .route("/api/tasks/stream", get(stream_tasks))
        .route("/api/tasks/{task_id}/toggle", post(toggle_task))
        .route("/api/tasks/{task_id}", axum::routing::delete(delete_task))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub account_id: String,
    /// `None` until a username is registered
    pub username: Option<String>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let username = state
        .users
        .identity_for_account(&user.account_id)
        .await?
        .map(|identity| identity.to_string());

    Ok(Json(MeResponse {
        account_id: user.account_id,
        username,
    }))
}

#[derive(Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UsernameResponse {
    pub username: String,
}

async fn register_username(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UsernameRequest>,
) -> Result<(StatusCode, Json<UsernameResponse>)> {
    let identity = state
        .users
        .register(&body.username, Some(&user.account_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UsernameResponse {
            username: identity.to_string(),
        }),
    ))
}

/// Rename the caller. Team memberships and personal tasks move with them.
async fn change_username(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UsernameRequest>,
) -> Result<Json<UsernameResponse>> {
    let current = state
        .users
        .identity_for_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::validation("Register a username first"))?;

    let renamed = state.users.rename(&current, &body.username).await?;
    Ok(Json(UsernameResponse {
        username: renamed.to_string(),
    }))
}

// ─── Tasks ───────────────────────────────────────────────────

/// Body for creating a task (personal or team).
#[derive(Deserialize)]
pub struct NewTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatedResponse {
    pub id: String,
}

/// Body for a completion toggle: the state the client last saw.
#[derive(Deserialize)]
pub struct ToggleRequest {
    pub completed: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ToggleResponse {
    pub completed: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<TasksResponse>> {
    let tasks = state.tasks.list_tasks(&Scope::Personal(identity)).await?;
    Ok(Json(TasksResponse { tasks }))
}

async fn add_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .tasks
        .add_task(&Scope::Personal(identity), &body.title, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>> {
    let completed = state
        .tasks
        .toggle_completion(&Scope::Personal(identity), &task_id, body.completed)
        .await?;
    Ok(Json(ToggleResponse { completed }))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> Result<StatusCode> {
    state
        .tasks
        .delete_task(&Scope::Personal(identity), &task_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Live personal task list as server-sent events.
///
/// Every snapshot is a `tasks` event carrying the full list. A backend
/// failure is reported as an `error` event; the stream stays open.
async fn stream_tasks(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let scope = Scope::Personal(identity);
    let subscription = state.tasks.watch_tasks(&scope);
    Sse::new(snapshot_events(subscription)).keep_alive(KeepAlive::default())
}

/// Map task snapshots to SSE events.
pub(crate) fn snapshot_events(
    subscription: crate::services::TaskSubscription,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    subscription.map(|snapshot| {
        let event = match snapshot {
            Ok(tasks) => Event::default()
                .event("tasks")
                .json_data(snapshot_json(&tasks))
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
            Err(e) => {
                tracing::warn!(error = %e, "Task subscription error");
                Event::default().event("error").data(e.to_string())
            }
        };
        Ok(event)
    })
}
