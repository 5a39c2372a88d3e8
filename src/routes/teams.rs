// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team routes: membership and the shared task list of each team.
//!
//! Everything below a team id, except joining, is limited to members.

use crate::error::Result;
use crate::models::{Identity, Scope, Team};
use crate::routes::api::{
    snapshot_events, CreatedResponse, NewTaskRequest, TasksResponse, ToggleRequest,
    ToggleResponse,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/teams", get(list_teams).post(create_team))
        .route("/api/teams/{team_id}/join", post(join_team))
        .route("/api/teams/{team_id}/members", get(list_members))
        .route(
            "/api/teams/{team_id}/tasks",
            get(list_team_tasks).post(add_team_task),
        )
        .route("/api/teams/{team_id}/tasks/stream", get(stream_team_tasks))
        .route(
            "/api/teams/{team_id}/tasks/{task_id}/toggle",
            post(toggle_team_task),
        )
        .route(
            "/api/teams/{team_id}/tasks/{task_id}",
            delete(delete_team_task),
        )
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamsResponse {
    pub teams: Vec<Team>,
}

async fn list_teams(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<TeamsResponse>> {
    let teams = state.teams.list_my_teams(&identity).await?;
    Ok(Json(TeamsResponse { teams }))
}

#[derive(Deserialize)]
pub struct NewTeamRequest {
    pub name: String,
}

/// Create a team. The returned id doubles as the invite code.
async fn create_team(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<NewTeamRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let id = state.teams.create_team(&body.name, &identity).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct JoinResponse {
    pub team_name: String,
    pub already_member: bool,
}

async fn join_team(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<String>,
) -> Result<Json<JoinResponse>> {
    let outcome = state.teams.join_team(&team_id, &identity).await?;
    Ok(Json(JoinResponse {
        team_name: outcome.team_name,
        already_member: outcome.already_member,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MembersResponse {
    pub members: Vec<String>,
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<String>,
) -> Result<Json<MembersResponse>> {
    let team = state.teams.require_member(&team_id, &identity).await?;
    Ok(Json(MembersResponse {
        members: team.members,
    }))
}

// ─── Team Tasks ──────────────────────────────────────────────

/// Check membership and return the team's task scope.
async fn member_scope(state: &AppState, team_id: &str, identity: &Identity) -> Result<Scope> {
    let team = state.teams.require_member(team_id, identity).await?;
    Ok(Scope::Team(team.id))
}

async fn list_team_tasks(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<String>,
) -> Result<Json<TasksResponse>> {
    let scope = member_scope(&state, &team_id, &identity).await?;
    let tasks = state.tasks.list_tasks(&scope).await?;
    Ok(Json(TasksResponse { tasks }))
}

async fn add_team_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<String>,
    Json(body): Json<NewTaskRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let scope = member_scope(&state, &team_id, &identity).await?;
    let id = state
        .tasks
        .add_task(&scope, &body.title, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn toggle_team_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((team_id, task_id)): Path<(String, String)>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>> {
    let scope = member_scope(&state, &team_id, &identity).await?;
    let completed = state
        .tasks
        .toggle_completion(&scope, &task_id, body.completed)
        .await?;
    Ok(Json(ToggleResponse { completed }))
}

async fn delete_team_task(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((team_id, task_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let scope = member_scope(&state, &team_id, &identity).await?;
    state.tasks.delete_task(&scope, &task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stream_team_tasks(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(team_id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let scope = member_scope(&state, &team_id, &identity).await?;
    let subscription = state.tasks.watch_tasks(&scope);
    Ok(Sse::new(snapshot_events(subscription)).keep_alive(KeepAlive::default()))
}
