// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password sign-up, sign-in and sign-out.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::SESSION_COOKIE;
use crate::services::auth::{Credentials, Session};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
}

/// Session handed to the client after sign-up or sign-in.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub account_id: String,
    pub token: String,
    pub expires_at: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            account_id: session.account_id,
            token: session.token,
            expires_at: session.expires_at,
        }
    }
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    // Plain http only for local development.
    let secure = !state.config.frontend_url.starts_with("http://");
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let session = state.auth.sign_up(&credentials).await?;
    let jar = jar.add(session_cookie(&state, session.token.clone()));
    Ok((StatusCode::CREATED, jar, Json(session.into())))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state.auth.sign_in(&credentials).await?;
    let jar = jar.add(session_cookie(&state, session.token.clone()));
    Ok((jar, Json(session.into())))
}

/// Clear the session cookie. Bearer-token clients just drop their token.
async fn sign_out(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}
