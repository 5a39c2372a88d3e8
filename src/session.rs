// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session state for a single signed-in user.
//!
//! Holds the current [`Session`], persists its token in the local cache and
//! publishes every transition through a `watch` channel. A new subscriber
//! immediately sees the current value, including the session restored at
//! startup (or `None`).

use crate::db::KeyValueStore;
use crate::error::Result;
use crate::services::auth::{AuthService, Credentials, Session};
use std::sync::Arc;
use tokio::sync::watch;

/// Cache key for the session token.
pub const SESSION_TOKEN_KEY: &str = "sessionToken";

pub struct SessionManager {
    auth: AuthService,
    cache: Arc<dyn KeyValueStore>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionManager {
    pub fn new(auth: AuthService, cache: Arc<dyn KeyValueStore>) -> Self {
        let (tx, _) = watch::channel(None);
        Self { auth, cache, tx }
    }

    /// Restore the session from the cached token.
    ///
    /// An expired or tampered token is dropped from the cache.
    pub async fn restore(&self) -> Result<Option<Session>> {
        let session = match self.cache.get(SESSION_TOKEN_KEY).await? {
            Some(token) => match self.auth.verify(&token) {
                Ok(session) => Some(session),
                Err(_) => {
                    tracing::info!("Cached session token is no longer valid");
                    self.cache.remove(SESSION_TOKEN_KEY).await?;
                    None
                }
            },
            None => None,
        };

        self.publish(session.clone());
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .auth
            .sign_in(&Credentials::new(email, password))
            .await?;
        self.start(session).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .auth
            .sign_up(&Credentials::new(email, password))
            .await?;
        self.start(session).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.cache.remove(SESSION_TOKEN_KEY).await?;
        self.publish(None);
        Ok(())
    }

    async fn start(&self, session: Session) -> Result<Session> {
        self.cache
            .set(SESSION_TOKEN_KEY, session.token.clone())
            .await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    fn publish(&self, session: Option<Session>) {
        tracing::debug!(
            account_id = session.as_ref().map(|s| s.account_id.as_str()),
            "Session changed"
        );
        self.tx.send_replace(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every session transition.
    pub fn on_session_change(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
