// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side identity: the cached display name and the username flows
//! that keep it in sync with the backend.

use crate::db::KeyValueStore;
use crate::error::{AppError, Result};
use crate::models::Identity;
use crate::services::{Session, UserDirectory};
use std::sync::Arc;
use tokio::sync::watch;

/// Cache key for the current display name.
pub const CURRENT_USERNAME_KEY: &str = "currentAppUsername";

/// Resolves who the caller is.
///
/// The cached display name wins. Without one, an active session is mapped
/// to the username registered for its account, and the result is cached.
#[derive(Clone)]
pub struct IdentityResolver {
    cache: Arc<dyn KeyValueStore>,
    users: UserDirectory,
    session: Option<watch::Receiver<Option<Session>>>,
}

impl IdentityResolver {
    pub fn new(cache: Arc<dyn KeyValueStore>, users: UserDirectory) -> Self {
        Self {
            cache,
            users,
            session: None,
        }
    }

    /// Also derive identity from the given session feed.
    pub fn with_session(mut self, session: watch::Receiver<Option<Session>>) -> Self {
        self.session = Some(session);
        self
    }

    /// Current identity, or `None` when the user has not registered yet.
    pub async fn current_identity(&self) -> Result<Option<Identity>> {
        if let Some(cached) = self.cache.get(CURRENT_USERNAME_KEY).await? {
            match Identity::parse(&cached) {
                Ok(identity) => return Ok(Some(identity)),
                Err(_) => {
                    tracing::warn!(cached = %cached, "Discarding invalid cached username");
                    self.cache.remove(CURRENT_USERNAME_KEY).await?;
                }
            }
        }

        let account_id = self
            .session
            .as_ref()
            .and_then(|rx| rx.borrow().as_ref().map(|s| s.account_id.clone()));
        let Some(account_id) = account_id else {
            return Ok(None);
        };

        let identity = self.users.identity_for_account(&account_id).await?;
        if let Some(identity) = &identity {
            self.remember(identity).await?;
        }
        Ok(identity)
    }

    /// Current identity, failing fast when there is none.
    pub async fn require_identity(&self) -> Result<Identity> {
        self.current_identity()
            .await?
            .ok_or_else(|| AppError::validation("Register a username first"))
    }

    pub async fn remember(&self, identity: &Identity) -> Result<()> {
        self.cache
            .set(CURRENT_USERNAME_KEY, identity.to_string())
            .await
    }

    pub async fn forget(&self) -> Result<()> {
        self.cache.remove(CURRENT_USERNAME_KEY).await
    }
}

/// Username registration and rename, keeping the local cache consistent
/// with the backend.
#[derive(Clone)]
pub struct ProfileService {
    users: UserDirectory,
    resolver: IdentityResolver,
}

impl ProfileService {
    pub fn new(users: UserDirectory, resolver: IdentityResolver) -> Self {
        Self { users, resolver }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Register a username and make it the current identity.
    pub async fn register_username(
        &self,
        candidate: &str,
        account_id: Option<&str>,
    ) -> Result<Identity> {
        let identity = self.users.register(candidate, account_id).await?;
        self.resolver.remember(&identity).await?;
        Ok(identity)
    }

    /// Rename the current identity.
    ///
    /// The cache is updated only after the backend batch commits. If the
    /// backend has no record for the current name, the cached name is
    /// cleared so the user is sent back to registration.
    pub async fn change_username(&self, candidate: &str) -> Result<Identity> {
        let current = self
            .resolver
            .current_identity()
            .await?
            .ok_or_else(|| AppError::validation("Current username is unknown; register first"))?;

        match self.users.rename(&current, candidate).await {
            Ok(renamed) => {
                self.resolver.remember(&renamed).await?;
                Ok(renamed)
            }
            Err(AppError::NotFound(msg)) => {
                tracing::warn!(username = %current, "User record missing, clearing cached username");
                self.resolver.forget().await?;
                Err(AppError::NotFound(msg))
            }
            Err(e) => Err(e),
        }
    }
}
