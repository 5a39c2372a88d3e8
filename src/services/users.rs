// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Username registry: registration, lookup and the atomic rename.
//!
//! Uniqueness is checked by querying before writing. There is no backend
//! constraint, so two concurrent registrations of the same name can both
//! succeed.

use crate::db::{
    collections, to_fields, Direction, Document, DocumentStore, Filter, Query, WriteBatch,
    MAX_BATCH_WRITES,
};
use crate::error::{AppError, Result};
use crate::models::{Identity, UserRecord};
use crate::time_utils::now_rfc3339;
use serde_json::Value;
use std::sync::Arc;

/// Username directory over the `users` collection.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn records_named(&self, username: &str) -> Result<Vec<Document>> {
        let query = Query::new(collections::USERS).filter(Filter::eq("username", username));
        self.store.query(&query).await
    }

    /// True if any user record carries exactly this name.
    pub async fn is_taken(&self, username: &str) -> Result<bool> {
        Ok(!self.records_named(username).await?.is_empty())
    }

    /// Register a new username, optionally linked to an account.
    pub async fn register(&self, candidate: &str, account_id: Option<&str>) -> Result<Identity> {
        let identity = Identity::parse(candidate)?;

        if self.is_taken(identity.as_str()).await? {
            return Err(AppError::Conflict(format!(
                "Username {} is already taken",
                identity
            )));
        }

        if let Some(account_id) = account_id {
            if let Some(existing) = self.identity_for_account(account_id).await? {
                return Err(AppError::Conflict(format!(
                    "Account already registered as {}",
                    existing
                )));
            }
        }

        let record = UserRecord {
            id: String::new(),
            username: identity.to_string(),
            account_id: account_id.map(str::to_string),
            created_at: now_rfc3339(),
        };
        self.store
            .insert(collections::USERS, to_fields(&record)?)
            .await?;

        tracing::info!(username = %identity, "Username registered");
        Ok(identity)
    }

    /// Username linked to an account, if one was registered.
    pub async fn identity_for_account(&self, account_id: &str) -> Result<Option<Identity>> {
        let query = Query::new(collections::USERS)
            .filter(Filter::eq("account_id", account_id))
            .order_by("created_at", Direction::Descending);

        let Some(doc) = self.store.query(&query).await?.into_iter().next() else {
            return Ok(None);
        };
        let record: UserRecord = doc.into_model()?;
        Identity::parse(&record.username).map(Some)
    }

    /// Rename `current` to `candidate`.
    ///
    /// Everything keyed by the display name moves in one atomic batch: the
    /// user records, membership in every team, and personal task ownership.
    /// On any error nothing has been written.
    pub async fn rename(&self, current: &Identity, candidate: &str) -> Result<Identity> {
        let new_identity = Identity::parse(candidate)?;
        if new_identity == *current {
            return Err(AppError::validation("New username is the same as the current one"));
        }

        if self.is_taken(new_identity.as_str()).await? {
            return Err(AppError::Conflict(format!(
                "Username {} is already taken",
                new_identity
            )));
        }

        let user_docs = self.records_named(current.as_str()).await?;
        if user_docs.is_empty() {
            return Err(AppError::NotFound(format!(
                "No user record for {}",
                current
            )));
        }

        let new_name = Value::String(new_identity.to_string());
        let mut batch = WriteBatch::new();

        for doc in &user_docs {
            batch.update(collections::USERS, &doc.id, single_field("username", new_name.clone()));
        }

        // Membership is edited with array transforms rather than rewritten,
        // so a join that lands while the rename is in flight is kept.
        let team_query = Query::new(collections::TEAMS)
            .filter(Filter::array_contains("members", current.as_str()));
        for doc in self.store.query(&team_query).await? {
            batch.array_union(collections::TEAMS, &doc.id, "members", new_name.clone());
            batch.array_remove(
                collections::TEAMS,
                &doc.id,
                "members",
                Value::String(current.to_string()),
            );
        }

        let task_query = Query::new(collections::PERSONAL_TASKS)
            .filter(Filter::eq("owner", current.as_str()));
        for doc in self.store.query(&task_query).await? {
            batch.update(
                collections::PERSONAL_TASKS,
                &doc.id,
                single_field("owner", new_name.clone()),
            );
        }

        if batch.len() > MAX_BATCH_WRITES {
            return Err(AppError::BadRequest(format!(
                "Rename touches {} records; at most {} can be updated atomically",
                batch.len(),
                MAX_BATCH_WRITES
            )));
        }

        let writes = batch.len();
        self.store.commit(batch).await?;

        tracing::info!(
            old = %current,
            new = %new_identity,
            writes,
            "Username renamed"
        );
        Ok(new_identity)
    }
}

fn single_field(name: &str, value: Value) -> serde_json::Map<String, Value> {
    let mut fields = serde_json::Map::new();
    fields.insert(name.to_string(), value);
    fields
}
