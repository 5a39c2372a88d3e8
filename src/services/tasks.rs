// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task store for team and personal tasks.
//!
//! Every operation is scoped: a task id is only visible through the scope
//! that owns it. Listings are newest first for both scopes.

use crate::db::{to_fields, Direction, DocumentStore, Filter, Query, Subscription};
use crate::error::{AppError, Result};
use crate::models::{Scope, Task};
use crate::time_utils::now_rfc3339;
use futures_util::Stream;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Shared and personal task store.
#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn DocumentStore>,
}

fn scope_query(scope: &Scope) -> Query {
    Query::new(scope.collection())
        .filter(Filter::eq(scope.key_field(), scope.key()))
        .order_by("created_at", Direction::Descending)
}

impl TaskStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a task in `scope`. The title must be non-empty after trimming.
    pub async fn add_task(&self, scope: &Scope, title: &str, description: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("Task title must not be empty"));
        }

        let (team_id, owner) = match scope {
            Scope::Team(team_id) => (Some(team_id.clone()), None),
            Scope::Personal(identity) => (None, Some(identity.to_string())),
        };
        let task = Task {
            id: String::new(),
            title: title.to_string(),
            description: description.trim().to_string(),
            completed: false,
            team_id,
            owner,
            created_at: now_rfc3339(),
        };

        let task_id = self
            .store
            .insert(scope.collection(), to_fields(&task)?)
            .await?;

        tracing::info!(task_id = %task_id, scope = %scope, "Task added");
        Ok(task_id)
    }

    /// All tasks in `scope`, newest first.
    pub async fn list_tasks(&self, scope: &Scope) -> Result<Vec<Task>> {
        self.store
            .query(&scope_query(scope))
            .await?
            .into_iter()
            .map(|doc| doc.into_model())
            .collect()
    }

    /// Load a task and check it belongs to `scope`.
    async fn scoped_task(&self, scope: &Scope, task_id: &str) -> Result<Option<Task>> {
        let Some(doc) = self.store.get(scope.collection(), task_id).await? else {
            return Ok(None);
        };
        let task: Task = doc.into_model()?;
        if !scope.owns(&task) {
            return Err(AppError::NotFound(format!("Task {} not found", task_id)));
        }
        Ok(Some(task))
    }

    /// Write `completed = !current`.
    ///
    /// `current` is the value the caller last observed. There is no
    /// concurrency token: if someone else flipped the task in between, the
    /// last write wins. Returns the value written.
    pub async fn toggle_completion(
        &self,
        scope: &Scope,
        task_id: &str,
        current: bool,
    ) -> Result<bool> {
        if self.scoped_task(scope, task_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Task {} not found", task_id)));
        }

        let completed = !current;
        let mut fields = serde_json::Map::new();
        fields.insert("completed".to_string(), Value::Bool(completed));
        self.store
            .update(scope.collection(), task_id, fields)
            .await?;

        tracing::info!(task_id, scope = %scope, completed, "Task completion toggled");
        Ok(completed)
    }

    /// Delete a task. Deleting a task that no longer exists succeeds.
    pub async fn delete_task(&self, scope: &Scope, task_id: &str) -> Result<()> {
        if self.scoped_task(scope, task_id).await?.is_none() {
            tracing::debug!(task_id, scope = %scope, "Task already deleted");
            return Ok(());
        }

        self.store.delete(scope.collection(), task_id).await?;
        tracing::info!(task_id, scope = %scope, "Task deleted");
        Ok(())
    }

    /// Live view of the tasks in `scope`.
    pub fn watch_tasks(&self, scope: &Scope) -> TaskSubscription {
        tracing::debug!(scope = %scope, "Task subscription started");
        TaskSubscription {
            inner: self.store.subscribe(scope_query(scope)),
        }
    }
}

/// Stream of task list snapshots. Dropping it ends the subscription.
pub struct TaskSubscription {
    inner: Subscription,
}

impl TaskSubscription {
    pub async fn next(&mut self) -> Option<Result<Vec<Task>>> {
        self.inner.next().await.map(decode_snapshot)
    }
}

fn decode_snapshot(snapshot: Result<Vec<crate::db::Document>>) -> Result<Vec<Task>> {
    snapshot?.into_iter().map(|doc| doc.into_model()).collect()
}

impl Stream for TaskSubscription {
    type Item = Result<Vec<Task>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_next(cx)
            .map(|item| item.map(decode_snapshot))
    }
}

/// JSON payload for a snapshot, as pushed to live clients.
pub fn snapshot_json(tasks: &[Task]) -> Value {
    json!({ "tasks": tasks })
}
