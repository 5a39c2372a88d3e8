// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Personal task list kept entirely in the local key-value cache.
//!
//! The list is stored as one JSON array under a single key, loaded once,
//! and rewritten in full on every change. The in-memory copy is only
//! replaced after the write succeeds.

use crate::db::KeyValueStore;
use crate::error::{AppError, Result};
use crate::models::Task;
use crate::time_utils::{format_utc_rfc3339, now_rfc3339};
use chrono::DateTime;
use std::sync::Arc;

/// Cache key holding the serialized list.
pub const TASKS_KEY: &str = "tasks";

/// Locally persisted personal task list.
pub struct LocalTaskList {
    cache: Arc<dyn KeyValueStore>,
    tasks: Vec<Task>,
}

impl LocalTaskList {
    /// Load the list from the cache. A missing key is an empty list.
    pub async fn load(cache: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut tasks: Vec<Task> = match cache.get(TASKS_KEY).await? {
            Some(blob) => serde_json::from_str(&blob)
                .map_err(|e| AppError::Database(format!("Stored task list is corrupt: {}", e)))?,
            None => Vec::new(),
        };
        for task in tasks.iter_mut().filter(|t| t.created_at.is_empty()) {
            task.created_at = legacy_created_at(&task.id).unwrap_or_default();
        }

        let mut list = Self { cache, tasks };
        list.sort();
        tracing::debug!(count = list.tasks.len(), "Local task list loaded");
        Ok(list)
    }

    /// Tasks, newest first. Entries with no known creation time come last,
    /// in stored order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    fn sort(&mut self) {
        self.tasks
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Persist `next` and adopt it as the current list.
    async fn commit(&mut self, mut next: Vec<Task>) -> Result<()> {
        next.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let blob = serde_json::to_string(&next).map_err(|e| AppError::Internal(e.into()))?;
        self.cache.set(TASKS_KEY, blob).await?;
        self.tasks = next;
        Ok(())
    }

    pub async fn add(&mut self, title: &str, description: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::validation("Task title must not be empty"));
        }

        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.trim().to_string(),
            completed: false,
            team_id: None,
            owner: None,
            created_at: now_rfc3339(),
        };
        let task_id = task.id.clone();

        let mut next = self.tasks.clone();
        next.push(task);
        self.commit(next).await?;

        tracing::info!(task_id = %task_id, "Local task added");
        Ok(task_id)
    }

    /// Flip completion of a task. Returns the new value.
    pub async fn toggle(&mut self, task_id: &str) -> Result<bool> {
        let mut next = self.tasks.clone();
        let task = next
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))?;
        task.completed = !task.completed;
        let completed = task.completed;

        self.commit(next).await?;
        Ok(completed)
    }

    /// Remove a task. Removing a task that is not in the list succeeds.
    pub async fn delete(&mut self, task_id: &str) -> Result<()> {
        if self.get(task_id).is_none() {
            return Ok(());
        }
        let next = self
            .tasks
            .iter()
            .filter(|t| t.id != task_id)
            .cloned()
            .collect();
        self.commit(next).await
    }
}

/// Older lists stored no timestamp but used the creation time in
/// milliseconds as the id.
fn legacy_created_at(id: &str) -> Option<String> {
    let millis = id.parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(millis).map(format_utc_rfc3339)
}
