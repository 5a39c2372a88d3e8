// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task model (team and personal variants).

use crate::db::collections;
use crate::models::Identity;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    /// Owning team (team tasks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// Owning display name (personal tasks only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// When the task was created (RFC3339). Empty for local entries written
    /// before timestamps were stored.
    #[serde(default)]
    pub created_at: String,
}

/// Partition a task belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Team(String),
    Personal(Identity),
}

impl Scope {
    pub fn collection(&self) -> &'static str {
        match self {
            Scope::Team(_) => collections::TASKS,
            Scope::Personal(_) => collections::PERSONAL_TASKS,
        }
    }

    /// Field holding the partition key.
    pub fn key_field(&self) -> &'static str {
        match self {
            Scope::Team(_) => "team_id",
            Scope::Personal(_) => "owner",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Scope::Team(team_id) => team_id,
            Scope::Personal(identity) => identity.as_str(),
        }
    }

    /// True if the task belongs to this scope.
    pub fn owns(&self, task: &Task) -> bool {
        let owner = match self {
            Scope::Team(_) => task.team_id.as_deref(),
            Scope::Personal(_) => task.owner.as_deref(),
        };
        owner == Some(self.key())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Team(team_id) => write!(f, "team:{}", team_id),
            Scope::Personal(identity) => write!(f, "user:{}", identity),
        }
    }
}
