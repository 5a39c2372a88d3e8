// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team membership: create, join by id, list teams and members.

use crate::db::{collections, to_fields, Direction, DocumentStore, Filter, Query};
use crate::error::{AppError, Result};
use crate::models::{Identity, Team};
use crate::time_utils::now_rfc3339;
use serde_json::Value;
use std::sync::Arc;

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub team_name: String,
    /// The caller was a member before the request; nothing was written.
    pub already_member: bool,
}

/// Team membership manager.
#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn DocumentStore>,
}

impl TeamService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a team whose only member is `creator`. Returns the team id,
    /// which is also the token others use to join.
    pub async fn create_team(&self, name: &str, creator: &Identity) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Team name must not be empty"));
        }

        let team = Team {
            id: String::new(),
            name: name.to_string(),
            members: vec![creator.to_string()],
            created_at: now_rfc3339(),
        };
        let team_id = self
            .store
            .insert(collections::TEAMS, to_fields(&team)?)
            .await?;

        tracing::info!(team_id = %team_id, creator = %creator, "Team created");
        Ok(team_id)
    }

    /// Fetch a team by id.
    pub async fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        self.store
            .get(collections::TEAMS, team_id)
            .await?
            .map(|doc| doc.into_model())
            .transpose()
    }

    async fn existing_team(&self, team_id: &str) -> Result<Team> {
        self.get_team(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Team {} does not exist", team_id)))
    }

    /// Join a team by id. Joining a team you already belong to succeeds
    /// without writing.
    pub async fn join_team(&self, team_id: &str, identity: &Identity) -> Result<JoinOutcome> {
        let team_id = team_id.trim();
        if team_id.is_empty() {
            return Err(AppError::validation("Team id must not be empty"));
        }

        let team = self.existing_team(team_id).await?;
        if team.has_member(identity.as_str()) {
            tracing::debug!(team_id, username = %identity, "Already a team member");
            return Ok(JoinOutcome {
                team_name: team.name,
                already_member: true,
            });
        }

        // Set-union on the backend: concurrent joins never duplicate a name.
        self.store
            .array_union(
                collections::TEAMS,
                team_id,
                "members",
                Value::String(identity.to_string()),
            )
            .await?;

        tracing::info!(team_id, username = %identity, "Joined team");
        Ok(JoinOutcome {
            team_name: team.name,
            already_member: false,
        })
    }

    /// Teams the identity belongs to, newest first.
    pub async fn list_my_teams(&self, identity: &Identity) -> Result<Vec<Team>> {
        let query = Query::new(collections::TEAMS)
            .filter(Filter::array_contains("members", identity.as_str()))
            .order_by("created_at", Direction::Descending);

        self.store
            .query(&query)
            .await?
            .into_iter()
            .map(|doc| doc.into_model())
            .collect()
    }

    /// Current members of a team.
    pub async fn list_members(&self, team_id: &str) -> Result<Vec<String>> {
        Ok(self.existing_team(team_id).await?.members)
    }

    /// Load a team and check that `identity` belongs to it.
    pub async fn require_member(&self, team_id: &str, identity: &Identity) -> Result<Team> {
        let team = self.existing_team(team_id).await?;
        if !team.has_member(identity.as_str()) {
            return Err(AppError::Forbidden(format!(
                "{} is not a member of team {}",
                identity, team_id
            )));
        }
        Ok(team)
    }
}
