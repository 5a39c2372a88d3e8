// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A named group sharing one task list.
///
/// Membership is embedded as a list of display names. Anyone holding the
/// team id can join; members are never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Team {
    /// Document id, also the join token
    pub id: String,
    pub name: String,
    /// Display names of members (set semantics)
    pub members: Vec<String>,
    /// When the team was created (RFC3339)
    pub created_at: String,
}

impl Team {
    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }
}

