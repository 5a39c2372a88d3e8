//! User identity, username records and accounts.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

/// A validated display name: the handle a user acts under.
///
/// 3-20 characters from `[A-Za-z0-9_]`, surrounding whitespace trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(candidate: &str) -> Result<Self> {
        let trimmed = candidate.trim();
        let len = trimmed.chars().count();

        if len < USERNAME_MIN_LEN {
            return Err(AppError::validation(format!(
                "Username must be at least {} characters",
                USERNAME_MIN_LEN
            )));
        }
        if len > USERNAME_MAX_LEN {
            return Err(AppError::validation(format!(
                "Username must be at most {} characters",
                USERNAME_MAX_LEN
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::validation(
                "Username may only contain letters, digits and underscores",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Identity::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// Username record stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// Account that registered this username, when registered through a session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub created_at: String,
}

/// Email/password account stored in the `accounts` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    /// `base64(salt)$base64(pbkdf2 hash)`
    pub password_hash: String,
    pub created_at: String,
}
