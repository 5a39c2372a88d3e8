// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password accounts and session tokens.
//!
//! Passwords are stored as salted PBKDF2-HMAC-SHA256 hashes. A session is
//! an HS256 JWT whose subject is the account id.

use crate::db::{collections, to_fields, DocumentStore, Filter, Query};
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, decode_jwt};
use crate::models::Account;
use crate::time_utils::{format_utc_rfc3339, now_rfc3339};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use validator::Validate;

pub use crate::middleware::auth::Claims;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = ring::digest::SHA256_OUTPUT_LEN;

/// Sign-in / sign-up request body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn normalized_email(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account_id: String,
    pub token: String,
    /// Token expiry (RFC3339)
    pub expires_at: String,
}

impl Session {
    fn from_claims(claims: &Claims, token: String) -> Result<Self> {
        let expires_at = chrono::DateTime::from_timestamp(claims.exp as i64, 0)
            .map(format_utc_rfc3339)
            .ok_or(AppError::InvalidToken)?;
        Ok(Self {
            account_id: claims.sub.clone(),
            token,
            expires_at,
        })
    }
}

/// Identity/session service.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    signing_key: Vec<u8>,
    iterations: NonZeroU32,
    rng: SystemRandom,
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>, signing_key: &[u8], iterations: u32) -> Self {
        Self {
            store,
            signing_key: signing_key.to_vec(),
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
            rng: SystemRandom::new(),
        }
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        let query = Query::new(collections::ACCOUNTS).filter(Filter::eq("email", email));
        self.store
            .query(&query)
            .await?
            .into_iter()
            .next()
            .map(|doc| doc.into_model())
            .transpose()
    }

    /// Create an account and start a session for it.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<Session> {
        credentials
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let email = credentials.normalized_email();

        if self.find_account(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let account = Account {
            id: String::new(),
            email: email.clone(),
            password_hash: self.hash_password(&credentials.password)?,
            created_at: now_rfc3339(),
        };
        let account_id = self
            .store
            .insert(collections::ACCOUNTS, to_fields(&account)?)
            .await?;

        tracing::info!(account_id = %account_id, "Account created");
        self.issue_session(&account_id)
    }

    /// Sign in with email and password.
    ///
    /// Unknown email and wrong password produce the same error.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let email = credentials.normalized_email();
        let Some(account) = self.find_account(&email).await? else {
            tracing::debug!("Sign-in for unknown email");
            return Err(AppError::Unauthorized);
        };

        if !self.verify_password(&credentials.password, &account.password_hash) {
            tracing::warn!(account_id = %account.id, "Sign-in with wrong password");
            return Err(AppError::Unauthorized);
        }

        tracing::info!(account_id = %account.id, "Signed in");
        self.issue_session(&account.id)
    }

    /// Verify a session token and return the session it encodes.
    pub fn verify(&self, token: &str) -> Result<Session> {
        let claims = decode_jwt(token, &self.signing_key)?;
        Session::from_claims(&claims, token.to_string())
    }

    fn issue_session(&self, account_id: &str) -> Result<Session> {
        let token = create_jwt(account_id, &self.signing_key)?;
        self.verify(&token)
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate salt")))?;

        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut hash,
        );

        Ok(format!(
            "{}${}${}",
            self.iterations,
            STANDARD.encode(salt),
            STANDARD.encode(hash)
        ))
    }

    fn verify_password(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        let (Some(iterations), Some(salt), Some(hash)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
            return false;
        };
        let (Ok(salt), Ok(hash)) = (STANDARD.decode(salt), STANDARD.decode(hash)) else {
            return false;
        };

        // Constant-time comparison inside ring.
        pbkdf2::verify(PBKDF2_ALG, iterations, &salt, password.as_bytes(), &hash).is_ok()
    }
}
