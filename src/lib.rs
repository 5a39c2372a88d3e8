// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Teamtodo: personal task lists and lightweight team sharing.
//!
//! This crate provides the task and membership core over a document
//! database, the client-side identity and session helpers, and the HTTP
//! API that exposes them.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{AuthService, TaskStore, TeamService, UserDirectory};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub auth: AuthService,
    pub users: UserDirectory,
    pub teams: TeamService,
    pub tasks: TaskStore,
}

impl AppState {
    /// Wire every service to the same document store.
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let auth = AuthService::new(
            store.clone(),
            &config.jwt_signing_key,
            config.password_hash_iterations,
        );
        Self {
            users: UserDirectory::new(store.clone()),
            teams: TeamService::new(store.clone()),
            tasks: TaskStore::new(store.clone()),
            auth,
            config,
            store,
        }
    }
}
