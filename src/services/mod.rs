// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod local_tasks;
pub mod tasks;
pub mod teams;
pub mod users;

pub use auth::{AuthService, Claims, Session};
pub use local_tasks::LocalTaskList;
pub use tasks::{TaskStore, TaskSubscription};
pub use teams::{JoinOutcome, TeamService};
pub use users::UserDirectory;
