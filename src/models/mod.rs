// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod task;
pub mod team;
pub mod user;

pub use task::{Scope, Task};
pub use team::Team;
pub use user::{Account, Identity, UserRecord};
