// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running, with
//! FIRESTORE_EMULATOR_HOST pointing at it. They are skipped otherwise.
//!
//! Names are made unique per run so the tests can share one emulator.

use std::sync::Arc;
use std::time::Duration;
use teamtodo::db::{DocumentStore, FirestoreDb};
use teamtodo::error::AppError;
use teamtodo::models::{Identity, Scope};
use teamtodo::services::{TaskStore, TeamService, UserDirectory};

mod common;
use common::test_db;

/// Generate a unique, valid username for test isolation.
fn unique_name(prefix: &str) -> Identity {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    Identity::parse(&format!("{}{}", prefix, nanos % 1_000_000_000_000)).unwrap()
}

async fn store() -> Arc<dyn DocumentStore> {
    Arc::new(test_db().await)
}

// ═══════════════════════════════════════════════════════════════════════════
// TEAM TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_team_create_join_and_list() {
    require_emulator!();

    let teams = TeamService::new(store().await);
    let alice = unique_name("al");
    let bob = unique_name("bo");

    let team_id = teams.create_team("Emulator team", &alice).await.unwrap();

    let outcome = teams.join_team(&team_id, &bob).await.unwrap();
    assert!(!outcome.already_member);
    let again = teams.join_team(&team_id, &bob).await.unwrap();
    assert!(again.already_member);

    let carol = unique_name("ca");
    assert!(!teams.join_team(&team_id, &carol).await.unwrap().already_member);

    let members = teams.list_members(&team_id).await.unwrap();
    assert_eq!(
        members,
        vec![alice.to_string(), bob.to_string(), carol.to_string()]
    );

    let mine = teams.list_my_teams(&bob).await.unwrap();
    assert!(mine.iter().any(|t| t.id == team_id));
}

#[tokio::test]
async fn test_rename_keeps_other_members() {
    require_emulator!();

    let db = store().await;
    let users = UserDirectory::new(db.clone());
    let teams = TeamService::new(db);

    let old = unique_name("ol");
    users.register(old.as_str(), None).await.unwrap();
    let team_id = teams.create_team("Shared", &old).await.unwrap();
    let dave = unique_name("da");
    teams.join_team(&team_id, &dave).await.unwrap();

    let new = unique_name("nw");
    users.rename(&old, new.as_str()).await.unwrap();

    assert_eq!(
        teams.list_members(&team_id).await.unwrap(),
        vec![dave.to_string(), new.to_string()]
    );
}

#[tokio::test]
async fn test_join_missing_team() {
    require_emulator!();

    let teams = TeamService::new(store().await);
    let err = teams
        .join_team("missing-team-id", &unique_name("zz"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// TASK TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_personal_task_lifecycle() {
    require_emulator!();

    let tasks = TaskStore::new(store().await);
    let scope = Scope::Personal(unique_name("ow"));

    let first = tasks.add_task(&scope, "first", "").await.unwrap();
    let second = tasks.add_task(&scope, "second", "notes").await.unwrap();

    let listed = tasks.list_tasks(&scope).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);

    assert!(tasks.toggle_completion(&scope, &first, false).await.unwrap());

    tasks.delete_task(&scope, &second).await.unwrap();
    tasks.delete_task(&scope, &second).await.unwrap();

    let listed = tasks.list_tasks(&scope).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].completed);
}

#[tokio::test]
async fn test_watch_tasks_polls_changes() {
    require_emulator!();

    let tasks = TaskStore::new(store().await);
    let scope = Scope::Team(format!("team-{}", unique_name("tm")));

    let mut sub = tasks.watch_tasks(&scope);
    let initial = sub.next().await.unwrap().unwrap();
    assert!(initial.is_empty());

    tasks.add_task(&scope, "live", "").await.unwrap();

    let updated = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].title, "live");
}

// ═══════════════════════════════════════════════════════════════════════════
// USERNAME TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_rename_commits_atomically() {
    require_emulator!();

    let db = store().await;
    let users = UserDirectory::new(db.clone());
    let teams = TeamService::new(db.clone());
    let tasks = TaskStore::new(db);

    let old = unique_name("old");
    users.register(old.as_str(), None).await.unwrap();
    let team_id = teams.create_team("Rename team", &old).await.unwrap();
    tasks
        .add_task(&Scope::Personal(old.clone()), "mine", "")
        .await
        .unwrap();

    let new = unique_name("new");
    users.rename(&old, new.as_str()).await.unwrap();

    assert!(!users.is_taken(old.as_str()).await.unwrap());
    assert!(users.is_taken(new.as_str()).await.unwrap());
    assert_eq!(
        teams.list_members(&team_id).await.unwrap(),
        vec![new.to_string()]
    );
    assert_eq!(
        tasks
            .list_tasks(&Scope::Personal(new))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_offline_client_reports_database_error() {
    let db: Arc<dyn DocumentStore> = Arc::new(FirestoreDb::new_mock());
    let teams = TeamService::new(db);

    let err = teams.list_members("any").await.unwrap_err();

    assert!(err.is_backend_error());
}
