// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Used for local development and tests. Writes are serialized behind one
//! lock, so a [`WriteBatch`] is applied atomically. Every write broadcasts
//! the collection name, which drives live subscriptions.

use crate::db::{
    ArrayTransform, Direction, Document, DocumentStore, Fields, Query, Subscription, WriteBatch,
    WriteOp,
};
use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct StoredDoc {
    /// Insertion sequence; ties in ordered queries fall back to it.
    seq: u64,
    fields: Fields,
}

type Collections = HashMap<String, BTreeMap<String, StoredDoc>>;

struct Inner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<String>,
    next_seq: AtomicU64,
    offline: AtomicBool,
}

/// In-memory document store. Clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                next_seq: AtomicU64::new(0),
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Simulate backend unavailability: while offline every call fails
    /// with a database error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.read()
            .map(|c| c.get(collection).map(|docs| docs.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn check_online(&self) -> Result<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Database not connected (offline mode)".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.check_online()?;
        self.inner
            .collections
            .read()
            .map_err(|_| AppError::Database("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.check_online()?;
        self.inner
            .collections
            .write()
            .map_err(|_| AppError::Database("store lock poisoned".to_string()))
    }

    fn notify(&self, collection: &str) {
        // No receivers is fine.
        let _ = self.inner.changes.send(collection.to_string());
    }

    fn not_found(collection: &str, id: &str) -> AppError {
        AppError::NotFound(format!("{}/{}", collection, id))
    }

    fn insert_sync(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), StoredDoc { seq, fields });
        self.notify(collection);
        Ok(id)
    }

    fn get_sync(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| Document {
                id: id.to_string(),
                fields: doc.fields.clone(),
            }))
    }

    fn update_sync(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        {
            let mut guard = self.write()?;
            let doc = guard
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| Self::not_found(collection, id))?;
            doc.fields.extend(fields);
        }
        self.notify(collection);
        Ok(())
    }

    fn array_union_sync(&self, collection: &str, id: &str, field: &str, value: Value) -> Result<()> {
        let changed = {
            let mut guard = self.write()?;
            let doc = guard
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| Self::not_found(collection, id))?;
            let next = ArrayTransform::Union(value).apply(doc.fields.get(field));
            let changed = doc.fields.get(field) != Some(&next);
            doc.fields.insert(field.to_string(), next);
            changed
        };
        if changed {
            self.notify(collection);
        }
        Ok(())
    }

    fn delete_sync(&self, collection: &str, id: &str) -> Result<()> {
        let removed = self
            .write()?
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.notify(collection);
        }
        Ok(())
    }

    fn query_sync(&self, query: &Query) -> Result<Vec<Document>> {
        let guard = self.read()?;
        let Some(docs) = guard.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<(u64, Document)> = docs
            .iter()
            .filter(|(_, doc)| query.matches(&doc.fields))
            .map(|(id, doc)| {
                (
                    doc.seq,
                    Document {
                        id: id.clone(),
                        fields: doc.fields.clone(),
                    },
                )
            })
            .collect();
        drop(guard);

        matched.sort_by_key(|(seq, _)| *seq);
        if matches!(query.order_by, Some((_, Direction::Descending))) {
            matched.reverse();
        }
        let mut results: Vec<Document> = matched.into_iter().map(|(_, doc)| doc).collect();
        query.sort(&mut results);
        Ok(results)
    }

    fn commit_sync(&self, batch: WriteBatch) -> Result<()> {
        let mut touched = HashSet::new();
        {
            let mut guard = self.write()?;

            // Validate every target before applying anything.
            for update in batch.updates() {
                let exists = guard
                    .get(&update.collection)
                    .map(|docs| docs.contains_key(&update.id))
                    .unwrap_or(false);
                if !exists {
                    return Err(Self::not_found(&update.collection, &update.id));
                }
            }

            for update in batch.updates() {
                if let Some(doc) = guard
                    .get_mut(&update.collection)
                    .and_then(|docs| docs.get_mut(&update.id))
                {
                    match &update.op {
                        WriteOp::Merge(fields) => doc.fields.extend(fields.clone()),
                        WriteOp::Array { field, transform } => {
                            let next = transform.apply(doc.fields.get(field));
                            doc.fields.insert(field.clone(), next);
                        }
                    }
                    touched.insert(update.collection.clone());
                }
            }
        }
        for collection in touched {
            self.notify(&collection);
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn insert<'a>(&'a self, collection: &'a str, fields: Fields) -> BoxFuture<'a, Result<String>> {
        async move { self.insert_sync(collection, fields) }.boxed()
    }

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        async move { self.get_sync(collection, id) }.boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
    ) -> BoxFuture<'a, Result<()>> {
        async move { self.update_sync(collection, id, fields) }.boxed()
    }

    fn array_union<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<()>> {
        async move { self.array_union_sync(collection, id, field, value) }.boxed()
    }

    fn delete<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.delete_sync(collection, id) }.boxed()
    }

    fn query<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Document>>> {
        async move { self.query_sync(query) }.boxed()
    }

    fn commit(&self, batch: WriteBatch) -> BoxFuture<'_, Result<()>> {
        async move { self.commit_sync(batch) }.boxed()
    }

    fn subscribe(&self, query: Query) -> Subscription {
        let store = self.clone();
        // Subscribe before the first read so no change slips between them.
        let mut changes = self.inner.changes.subscribe();

        Subscription::spawn(move |tx| async move {
            let mut last: Option<Vec<Document>> = None;
            loop {
                match store.query_sync(&query) {
                    Ok(docs) => {
                        if last.as_ref() != Some(&docs) {
                            last = Some(docs.clone());
                            if tx.send(Ok(docs)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        if tx.send(Err(e)).await.is_err() {
                            return;
                        }
                    }
                }

                loop {
                    match changes.recv().await {
                        Ok(collection) if collection == query.collection => break,
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => break,
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Direction, Filter};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("teams", "nope", fields(json!({"name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_array_union_has_set_semantics() {
        let store = MemoryStore::new();
        let id = store
            .insert("teams", fields(json!({"members": ["bob"]})))
            .await
            .unwrap();

        store.array_union("teams", &id, "members", json!("amy")).await.unwrap();
        store.array_union("teams", &id, "members", json!("amy")).await.unwrap();

        let doc = store.get("teams", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["members"], json!(["bob", "amy"]));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let id = store
            .insert("users", fields(json!({"username": "alice"})))
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.update("users", &id, fields(json!({"username": "alice2"})));
        batch.update("users", "missing", fields(json!({"username": "alice2"})));

        assert!(store.commit(batch).await.is_err());
        let doc = store.get("users", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["username"], "alice");
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.query(&Query::new("tasks")).await.unwrap_err();
        assert!(err.is_backend_error());
    }

    #[tokio::test]
    async fn test_subscription_receives_initial_and_updates() {
        let store = MemoryStore::new();
        let query = Query::new("tasks")
            .filter(Filter::eq("team_id", "t1"))
            .order_by("created_at", Direction::Descending);

        let mut sub = store.subscribe(query);
        let first = sub.next().await.unwrap().unwrap();
        assert!(first.is_empty());

        // Writes to other partitions do not produce a new snapshot.
        store
            .insert("tasks", fields(json!({"team_id": "t2", "created_at": "1"})))
            .await
            .unwrap();
        store
            .insert("tasks", fields(json!({"team_id": "t1", "created_at": "2"})))
            .await
            .unwrap();

        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].fields["team_id"], "t1");
    }
}
