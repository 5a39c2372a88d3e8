// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`DocumentStore`].
//!
//! Documents are written with client-generated ids. Merge updates carry an
//! update mask plus an `exists` precondition so they never create documents.
//! Array edits (team membership) are server-side transforms committed in a
//! transaction.
//!
//! Subscriptions re-run their query every `SUBSCRIPTION_POLL_SECS` and emit
//! a snapshot whenever the result set changes. `FirestoreListener` reports
//! individual document changes per numeric target; subscribers want whole
//! ordered snapshots, so re-running the query is the simpler fit, and each
//! [`Subscription`] stops the moment it is dropped.

use crate::db::{
    ArrayTransform, Direction, Document, DocumentStore, Fields, FilterOp, Query, Subscription,
    WriteBatch, WriteOp, MAX_BATCH_WRITES,
};
use crate::error::{AppError, Result};
use firestore::errors::FirestoreError;
use firestore::{FirestoreQueryDirection, FirestoreWritePrecondition};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::time::Duration;

/// Fields injected by the Firestore deserializer that are not document data.
const FIRESTORE_META_PREFIX: &str = "_firestore_";

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    poll_interval: Duration,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, poll_interval: Duration) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, poll_interval).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            poll_interval,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, poll_interval: Duration) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            poll_interval,
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Operations ──────────────────────────────────────────────

    async fn insert_doc(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();

        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(&id)
            .object(&fields)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(id)
    }

    async fn get_doc(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let value: Option<Value> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        value.map(|v| to_document(id.to_string(), v)).transpose()
    }

    async fn update_doc(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mask: Vec<String> = fields.keys().cloned().collect();

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(mask)
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(id)
            .object(&fields)
            .execute()
            .await
            .map_err(|e| map_write_error(e, collection, id))?;
        Ok(())
    }

    /// Transform-only writes can only be committed as part of a transaction
    /// or batch, so a single-document union runs in its own transaction.
    async fn array_union_doc(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.array_union(collection, id, field, value);
        self.commit_batch(batch).await
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn query_docs(&self, query: &Query) -> Result<Vec<Document>> {
        let mut select = self
            .get_client()?
            .fluent()
            .select()
            .from(query.collection.as_str());

        if !query.filters.is_empty() {
            let filters = query.filters.clone();
            select = select.filter(move |q| {
                q.for_all(filters.iter().map(|f| match f.op {
                    FilterOp::Equal => q.field(f.field.as_str()).eq(f.value.clone()),
                    FilterOp::ArrayContains => {
                        q.field(f.field.as_str()).array_contains(f.value.clone())
                    }
                }))
            });
        }

        if let Some((field, direction)) = &query.order_by {
            let direction = match direction {
                Direction::Ascending => FirestoreQueryDirection::Ascending,
                Direction::Descending => FirestoreQueryDirection::Descending,
            };
            select = select.order_by([(field.as_str(), direction)]);
        }

        let docs = select
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        docs.iter()
            .map(|doc| {
                let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
                let value: Value = firestore::FirestoreDb::deserialize_doc_to(doc)
                    .map_err(|e| AppError::Database(e.to_string()))?;
                to_document(id, value)
            })
            .collect()
    }

    /// Commit all writes in one transaction. Array edits are sent as
    /// server-side transforms, so they compose with concurrent writers.
    ///
    /// Firestore limits a transaction to 500 writes; larger batches are
    /// rejected up front instead of being split, which would lose atomicity.
    async fn commit_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(AppError::BadRequest(format!(
                "Batch of {} writes exceeds the limit of {}",
                batch.len(),
                MAX_BATCH_WRITES
            )));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for update in batch.updates() {
            let added = match &update.op {
                WriteOp::Merge(fields) => {
                    let mask: Vec<String> = fields.keys().cloned().collect();
                    client
                        .fluent()
                        .update()
                        .fields(mask)
                        .in_col(update.collection.as_str())
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(&update.id)
                        .object(fields)
                        .add_to_transaction(&mut transaction)
                        .map(|_| ())
                }
                WriteOp::Array { field, transform } => client
                    .fluent()
                    .update()
                    .in_col(update.collection.as_str())
                    .precondition(FirestoreWritePrecondition::Exists(true))
                    .document_id(&update.id)
                    .transforms(|t| {
                        let expr = t.field(field.as_str());
                        t.fields([match transform {
                            ArrayTransform::Union(v) => expr.append_missing_elements([v]),
                            ArrayTransform::Remove(v) => expr.remove_all_from_array([v]),
                        }])
                    })
                    .only_transform()
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
            };
            added.map_err(|e| {
                AppError::Database(format!("Failed to add write to transaction: {}", e))
            })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| match e {
                FirestoreError::DataNotFoundError(_) => {
                    AppError::NotFound("Batch target document does not exist".to_string())
                }
                other => AppError::Database(format!("Transaction commit failed: {}", other)),
            })?;

        tracing::debug!(writes = batch.len(), "Write batch committed");
        Ok(())
    }
}

/// Strip deserializer metadata and wrap the value as a [`Document`].
fn to_document(id: String, value: Value) -> Result<Document> {
    match value {
        Value::Object(mut fields) => {
            fields.retain(|k, _| !k.starts_with(FIRESTORE_META_PREFIX));
            Ok(Document { id, fields })
        }
        other => Err(AppError::Database(format!(
            "Document {} is not an object: {}",
            id, other
        ))),
    }
}

fn map_write_error(err: FirestoreError, collection: &str, id: &str) -> AppError {
    match err {
        FirestoreError::DataNotFoundError(_) => {
            AppError::NotFound(format!("{}/{}", collection, id))
        }
        other => AppError::Database(other.to_string()),
    }
}

impl DocumentStore for FirestoreDb {
    fn insert<'a>(&'a self, collection: &'a str, fields: Fields) -> BoxFuture<'a, Result<String>> {
        self.insert_doc(collection, fields).boxed()
    }

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>>> {
        self.get_doc(collection, id).boxed()
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
    ) -> BoxFuture<'a, Result<()>> {
        self.update_doc(collection, id, fields).boxed()
    }

    fn array_union<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<()>> {
        self.array_union_doc(collection, id, field, value).boxed()
    }

    fn delete<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<()>> {
        self.delete_doc(collection, id).boxed()
    }

    fn query<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Document>>> {
        self.query_docs(query).boxed()
    }

    fn commit(&self, batch: WriteBatch) -> BoxFuture<'_, Result<()>> {
        self.commit_batch(batch).boxed()
    }

    fn subscribe(&self, query: Query) -> Subscription {
        let db = self.clone();

        Subscription::spawn(move |tx| async move {
            let mut ticker = tokio::time::interval(db.poll_interval);
            let mut last: Option<Vec<Document>> = None;
            loop {
                ticker.tick().await;
                match db.query_docs(&query).await {
                    Ok(docs) => {
                        if last.as_ref() != Some(&docs) {
                            last = Some(docs.clone());
                            if tx.send(Ok(docs)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            collection = %query.collection,
                            error = %e,
                            "Subscription poll failed"
                        );
                        if tx.send(Err(e)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    }
}
