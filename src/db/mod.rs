// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Services talk to a [`DocumentStore`]: a schemaless collection/document
//! API with equality and array-contains filters, optional ordering, atomic
//! write batches and live query subscriptions. [`FirestoreDb`] is the
//! production implementation and [`MemoryStore`] keeps everything in
//! process. Small client-side values live in a [`KeyValueStore`].

pub mod firestore;
pub mod kv;
pub mod memory;
pub mod subscription;

pub use firestore::FirestoreDb;
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use memory::MemoryStore;
pub use subscription::Subscription;

use crate::error::{AppError, Result};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;

/// Collection names as constants.
pub mod collections {
    /// Username records
    pub const USERS: &str = "users";
    /// Email/password accounts
    pub const ACCOUNTS: &str = "accounts";
    pub const TEAMS: &str = "teams";
    /// Team tasks (partitioned by `team_id`)
    pub const TASKS: &str = "tasks";
    /// Personal tasks (partitioned by `owner`)
    pub const PERSONAL_TASKS: &str = "personal_tasks";
}

/// Firestore rejects transactions with more than 500 writes.
pub const MAX_BATCH_WRITES: usize = 500;

/// Document field map.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: backend-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Deserialize into a model. The document id is exposed to the model as `id`.
    pub fn into_model<T: DeserializeOwned>(self) -> Result<T> {
        let mut fields = self.fields;
        fields.insert("id".to_string(), Value::String(self.id));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::Database(format!("Malformed document: {}", e)))
    }
}

/// Serialize a model into document fields, dropping its `id` (the id is not stored as a field).
pub fn to_fields<T: serde::Serialize>(model: &T) -> Result<Fields> {
    match serde_json::to_value(model) {
        Ok(Value::Object(mut fields)) => {
            fields.remove("id");
            Ok(fields)
        }
        Ok(_) => Err(AppError::Internal(anyhow::anyhow!(
            "model did not serialize to an object"
        ))),
        Err(e) => Err(AppError::Internal(e.into())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    /// Field is an array containing the value.
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Equal,
            value: value.into(),
        }
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        }
    }

    /// Evaluate the filter against a document's fields.
    pub fn matches(&self, fields: &Fields) -> bool {
        match (self.op, fields.get(&self.field)) {
            (FilterOp::Equal, Some(v)) => *v == self.value,
            (FilterOp::ArrayContains, Some(Value::Array(items))) => items.contains(&self.value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A collection query: all filters must match.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    /// True if the document passes every filter and, when ordered, has the
    /// order field (documents missing it are excluded, as Firestore does).
    pub fn matches(&self, fields: &Fields) -> bool {
        let has_order_field = self
            .order_by
            .as_ref()
            .map(|(field, _)| fields.contains_key(field))
            .unwrap_or(true);
        has_order_field && self.filters.iter().all(|f| f.matches(fields))
    }

    /// Sort documents by the order field. The sort is stable, so ties keep
    /// the incoming order.
    pub fn sort(&self, docs: &mut [Document]) {
        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(field), b.fields.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Server-side array edit applied inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayTransform {
    /// Append the value unless it is already present.
    Union(Value),
    /// Remove every occurrence of the value.
    Remove(Value),
}

impl ArrayTransform {
    /// New value of an array field after the edit. A missing or non-array
    /// field is treated as empty, as Firestore does.
    pub fn apply(&self, current: Option<&Value>) -> Value {
        let mut items = match current {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        match self {
            Self::Union(value) => {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
            Self::Remove(value) => items.retain(|item| item != value),
        }
        Value::Array(items)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Merge these fields into the document.
    Merge(Fields),
    /// Edit one array field without reading it first.
    Array {
        field: String,
        transform: ArrayTransform,
    },
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub collection: String,
    pub id: String,
    pub op: WriteOp,
}

/// Writes committed all-or-nothing, in order. Every target document must exist.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    updates: Vec<BatchUpdate>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, collection: &str, id: &str, op: WriteOp) {
        self.updates.push(BatchUpdate {
            collection: collection.to_string(),
            id: id.to_string(),
            op,
        });
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Fields) {
        self.push(collection, id, WriteOp::Merge(fields));
    }

    pub fn array_union(&mut self, collection: &str, id: &str, field: &str, value: Value) {
        let transform = ArrayTransform::Union(value);
        self.push(collection, id, WriteOp::Array { field: field.to_string(), transform });
    }

    pub fn array_remove(&mut self, collection: &str, id: &str, field: &str, value: Value) {
        let transform = ArrayTransform::Remove(value);
        self.push(collection, id, WriteOp::Array { field: field.to_string(), transform });
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn updates(&self) -> &[BatchUpdate] {
        &self.updates
    }
}

/// Document database consumed by the services.
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn DocumentStore>`.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return its generated id.
    fn insert<'a>(&'a self, collection: &'a str, fields: Fields) -> BoxFuture<'a, Result<String>>;

    fn get<'a>(&'a self, collection: &'a str, id: &'a str)
        -> BoxFuture<'a, Result<Option<Document>>>;

    /// Merge `fields` into an existing document. `NotFound` if it does not exist.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        fields: Fields,
    ) -> BoxFuture<'a, Result<()>>;

    /// Append `value` to the array `field` unless already present.
    /// `NotFound` if the document does not exist.
    fn array_union<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        field: &'a str,
        value: Value,
    ) -> BoxFuture<'a, Result<()>>;

    /// Delete a document. Deleting a missing document succeeds.
    fn delete<'a>(&'a self, collection: &'a str, id: &'a str) -> BoxFuture<'a, Result<()>>;

    fn query<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Document>>>;

    /// Apply every update in the batch atomically.
    fn commit(&self, batch: WriteBatch) -> BoxFuture<'_, Result<()>>;

    /// Live query: the first snapshot is delivered immediately, then one per
    /// change in the result set. Dropping the subscription stops it.
    fn subscribe(&self, query: Query) -> Subscription;
}
