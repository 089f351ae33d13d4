//! Auxiliary document side channel (analytics, logs, cache, notifications).
//!
//! Lower trust than the relational store: documents are not policy-gated and
//! whoever can reach the sink can read them. Only metadata goes here.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::{DEFAULT_RETENTION, InMemoryDocumentSink};
#[cfg(feature = "redis")]
pub use self::redis::RedisDocumentSink;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Well-known collection names.
pub mod collections {
    pub const ANALYTICS: &str = "analytics";
    pub const LOGS: &str = "logs";
    pub const CACHE: &str = "cache";
    pub const NOTIFICATIONS: &str = "notifications";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document sink unavailable: {0}")]
    Unavailable(String),

    #[error("document serialization failed: {0}")]
    Serialization(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Top-level equality match; an empty filter matches every document.
pub type DocumentFilter = Map<String, Value>;

/// Stamp a new document with its id and timestamps.
pub fn stamp_new(mut document: Map<String, Value>, id: Uuid, now: DateTime<Utc>) -> Map<String, Value> {
    document.insert("_id".to_string(), Value::String(id.to_string()));
    document.insert("createdAt".to_string(), Value::String(now.to_rfc3339()));
    document.insert("updatedAt".to_string(), Value::String(now.to_rfc3339()));
    document
}

pub fn matches(document: &Map<String, Value>, filter: &DocumentFilter) -> bool {
    filter.iter().all(|(k, v)| document.get(k) == Some(v))
}

/// Overwrite `set` fields and refresh `updatedAt`.
pub fn apply_set(document: &mut Map<String, Value>, set: &Map<String, Value>, now: DateTime<Utc>) {
    for (k, v) in set {
        document.insert(k.clone(), v.clone());
    }
    document.insert("updatedAt".to_string(), Value::String(now.to_rfc3339()));
}

#[async_trait::async_trait]
pub trait DocumentSink: Send + Sync {
    /// Insert a document; returns its generated id.
    async fn insert(&self, collection: &str, document: Map<String, Value>) -> DocumentResult<Uuid>;

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<Vec<Map<String, Value>>>;

    /// Update the first matching document. Returns whether one matched.
    async fn update_one(&self, collection: &str, filter: &DocumentFilter, set: Map<String, Value>) -> DocumentResult<bool>;

    /// Delete the first matching document. Returns whether one matched.
    async fn delete_one(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<bool>;
}

#[async_trait::async_trait]
impl<S> DocumentSink for Arc<S>
where
    S: DocumentSink + ?Sized,
{
    async fn insert(&self, collection: &str, document: Map<String, Value>) -> DocumentResult<Uuid> {
        (**self).insert(collection, document).await
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<Vec<Map<String, Value>>> {
        (**self).find(collection, filter).await
    }

    async fn update_one(&self, collection: &str, filter: &DocumentFilter, set: Map<String, Value>) -> DocumentResult<bool> {
        (**self).update_one(collection, filter, set).await
    }

    async fn delete_one(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<bool> {
        (**self).delete_one(collection, filter).await
    }
}
