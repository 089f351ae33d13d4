use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentError, DocumentFilter, DocumentResult, DocumentSink, apply_set, matches, stamp_new};

/// Documents kept per collection before the oldest are dropped.
pub const DEFAULT_RETENTION: usize = 10_000;

/// In-memory document sink for tests/dev.
///
/// Each collection is bounded: inserting past `retention` drops the oldest
/// document.
#[derive(Debug)]
pub struct InMemoryDocumentSink {
    retention: usize,
    collections: RwLock<HashMap<String, VecDeque<Map<String, Value>>>>,
}

impl Default for InMemoryDocumentSink {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl InMemoryDocumentSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

fn poisoned() -> DocumentError {
    DocumentError::Unavailable("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl DocumentSink for InMemoryDocumentSink {
    async fn insert(&self, collection: &str, document: Map<String, Value>) -> DocumentResult<Uuid> {
        let id = Uuid::now_v7();
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let docs = map.entry(collection.to_string()).or_default();
        docs.push_back(stamp_new(document, id, Utc::now()));
        while docs.len() > self.retention {
            docs.pop_front();
        }
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<Vec<Map<String, Value>>> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        Ok(map
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_one(&self, collection: &str, filter: &DocumentFilter, set: Map<String, Value>) -> DocumentResult<bool> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let Some(doc) = map
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, filter)))
        else {
            return Ok(false);
        };
        apply_set(doc, &set, Utc::now());
        Ok(true)
    }

    async fn delete_one(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<bool> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let Some(docs) = map.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| matches(d, filter)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
