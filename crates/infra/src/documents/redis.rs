//! Redis-backed document sink (optional).
//!
//! Each collection is one Redis hash (`<prefix>:<collection>`) mapping
//! document id to its JSON text. Filtering happens client-side; the side
//! channel holds small metadata documents only.

use std::collections::HashMap;

use chrono::Utc;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DocumentError, DocumentFilter, DocumentResult, DocumentSink, apply_set, matches, stamp_new};

#[derive(Debug, Clone)]
pub struct RedisDocumentSink {
    client: redis::Client,
    prefix: String,
}

impl RedisDocumentSink {
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> DocumentResult<Self> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(redis_error)?;
        Ok(Self::from_client(client, prefix))
    }

    pub fn from_client(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn key(&self, collection: &str) -> String {
        format!("{}:{}", self.prefix, collection)
    }

    async fn connection(&self) -> DocumentResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)
    }

    async fn load(&self, collection: &str) -> DocumentResult<Vec<(String, Map<String, Value>)>> {
        let mut conn = self.connection().await?;
        let raw: HashMap<String, String> = conn.hgetall(self.key(collection)).await.map_err(redis_error)?;
        let mut docs = Vec::with_capacity(raw.len());
        for (id, text) in raw {
            match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(doc) => docs.push((id, doc)),
                Err(e) => tracing::warn!(collection, id = %id, error = %e, "skipping unreadable document"),
            }
        }
        Ok(docs)
    }

    async fn store(&self, collection: &str, id: &str, doc: &Map<String, Value>) -> DocumentResult<()> {
        let text = serde_json::to_string(doc).map_err(|e| DocumentError::Serialization(e.to_string()))?;
        let mut conn = self.connection().await?;
        let _: i64 = conn
            .hset(self.key(collection), id, text)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

fn redis_error(e: redis::RedisError) -> DocumentError {
    DocumentError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl DocumentSink for RedisDocumentSink {
    async fn insert(&self, collection: &str, document: Map<String, Value>) -> DocumentResult<Uuid> {
        let id = Uuid::now_v7();
        let doc = stamp_new(document, id, Utc::now());
        self.store(collection, &id.to_string(), &doc).await?;
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<Vec<Map<String, Value>>> {
        let mut docs: Vec<_> = self
            .load(collection)
            .await?
            .into_iter()
            .map(|(_, d)| d)
            .filter(|d| matches(d, filter))
            .collect();
        // v7 ids sort by creation time.
        docs.sort_by(|a, b| a.get("_id").map(Value::to_string).cmp(&b.get("_id").map(Value::to_string)));
        Ok(docs)
    }

    async fn update_one(&self, collection: &str, filter: &DocumentFilter, set: Map<String, Value>) -> DocumentResult<bool> {
        let mut docs = self.load(collection).await?;
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        let Some((id, mut doc)) = docs.into_iter().find(|(_, d)| matches(d, filter)) else {
            return Ok(false);
        };
        apply_set(&mut doc, &set, Utc::now());
        self.store(collection, &id, &doc).await?;
        Ok(true)
    }

    async fn delete_one(&self, collection: &str, filter: &DocumentFilter) -> DocumentResult<bool> {
        let mut docs = self.load(collection).await?;
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        let Some((id, _)) = docs.into_iter().find(|(_, d)| matches(d, filter)) else {
            return Ok(false);
        };
        let mut conn = self.connection().await?;
        let removed: i64 = conn.hdel(self.key(collection), id).await.map_err(redis_error)?;
        Ok(removed > 0)
    }
}
