//! Wire stores from [`InfraConfig`].

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::{DocumentBackend, InfraConfig, StoreBackend};
use crate::documents::{DocumentSink, InMemoryDocumentSink};
use crate::resource::{ResourceError, ResourceHandle};
use crate::row_store::{InMemoryRowStore, PostgresRowStore, RowStore, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("schema setup failed: {0}")]
    Schema(#[from] StoreError),

    #[error("{0} is not available in this build (enable the '{1}' feature)")]
    FeatureDisabled(&'static str, &'static str),
}

/// Process-scoped storage: built once at startup, shut down explicitly.
pub struct Infrastructure {
    pub rows: Arc<dyn RowStore>,
    pub documents: Option<Arc<dyn DocumentSink>>,
    postgres: ResourceHandle<PgPool>,
    #[cfg(feature = "redis")]
    redis: ResourceHandle<redis::Client>,
}

impl Infrastructure {
    pub async fn connect(config: &InfraConfig) -> Result<Self, BootstrapError> {
        let postgres: ResourceHandle<PgPool> = ResourceHandle::new("postgres");
        #[cfg(feature = "redis")]
        let redis: ResourceHandle<redis::Client> = ResourceHandle::new("redis");

        let rows: Arc<dyn RowStore> = match config.store {
            StoreBackend::Memory => Arc::new(InMemoryRowStore::new()),
            StoreBackend::Postgres => {
                let url = config.database_url.clone().unwrap_or_default();
                let pool = postgres
                    .get_or_try_init(|| async move { PgPool::connect(&url).await })
                    .await?;
                let store = PostgresRowStore::new(pool.as_ref().clone());
                store.ensure_schema().await?;
                Arc::new(store)
            }
        };

        let documents: Option<Arc<dyn DocumentSink>> = match config.documents {
            DocumentBackend::Off => None,
            DocumentBackend::Memory => Some(Arc::new(InMemoryDocumentSink::with_retention(config.doc_retention))),
            #[cfg(feature = "redis")]
            DocumentBackend::Redis => {
                let url = config.redis_url.clone();
                let client = redis
                    .get_or_try_init(|| async move { redis::Client::open(url.as_str()) })
                    .await?;
                Some(Arc::new(crate::documents::RedisDocumentSink::from_client(
                    client.as_ref().clone(),
                    "classguard:docs",
                )))
            }
            #[cfg(not(feature = "redis"))]
            DocumentBackend::Redis => return Err(BootstrapError::FeatureDisabled("redis document sink", "redis")),
        };

        tracing::info!(store = ?config.store, documents = ?config.documents, "infrastructure ready");
        Ok(Self {
            rows,
            documents,
            postgres,
            #[cfg(feature = "redis")]
            redis,
        })
    }

    /// In-memory infrastructure around an existing row store (tests, audit).
    pub fn in_memory(rows: Arc<dyn RowStore>, documents: Option<Arc<dyn DocumentSink>>) -> Self {
        Self {
            rows,
            documents,
            postgres: ResourceHandle::new("postgres"),
            #[cfg(feature = "redis")]
            redis: ResourceHandle::new("redis"),
        }
    }

    pub async fn shutdown(&self) {
        self.postgres.shutdown().await;
        #[cfg(feature = "redis")]
        self.redis.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_wires_memory_backends() {
        let infra = Infrastructure::connect(&InfraConfig::default()).await.unwrap();
        assert!(infra.documents.is_some());
        infra.shutdown().await;
    }

    #[tokio::test]
    async fn document_sink_can_be_disabled() {
        let config = InfraConfig {
            documents: DocumentBackend::Off,
            ..InfraConfig::default()
        };
        let infra = Infrastructure::connect(&config).await.unwrap();
        assert!(infra.documents.is_none());
    }
}
