//! Relational storage boundary.
//!
//! Stores execute row filters exactly as given; they never apply policy of
//! their own. `InRelation` subqueries are evaluated with system visibility
//! (every row of the target relation), the way a security-definer function
//! would see them.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryRowStore, Tables};
pub use postgres::PostgresRowStore;

use std::sync::Arc;

use thiserror::Error;

use classguard_core::Row;
use classguard_policy::{Relation, RowFilter};

/// Storage failure. Propagated to callers unchanged; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The store refused the statement (constraint violation, bad value).
    #[error("storage rejected the operation: {0}")]
    Rejected(String),

    #[error("stored row could not be decoded: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait::async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>>;

    /// Insert one fully-populated row and return it as stored.
    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<Row>;

    /// Apply `patch` to every row matching `filter` in one atomic step and
    /// return the post-images.
    async fn update(&self, relation: Relation, filter: &RowFilter, patch: &Row) -> StoreResult<Vec<Row>>;

    /// Delete every row matching `filter` and return the removed rows.
    async fn delete(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>>;
}

#[async_trait::async_trait]
impl<S> RowStore for Arc<S>
where
    S: RowStore + ?Sized,
{
    async fn select(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        (**self).select(relation, filter).await
    }

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<Row> {
        (**self).insert(relation, row).await
    }

    async fn update(&self, relation: Relation, filter: &RowFilter, patch: &Row) -> StoreResult<Vec<Row>> {
        (**self).update(relation, filter, patch).await
    }

    async fn delete(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        (**self).delete(relation, filter).await
    }
}
