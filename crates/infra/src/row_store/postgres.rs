//! Postgres-backed row store.
//!
//! Filters are rendered into the statement itself (see
//! `classguard_policy::sql`), so rows outside a filter never leave the
//! database. Rows cross the boundary as `jsonb`: selects return
//! `row_to_json(t)` and writes read their values through
//! `jsonb_populate_record`, which lets Postgres apply column types.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique / foreign key / check / not-null / bad text) | `23505`, `23503`, `23514`, `23502`, `22P02` | `Rejected` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed, PoolTimedOut, Io, Tls | N/A | `Unavailable` |
//! | ColumnDecode, Decode | N/A | `Corrupt` |
//! | Other | N/A | `Backend` |

use std::sync::Arc;

use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row as _};
use tracing::instrument;

use classguard_core::Row;
use classguard_policy::sql::{SqlFragment, quote_ident, render_where, render_where_offset};
use classguard_policy::{Relation, RowFilter};

use super::{RowStore, StoreError, StoreResult};

/// DDL for every relation in the catalog. Idempotent.
pub const SCHEMA: &str = include_str!("../../sql/schema.sql");

fn schema_statements() -> impl Iterator<Item = &'static str> {
    SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct PostgresRowStore {
    pool: Arc<PgPool>,
}

impl PostgresRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create missing tables and indexes in one transaction.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        for statement in schema_statements() {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("ensure_schema", e))?;
        tracing::info!("relational schema ensured");
        Ok(())
    }

    async fn fetch_rows(&self, operation: &str, sql: &str, params: Vec<Value>) -> StoreResult<Vec<Row>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        tx.commit().await.map_err(|e| map_sqlx_error(operation, e))?;

        rows.iter().map(decode_row).collect()
    }
}

fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: Vec<Value>) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(Json(p));
    }
    query
}

fn decode_row(row: &sqlx::postgres::PgRow) -> StoreResult<Row> {
    let Json(value): Json<Value> = row
        .try_get("row")
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Row::try_from(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn column_list(row: &Row, prefix: &str) -> String {
    row.columns()
        .map(|c| format!("{prefix}{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait::async_trait]
impl RowStore for PostgresRowStore {
    #[instrument(skip(self, filter), fields(relation = %relation), err)]
    async fn select(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        let SqlFragment { sql: predicate, params } = render_where(filter);
        let sql = format!(
            "SELECT row_to_json(t)::jsonb AS row FROM {} AS t WHERE {}",
            quote_ident(relation.as_str()),
            predicate
        );
        let rows = self.fetch_rows("select", &sql, params).await?;
        tracing::debug!(row_count = rows.len(), "select complete");
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(relation = %relation), err)]
    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<Row> {
        if row.is_empty() {
            return Err(StoreError::Rejected(format!("empty row for {relation}")));
        }
        let table = quote_ident(relation.as_str());
        let sql = format!(
            "INSERT INTO {table} AS t ({cols}) \
             SELECT {values} FROM jsonb_populate_record(NULL::{table}, $1) AS p \
             RETURNING row_to_json(t)::jsonb AS row",
            cols = column_list(&row, ""),
            values = column_list(&row, "p."),
        );
        let params = vec![Value::Object(row.into_map())];
        let mut rows = self.fetch_rows("insert", &sql, params).await?;
        rows.pop()
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))
    }

    #[instrument(skip(self, filter, patch), fields(relation = %relation), err)]
    async fn update(&self, relation: Relation, filter: &RowFilter, patch: &Row) -> StoreResult<Vec<Row>> {
        if patch.is_empty() {
            return self.select(relation, filter).await;
        }
        let table = quote_ident(relation.as_str());
        let SqlFragment { sql: predicate, params } = render_where_offset(filter, 1);
        let sql = format!(
            "UPDATE {table} AS t SET ({cols}) = \
             (SELECT {values} FROM jsonb_populate_record(NULL::{table}, $1) AS p) \
             WHERE {predicate} \
             RETURNING row_to_json(t)::jsonb AS row",
            cols = column_list(patch, ""),
            values = column_list(patch, "p."),
        );
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(Value::Object(patch.clone().into_map()));
        all.extend(params);

        let rows = self.fetch_rows("update", &sql, all).await?;
        tracing::debug!(row_count = rows.len(), "update complete");
        Ok(rows)
    }

    #[instrument(skip(self, filter), fields(relation = %relation), err)]
    async fn delete(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        let SqlFragment { sql: predicate, params } = render_where(filter);
        let sql = format!(
            "DELETE FROM {} AS t WHERE {} RETURNING row_to_json(t)::jsonb AS row",
            quote_ident(relation.as_str()),
            predicate
        );
        self.fetch_rows("delete", &sql, params).await
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505" | "23503" | "23514" | "23502" | "22P02") => StoreError::Rejected(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
