//! Query gateway: the single entry point for reads, writes and helper calls.
//!
//! ```text
//! read   : filter ──► engine.read_filter ──► store.select
//! write  : mutation ──► engine plan ──► defaults/stamps ──► post-image check
//!          ──► grade bounds ──► one store write ──► activity record
//! call   : helper name + args ──► Helper::check ──► (optional) store.select
//! ```
//!
//! Denials are empty results, never errors. Nothing is cached between calls:
//! identity, scope and subqueries are resolved on every request.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::instrument;

use classguard_auth::{Caller, SessionClaims, authenticated_subject, caller_for};
use classguard_core::{Assignment, AssignmentId, Progress, Role, Row};
use classguard_infra::{DocumentSink, Infrastructure, RowStore};
use classguard_policy::{
    DecisionExplanation, Helper, HelperCheck, Operation, PolicyEngine, PolicyOptions, Relation, RowFilter,
};

use crate::activity::{self, WriteActivity};
use crate::defaults;
use crate::error::{GatewayError, GatewayResult};
use crate::mutation::Mutation;
use crate::resolve::resolve_filter;

#[derive(Clone)]
pub struct QueryGateway {
    engine: PolicyEngine,
    store: Arc<dyn RowStore>,
    documents: Option<Arc<dyn DocumentSink>>,
}

impl core::fmt::Debug for QueryGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryGateway")
            .field("engine", &self.engine)
            .field("documents", &self.documents.is_some())
            .finish_non_exhaustive()
    }
}

impl QueryGateway {
    pub fn new(engine: PolicyEngine, store: Arc<dyn RowStore>) -> Self {
        Self {
            engine,
            store,
            documents: None,
        }
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentSink>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn from_infrastructure(infra: &Infrastructure, options: PolicyOptions) -> Self {
        Self {
            engine: PolicyEngine::new(options),
            store: Arc::clone(&infra.rows),
            documents: infra.documents.clone(),
        }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────

    /// Turn session claims into a caller, looking the role up in `users`.
    ///
    /// Missing, expired or unknown-user sessions are anonymous. Storage
    /// failures during the lookup propagate.
    pub async fn identify(&self, claims: Option<&SessionClaims>) -> GatewayResult<Caller> {
        let Some(subject) = authenticated_subject(claims, Utc::now()) else {
            return Ok(Caller::Anonymous);
        };
        let rows = self
            .store
            .select(Relation::Users, &RowFilter::eq("id", subject.to_value()))
            .await?;
        let role = rows
            .first()
            .and_then(|row| row.get_str("role"))
            .and_then(|role| role.parse::<Role>().ok());
        Ok(caller_for(Some(subject), role))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────

    /// Rows of `relation` matching `filter` that the caller may see.
    #[instrument(skip_all, fields(caller = %caller, relation = %relation), err)]
    pub async fn read(&self, caller: &Caller, relation: &str, filter: &RowFilter) -> GatewayResult<Vec<Row>> {
        let relation: Relation = relation.parse()?;
        let scoped = self.engine.read_filter(caller, relation, filter)?;
        if scoped.is_nothing() {
            return Ok(Vec::new());
        }
        Ok(self.store.select(relation, &scoped).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Write
    // ─────────────────────────────────────────────────────────────────────

    /// Apply a mutation and return the affected rows as stored.
    ///
    /// Rows outside the caller's scope are silently excluded; a request
    /// that touches nothing returns an empty list.
    #[instrument(skip_all, fields(caller = %caller, relation = %relation, operation = %mutation.operation()), err)]
    pub async fn write(&self, caller: &Caller, relation: &str, mutation: Mutation) -> GatewayResult<Vec<Row>> {
        let relation: Relation = relation.parse()?;
        let operation = mutation.operation();
        let rows = match mutation {
            Mutation::Insert { row } => self.insert(caller, relation, row).await?,
            Mutation::Update { filter, patch } => self.update(caller, relation, &filter, patch).await?,
            Mutation::Delete { filter } => self.delete(caller, relation, &filter).await?,
        };

        tracing::debug!(relation = %relation, affected = rows.len(), "write applied");
        activity::record(
            self.documents.as_deref(),
            WriteActivity::new(caller, relation, operation, rows.len()),
        )
        .await;
        Ok(rows)
    }

    async fn insert(&self, caller: &Caller, relation: Relation, row: Row) -> GatewayResult<Vec<Row>> {
        let plan = self.engine.plan_insert(caller, relation, &row)?;
        if plan.is_denied() {
            return Ok(Vec::new());
        }

        let row = defaults::complete_insert(self.engine.catalog(), relation, row, Utc::now())?;
        let check = resolve_filter(self.store.as_ref(), &plan.check).await?;
        if !check.matches(&row) {
            tracing::debug!(relation = %relation, "new row fails the insert check");
            return Ok(Vec::new());
        }
        if relation == Relation::Progress {
            self.enforce_grade_bounds(std::slice::from_ref(&row)).await?;
        }

        Ok(vec![self.store.insert(relation, row).await?])
    }

    async fn update(&self, caller: &Caller, relation: Relation, filter: &RowFilter, mut patch: Row) -> GatewayResult<Vec<Row>> {
        let plan = self.engine.plan_update(caller, relation, filter, &patch)?;
        if plan.is_denied() {
            return Ok(Vec::new());
        }
        defaults::stamp_update(self.engine.catalog(), relation, &mut patch, Utc::now());

        let targets = self.store.select(relation, &plan.target).await?;
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let check = resolve_filter(self.store.as_ref(), &plan.check).await?;
        let primary_key = self.engine.catalog().schema(relation).primary_key;
        let mut keys = Vec::new();
        let mut post_images = Vec::new();
        for pre in &targets {
            let mut post = pre.clone();
            post.apply_patch(&patch);
            if !plan.admits(pre, &post, &check) {
                continue;
            }
            let Some(key) = pre.get(primary_key) else { continue };
            keys.push(key.clone());
            post_images.push(defaults::normalize_row(relation, &post)?);
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        if relation == Relation::Progress && (patch.contains("points_earned") || patch.contains("assignment_id")) {
            self.enforce_grade_bounds(&post_images).await?;
        }

        let admitted = plan.target.and(RowFilter::any_of(primary_key, keys));
        Ok(self.store.update(relation, &admitted, &patch).await?)
    }

    async fn delete(&self, caller: &Caller, relation: Relation, filter: &RowFilter) -> GatewayResult<Vec<Row>> {
        let target = self.engine.plan_delete(caller, relation, filter)?;
        if target.is_nothing() {
            return Ok(Vec::new());
        }
        Ok(self.store.delete(relation, &target).await?)
    }

    /// Every progress row must stay within `0..=max_points` of its assignment.
    async fn enforce_grade_bounds(&self, rows: &[Row]) -> GatewayResult<()> {
        let records = rows
            .iter()
            .map(|row| row.to_record::<Progress>())
            .collect::<Result<Vec<_>, _>>()?;
        let ids: BTreeSet<AssignmentId> = records.iter().map(|p| p.assignment_id).collect();
        let assignments = self
            .store
            .select(
                Relation::Assignments,
                &RowFilter::any_of("id", ids.iter().map(AssignmentId::to_value)),
            )
            .await?
            .iter()
            .map(|row| row.to_record::<Assignment>().map(|a| (a.id, a)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        for progress in &records {
            // A dangling assignment id is left for the store's foreign key to refuse.
            if let Some(assignment) = assignments.get(&progress.assignment_id) {
                assignment.check_points(progress.points_earned)?;
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    /// Evaluate a named helper predicate for the caller.
    #[instrument(skip_all, fields(caller = %caller, helper = %helper), err)]
    pub async fn call(&self, caller: &Caller, helper: &str, arguments: &Value) -> GatewayResult<bool> {
        let helper = Helper::parse(helper, arguments)?;
        match helper.check(caller) {
            HelperCheck::Decided(answer) => Ok(answer),
            HelperCheck::Exists { relation, filter } => Ok(!self.store.select(relation, &filter).await?.is_empty()),
        }
    }

    /// Describe the rule that governs `(caller, relation, operation)`.
    pub fn explain(&self, caller: &Caller, relation: &str, operation: &str) -> GatewayResult<DecisionExplanation> {
        let relation: Relation = relation.parse()?;
        let operation: Operation = operation.parse()?;
        Ok(self.engine.explain(caller, relation, operation))
    }
}
