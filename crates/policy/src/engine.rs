//! Generic evaluator over the policy table.
//!
//! The engine is stateless: it turns `(caller, relation, operation, input)`
//! into row filters and write plans. It never touches storage; subqueries in
//! the filters it returns are resolved by whoever executes them.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use classguard_auth::{Caller, Principal};
use classguard_core::{ProgressStatus, Row};

use crate::catalog::{Catalog, Operation, Relation};
use crate::error::PolicyResult;
use crate::explain::{self, DecisionExplanation};
use crate::filter::{ResolvedFilter, RowFilter, RowSource};
use crate::rules::{PolicyTable, Rule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOptions {
    /// Exclude updates that move a progress status backwards, for every role.
    #[serde(default)]
    pub strict_status_transitions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write plans
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub relation: Relation,
    /// The new row must match this.
    pub check: RowFilter,
}

impl InsertPlan {
    pub fn is_denied(&self) -> bool {
        self.check.is_nothing()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub relation: Relation,
    /// Existing rows the update may touch: caller filter ∧ rule.
    pub target: RowFilter,
    /// Every post-image must match this.
    pub check: RowFilter,
    pub strict_status: bool,
}

impl UpdatePlan {
    fn denied(relation: Relation) -> Self {
        Self {
            relation,
            target: RowFilter::Nothing,
            check: RowFilter::Nothing,
            strict_status: false,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.target.is_nothing()
    }

    /// Decide whether one row may go from `pre` to `post`.
    ///
    /// `check` is this plan's check filter, resolved against current storage.
    pub fn admits(&self, pre: &Row, post: &Row, check: &ResolvedFilter) -> bool {
        if !check.matches(post) {
            return false;
        }
        if self.strict_status && self.relation == Relation::Progress {
            return status_moves_forward(pre, post);
        }
        true
    }
}

fn status_moves_forward(pre: &Row, post: &Row) -> bool {
    let parse = |row: &Row| row.get_str("status").map(ProgressStatus::from_str);
    match (parse(pre), parse(post)) {
        (Some(Ok(before)), Some(Ok(after))) => before.is_forward_to(after),
        (_, Some(Err(_))) => false,
        _ => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    catalog: Catalog,
    table: PolicyTable,
    options: PolicyOptions,
}

impl PolicyEngine {
    pub fn new(options: PolicyOptions) -> Self {
        Self {
            catalog: Catalog::new(),
            table: PolicyTable::classroom(),
            options,
        }
    }

    pub fn with_table(table: PolicyTable, options: PolicyOptions) -> Self {
        Self {
            catalog: Catalog::new(),
            table,
            options,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn options(&self) -> PolicyOptions {
        self.options
    }

    /// Rule that applies to the caller, or `None` for anonymous callers.
    pub fn rule(&self, caller: &Caller, relation: Relation, operation: Operation) -> Option<&Rule> {
        caller
            .principal()
            .map(|p| self.table.rule(relation, operation, p.role))
    }

    fn scoped<F>(&self, caller: &Caller, relation: Relation, operation: Operation, f: F) -> RowFilter
    where
        F: FnOnce(&Rule, &Principal) -> RowFilter,
    {
        match caller.principal() {
            Some(principal) => f(self.table.rule(relation, operation, principal.role), principal),
            None => RowFilter::Nothing,
        }
    }

    /// Filter for a read: the caller's filter intersected with the rule's
    /// row scope. Never widens what the caller asked for.
    pub fn read_filter(&self, caller: &Caller, relation: Relation, filter: &RowFilter) -> PolicyResult<RowFilter> {
        self.catalog.validate_filter(relation, filter)?;
        let scope = self.scoped(caller, relation, Operation::Read, |rule, p| {
            rule.target_filter(&self.catalog, relation, p)
        });
        Ok(scope.and(filter.clone()))
    }

    pub fn plan_insert(&self, caller: &Caller, relation: Relation, row: &Row) -> PolicyResult<InsertPlan> {
        self.catalog.validate_columns(relation, row.columns())?;
        let check = self.scoped(caller, relation, Operation::Insert, |rule, p| {
            rule.check_filter(&self.catalog, relation, p)
        });
        Ok(InsertPlan { relation, check })
    }

    pub fn plan_update(
        &self,
        caller: &Caller,
        relation: Relation,
        filter: &RowFilter,
        patch: &Row,
    ) -> PolicyResult<UpdatePlan> {
        self.catalog.validate_filter(relation, filter)?;
        self.catalog.validate_columns(relation, patch.columns())?;

        let Some(principal) = caller.principal() else {
            return Ok(UpdatePlan::denied(relation));
        };
        let rule = self.table.rule(relation, Operation::Update, principal.role);
        if !rule.permits_columns(patch.columns()) {
            tracing::debug!(
                relation = %relation,
                role = %principal.role,
                "update patch names columns outside the rule's allow-list"
            );
            return Ok(UpdatePlan::denied(relation));
        }

        let target = rule
            .target_filter(&self.catalog, relation, principal)
            .and(filter.clone());
        if target.is_nothing() {
            return Ok(UpdatePlan::denied(relation));
        }
        Ok(UpdatePlan {
            relation,
            target,
            check: rule.check_filter(&self.catalog, relation, principal),
            strict_status: self.options.strict_status_transitions,
        })
    }

    pub fn plan_delete(&self, caller: &Caller, relation: Relation, filter: &RowFilter) -> PolicyResult<RowFilter> {
        self.catalog.validate_filter(relation, filter)?;
        let scope = self.scoped(caller, relation, Operation::Delete, |rule, p| {
            rule.target_filter(&self.catalog, relation, p)
        });
        Ok(scope.and(filter.clone()))
    }

    /// Row-at-a-time decision against a snapshot.
    ///
    /// For inserts `row` is the candidate row; otherwise it is the existing
    /// row the operation would see or touch.
    pub fn decide(
        &self,
        caller: &Caller,
        relation: Relation,
        operation: Operation,
        row: &Row,
        source: &dyn RowSource,
    ) -> Decision {
        let filter = self.scoped(caller, relation, operation, |rule, p| match operation {
            Operation::Insert => rule.check_filter(&self.catalog, relation, p),
            Operation::Read | Operation::Update | Operation::Delete => {
                rule.target_filter(&self.catalog, relation, p)
            }
        });
        filter.resolve(source).matches(row).into()
    }

    pub fn explain(&self, caller: &Caller, relation: Relation, operation: Operation) -> DecisionExplanation {
        explain::explain(self, caller, relation, operation)
    }
}
