//! Serializable explanations of policy decisions, for audit output and
//! operator tooling. Explanations describe the rule that applies; they never
//! evaluate rows.

use serde::Serialize;

use classguard_auth::Caller;
use classguard_core::{Role, UserId};

use crate::catalog::{Operation, Relation};
use crate::engine::PolicyEngine;
use crate::filter::RowFilter;

// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Why a caller may (or may not) perform an operation on a relation.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub relation: Relation,
    pub operation: Operation,

    /// Whether any row can be granted at all.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub caller: CallerState,

    /// Existing rows the operation may see or touch.
    pub row_scope: RowFilter,

    /// Condition new rows / post-images must satisfy (writes only).
    pub write_check: Option<RowFilter>,

    /// Columns an update may set, when restricted.
    pub writable_columns: Option<Vec<String>>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallerState {
    pub authenticated: bool,
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    Anonymous,
    NoMatchingRule,
}

pub(crate) fn explain(
    engine: &PolicyEngine,
    caller: &Caller,
    relation: Relation,
    operation: Operation,
) -> DecisionExplanation {
    let caller_state = CallerState {
        authenticated: caller.is_authenticated(),
        user_id: caller.principal().map(|p| p.id),
        role: caller.role(),
    };

    let Some(principal) = caller.principal() else {
        return DecisionExplanation {
            relation,
            operation,
            granted: false,
            reason: "No authenticated principal; anonymous callers match no rule".to_string(),
            caller: caller_state,
            row_scope: RowFilter::Nothing,
            write_check: None,
            writable_columns: None,
            denial_reason: Some(DenialReason {
                kind: DenialKind::Anonymous,
                message: "The request carried no valid session".to_string(),
                suggestions: vec![
                    "Sign in again; the session may have expired".to_string(),
                    "Check that the session subject has a row in users".to_string(),
                ],
            }),
        };
    };

    let rule = engine.table().rule(relation, operation, principal.role);
    let catalog = engine.catalog();
    let write_check = match operation {
        Operation::Insert | Operation::Update => Some(rule.check_filter(catalog, relation, principal)),
        Operation::Read | Operation::Delete => None,
    };
    let writable_columns = match operation {
        Operation::Update => rule.columns.map(|cols| cols.iter().map(|c| c.to_string()).collect()),
        _ => None,
    };

    if rule.is_deny() {
        return DecisionExplanation {
            relation,
            operation,
            granted: false,
            reason: format!("No rule lets a {} {} {}", principal.role, operation, relation),
            caller: caller_state,
            row_scope: RowFilter::Nothing,
            write_check,
            writable_columns,
            denial_reason: Some(DenialReason {
                kind: DenialKind::NoMatchingRule,
                message: format!(
                    "{} on {} is not granted to the {} role",
                    operation, relation, principal.role
                ),
                suggestions: vec![format!(
                    "Perform this operation as a role that is granted {} on {}",
                    operation, relation
                )],
            }),
        };
    }

    DecisionExplanation {
        relation,
        operation,
        granted: true,
        reason: rule.description.to_string(),
        caller: caller_state,
        row_scope: rule.target_filter(catalog, relation, principal),
        write_check,
        writable_columns,
        denial_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classguard_auth::Principal;

    #[test]
    fn anonymous_explanation_is_a_denial() {
        let e = PolicyEngine::default().explain(&Caller::Anonymous, Relation::Progress, Operation::Read);
        assert!(!e.granted);
        assert_eq!(e.denial_reason.map(|d| d.kind), Some(DenialKind::Anonymous));
    }

    #[test]
    fn granted_update_lists_writable_columns() {
        let caller: Caller = Principal::teacher(UserId::from_u128(1)).into();
        let e = PolicyEngine::default().explain(&caller, Relation::Progress, Operation::Update);

        assert!(e.granted);
        assert_eq!(
            e.writable_columns,
            Some(vec![
                "points_earned".to_string(),
                "feedback".to_string(),
                "status".to_string(),
                "graded_at".to_string()
            ])
        );
        assert!(serde_json::to_value(&e).is_ok());
    }

    #[test]
    fn teacher_insert_on_progress_is_explained_as_missing_rule() {
        let caller: Caller = Principal::teacher(UserId::from_u128(1)).into();
        let e = PolicyEngine::default().explain(&caller, Relation::Progress, Operation::Insert);
        assert!(!e.granted);
        assert_eq!(e.denial_reason.map(|d| d.kind), Some(DenialKind::NoMatchingRule));
    }
}
