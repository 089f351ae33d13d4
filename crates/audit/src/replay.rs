//! Replay every policy cell through the gateway and compare with the oracle.
//!
//! Each write cell runs against its own copy of the seed so cells never see
//! each other's effects.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use classguard_auth::Caller;
use classguard_core::{DomainError, Role};
use classguard_gateway::{GatewayResult, Mutation, QueryGateway};
use classguard_infra::{InMemoryRowStore, Tables};
use classguard_policy::{Helper, Operation, PolicyEngine, PolicyOptions, Relation, RowFilter};

use crate::oracle::{Oracle, RowIds};
use crate::probe::{InsertCandidate, insert_candidates, update_patch};
use crate::seed::SeedData;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("seed data could not be prepared: {0}")]
    Seed(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    Pass,
    Mismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub caller: String,
    pub role: Option<Role>,
    pub relation: Relation,
    pub operation: Operation,
    pub expected_rows: usize,
    pub actual_rows: usize,
    #[serde(flatten)]
    pub outcome: CaseOutcome,
}

impl CaseResult {
    pub fn passed(&self) -> bool {
        self.outcome == CaseOutcome::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelperResult {
    pub caller: String,
    pub helper: &'static str,
    pub arguments: Value,
    pub expected: bool,
    pub actual: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HelperResult {
    pub fn passed(&self) -> bool {
        self.actual == Some(self.expected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub total: usize,
    pub failed: usize,
    pub cases: Vec<CaseResult>,
    pub helpers: Vec<HelperResult>,
}

impl AuditReport {
    fn new(cases: Vec<CaseResult>, helpers: Vec<HelperResult>) -> Self {
        let failed = cases.iter().filter(|c| !c.passed()).count() + helpers.iter().filter(|h| !h.passed()).count();
        Self {
            total: cases.len() + helpers.len(),
            failed,
            cases,
            helpers,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn failed_cases(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.passed())
    }
}

fn gateway(tables: &Tables, options: PolicyOptions) -> QueryGateway {
    QueryGateway::new(
        PolicyEngine::new(options),
        Arc::new(InMemoryRowStore::with_tables(tables.clone())),
    )
}

fn row_ids(rows: &[classguard_core::Row]) -> RowIds {
    rows.iter()
        .filter_map(|r| r.get_str("id"))
        .map(str::to_string)
        .collect()
}

async fn execute(
    gateway: &QueryGateway,
    caller: &Caller,
    relation: Relation,
    operation: Operation,
    candidates: &[InsertCandidate],
) -> GatewayResult<RowIds> {
    let name = relation.as_str();
    match operation {
        Operation::Read => Ok(row_ids(&gateway.read(caller, name, &RowFilter::All).await?)),
        Operation::Update => {
            let patch = update_patch(caller.role(), relation);
            Ok(row_ids(&gateway.write(caller, name, Mutation::update(RowFilter::All, patch)).await?))
        }
        Operation::Delete => Ok(row_ids(&gateway.write(caller, name, Mutation::delete(RowFilter::All)).await?)),
        Operation::Insert => {
            let mut ids = RowIds::new();
            for candidate in candidates {
                let rows = gateway
                    .write(caller, name, Mutation::insert(candidate.row.clone()))
                    .await?;
                ids.extend(row_ids(&rows));
            }
            Ok(ids)
        }
    }
}

fn compare(expected: &RowIds, actual: GatewayResult<RowIds>) -> (usize, CaseOutcome) {
    match actual {
        Err(e) => (0, CaseOutcome::Error { message: e.to_string() }),
        Ok(actual) if &actual == expected => (actual.len(), CaseOutcome::Pass),
        Ok(actual) => (
            actual.len(),
            CaseOutcome::Mismatch {
                missing: expected.difference(&actual).cloned().collect(),
                unexpected: actual.difference(expected).cloned().collect(),
            },
        ),
    }
}

/// Every helper call worth asking: role checks plus ownership of each
/// student and classroom in the seed.
fn helper_probes(seed: &SeedData) -> Vec<(Helper, Value)> {
    let mut probes = vec![(Helper::IsTeacher, json!({})), (Helper::IsAdmin, json!({}))];
    let students: BTreeSet<_> = seed
        .users
        .iter()
        .filter(|u| u.user.role == Role::Student)
        .map(|u| u.user.id)
        .collect();
    for target_user_id in students {
        probes.push((
            Helper::OwnsStudentRecord { target_user_id },
            json!({ "target_user_id": target_user_id }),
        ));
    }
    for classroom in &seed.classrooms {
        probes.push((
            Helper::OwnsClassroom {
                target_classroom_id: classroom.id,
            },
            json!({ "target_classroom_id": classroom.id }),
        ));
    }
    probes
}

/// Run the full audit over `seed`.
pub async fn run(seed: &SeedData, options: PolicyOptions) -> Result<AuditReport, ReplayError> {
    let oracle = Oracle::new(seed);
    let tables = seed.to_tables()?;

    let mut callers: Vec<(String, Caller)> = seed.users.iter().map(|u| (u.label.to_string(), u.caller())).collect();
    callers.push(("anonymous".to_string(), Caller::Anonymous));

    let mut cases = Vec::new();
    for (label, caller) in &callers {
        for relation in Relation::ALL {
            for operation in Operation::ALL {
                let candidates = match operation {
                    Operation::Insert => insert_candidates(relation)?,
                    _ => Vec::new(),
                };
                let expected = oracle.expected(caller, relation, operation, &candidates);
                let actual = execute(&gateway(&tables, options), caller, relation, operation, &candidates).await;
                let (actual_rows, outcome) = compare(&expected, actual);

                if outcome != CaseOutcome::Pass {
                    tracing::warn!(caller = %label, relation = %relation, operation = %operation, ?outcome, "policy mismatch");
                }
                cases.push(CaseResult {
                    caller: label.clone(),
                    role: caller.role(),
                    relation,
                    operation,
                    expected_rows: expected.len(),
                    actual_rows,
                    outcome,
                });
            }
        }
    }

    let read_only = gateway(&tables, options);
    let mut helpers = Vec::new();
    for (label, caller) in &callers {
        for (helper, arguments) in helper_probes(seed) {
            let result = read_only.call(caller, helper.name(), &arguments).await;
            let (actual, error) = match result {
                Ok(answer) => (Some(answer), None),
                Err(e) => (None, Some(e.to_string())),
            };
            helpers.push(HelperResult {
                caller: label.clone(),
                helper: helper.name(),
                arguments,
                expected: oracle.helper(caller, &helper),
                actual,
                error,
            });
        }
    }

    let report = AuditReport::new(cases, helpers);
    tracing::info!(total = report.total, failed = report.failed, "policy audit finished");
    Ok(report)
}
