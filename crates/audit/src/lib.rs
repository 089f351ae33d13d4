//! `classguard-audit` — replays every (caller, relation, operation) cell of
//! the policy table through the gateway and compares the rows it returns
//! with independently derived expectations.

pub mod oracle;
pub mod probe;
pub mod replay;
pub mod seed;

pub use oracle::Oracle;
pub use replay::{AuditReport, CaseOutcome, CaseResult, HelperResult, ReplayError, run};
pub use seed::{SeedData, SeedUser};
