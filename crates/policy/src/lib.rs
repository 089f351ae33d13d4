//! `classguard-policy` — relation catalog and row-level policy engine.
//!
//! Pure and stateless: no IO, no panics. Storage backends execute the row
//! filters this crate produces.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod explain;
pub mod filter;
pub mod helpers;
pub mod rules;
pub mod sql;

pub use catalog::{Catalog, ForeignKey, Operation, Relation, RelationSchema};
pub use engine::{Decision, InsertPlan, PolicyEngine, PolicyOptions, UpdatePlan};
pub use error::{PolicyError, PolicyResult};
pub use explain::{DecisionExplanation, DenialKind};
pub use filter::{ResolvedFilter, RowFilter, RowSource, select_values};
pub use helpers::{Helper, HelperCheck, is_admin, is_teacher, owns_classroom, owns_student_record};
pub use rules::{Constraint, Literal, PolicyTable, Rule, STAMPED_COLUMNS, Scope};
