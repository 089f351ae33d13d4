//! The policy table: one [`Rule`] per `(relation, operation, role)`.
//!
//! Rules are plain data. Every rule is interpreted by the same evaluator in
//! [`crate::engine`]; nothing here knows how a query is executed.

use std::collections::HashMap;

use serde_json::Value;

use classguard_auth::Principal;
use classguard_core::Role;

use crate::catalog::{Catalog, Operation, Relation};
use crate::filter::RowFilter;

// ─────────────────────────────────────────────────────────────────────────────
// Scopes and constraints
// ─────────────────────────────────────────────────────────────────────────────

/// Row predicate of a rule, instantiated per principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    AllRows,
    NoRows,
    /// Follow `path` through foreign keys, then require
    /// `column == principal.id` on the relation reached.
    Owner {
        path: &'static [&'static str],
        column: &'static str,
    },
    /// `column` is a classroom the principal is enrolled in.
    Enrolled { column: &'static str },
}

impl Scope {
    pub const fn owner(column: &'static str) -> Self {
        Scope::Owner { path: &[], column }
    }

    pub fn compile(&self, catalog: &Catalog, relation: Relation, principal: &Principal) -> RowFilter {
        match self {
            Scope::AllRows => RowFilter::All,
            Scope::NoRows => RowFilter::Nothing,
            Scope::Owner { path, column } => {
                catalog.follow(relation, path, RowFilter::eq(*column, principal.id.to_value()))
            }
            Scope::Enrolled { column } => RowFilter::in_relation(
                *column,
                Relation::Enrollments,
                "classroom_id",
                RowFilter::eq("user_id", principal.id.to_value()),
            ),
        }
    }
}

/// A constant a constraint compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Literal {
    Null,
    Int(i64),
    Text(&'static str),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Int(n) => Value::from(n),
            Literal::Text(s) => Value::from(s),
        }
    }
}

/// `column` must hold one of `allowed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub column: &'static str,
    pub allowed: &'static [Literal],
}

impl Constraint {
    /// `Null` becomes its own `Eq` arm so relational backends render it as
    /// `IS NULL`.
    pub fn to_filter(&self) -> RowFilter {
        let values: Vec<Value> = self
            .allowed
            .iter()
            .filter(|l| **l != Literal::Null)
            .map(|l| Value::from(*l))
            .collect();
        let null_allowed = self.allowed.contains(&Literal::Null);
        match (null_allowed, values.is_empty()) {
            (true, true) => RowFilter::eq(self.column, Value::Null),
            (true, false) => RowFilter::eq(self.column, Value::Null).or(RowFilter::any_of(self.column, values)),
            (false, _) => RowFilter::any_of(self.column, values),
        }
    }
}

fn constrain(scope: RowFilter, constraints: &[Constraint]) -> RowFilter {
    constraints
        .iter()
        .fold(scope, |acc, c| acc.and(c.to_filter()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule
// ─────────────────────────────────────────────────────────────────────────────

/// Overwritten by the gateway on every update, whatever the patch says.
pub const STAMPED_COLUMNS: &[&str] = &["updated_at"];

/// One cell of the policy table.
///
/// `using` and `require` select the existing rows an operation may see or
/// touch. `check` and `ensure` must hold for new rows (insert) and for
/// post-images (update). `columns`, when set, is the only set of columns an
/// update patch may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub using: Scope,
    pub require: &'static [Constraint],
    pub check: Scope,
    pub ensure: &'static [Constraint],
    pub columns: Option<&'static [&'static str]>,
    pub description: &'static str,
}

impl Rule {
    pub const DENY: Rule = Rule {
        using: Scope::NoRows,
        require: &[],
        check: Scope::NoRows,
        ensure: &[],
        columns: None,
        description: "no rule grants this operation",
    };

    pub const fn any(description: &'static str) -> Self {
        Rule {
            using: Scope::AllRows,
            require: &[],
            check: Scope::AllRows,
            ensure: &[],
            columns: None,
            description,
        }
    }

    /// Same predicate for existing rows and for new rows/post-images.
    pub const fn scoped(scope: Scope, description: &'static str) -> Self {
        Rule {
            using: scope,
            require: &[],
            check: scope,
            ensure: &[],
            columns: None,
            description,
        }
    }

    pub fn is_deny(&self) -> bool {
        matches!(self.using, Scope::NoRows) && matches!(self.check, Scope::NoRows)
    }

    /// Filter over existing rows.
    pub fn target_filter(&self, catalog: &Catalog, relation: Relation, principal: &Principal) -> RowFilter {
        constrain(self.using.compile(catalog, relation, principal), self.require)
    }

    /// Filter a new row or post-image must satisfy.
    pub fn check_filter(&self, catalog: &Catalog, relation: Relation, principal: &Principal) -> RowFilter {
        constrain(self.check.compile(catalog, relation, principal), self.ensure)
    }

    /// Every column the patch names is on the allow-list (if there is one).
    /// Columns the gateway stamps itself are always permitted.
    pub fn permits_columns<'a>(&self, mut columns: impl Iterator<Item = &'a str>) -> bool {
        match self.columns {
            None => true,
            Some(allowed) => columns.all(|c| allowed.contains(&c) || STAMPED_COLUMNS.contains(&c)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// The classroom policy
// ─────────────────────────────────────────────────────────────────────────────

const PROGRESS_TEACHER_CHAIN: Scope = Scope::Owner {
    path: &["assignment_id", "classroom_id"],
    column: "teacher_id",
};

const ASSIGNMENT_TEACHER_CHAIN: Scope = Scope::Owner {
    path: &["classroom_id"],
    column: "teacher_id",
};

const PENDING: &[Literal] = &[Literal::Text("pending")];
const SUBMITTED: &[Literal] = &[Literal::Text("submitted")];

/// New student progress: pending, and nothing a teacher would set.
const UNGRADED_PENDING: &[Constraint] = &[
    Constraint {
        column: "status",
        allowed: PENDING,
    },
    Constraint {
        column: "points_earned",
        allowed: &[Literal::Null, Literal::Int(0)],
    },
    Constraint {
        column: "feedback",
        allowed: &[Literal::Null],
    },
    Constraint {
        column: "graded_at",
        allowed: &[Literal::Null],
    },
];

fn student_rule(relation: Relation, operation: Operation) -> Rule {
    use Operation::*;
    use Relation::*;

    match (relation, operation) {
        (Users, Read) => Rule::scoped(Scope::owner("id"), "students read their own profile"),
        (Users, Update) => Rule {
            columns: Some(&["email", "full_name"]),
            ..Rule::scoped(Scope::owner("id"), "students update their own profile")
        },
        (Classrooms, Read) => Rule::scoped(
            Scope::Enrolled { column: "id" },
            "students read classrooms they are enrolled in",
        ),
        (Assignments, Read) => Rule::scoped(
            Scope::Enrolled { column: "classroom_id" },
            "students read assignments of classrooms they are enrolled in",
        ),
        (Progress, Read) => Rule::scoped(Scope::owner("user_id"), "students read their own progress"),
        (Progress, Insert) => Rule {
            ensure: UNGRADED_PENDING,
            ..Rule::scoped(Scope::owner("user_id"), "students create their own ungraded progress as pending")
        },
        (Progress, Update) => Rule {
            using: Scope::owner("user_id"),
            require: &[Constraint {
                column: "status",
                allowed: PENDING,
            }],
            check: Scope::owner("user_id"),
            ensure: &[Constraint {
                column: "status",
                allowed: SUBMITTED,
            }],
            columns: Some(&["submission_text", "status", "submitted_at"]),
            description: "students submit their own pending progress",
        },
        _ => Rule::DENY,
    }
}

fn teacher_rule(relation: Relation, operation: Operation) -> Rule {
    use Operation::*;
    use Relation::*;

    match (relation, operation) {
        (Users, Read) => Rule::any("teachers read every profile"),
        (Users, Update) => Rule::any("teachers update every profile"),
        (Classrooms, Read) => Rule::scoped(Scope::owner("teacher_id"), "teachers read classrooms they own"),
        (Classrooms, Insert) => Rule::scoped(
            Scope::owner("teacher_id"),
            "teachers create classrooms they own",
        ),
        (Classrooms, Update) => Rule::scoped(
            Scope::owner("teacher_id"),
            "teachers update classrooms they own",
        ),
        (Classrooms, Delete) => Rule::scoped(
            Scope::owner("teacher_id"),
            "teachers delete classrooms they own",
        ),
        (Assignments, Read) => Rule::scoped(
            ASSIGNMENT_TEACHER_CHAIN,
            "teachers read assignments of classrooms they own",
        ),
        (Progress, Read) => Rule::scoped(
            PROGRESS_TEACHER_CHAIN,
            "teachers read progress on assignments of classrooms they own",
        ),
        (Progress, Update) => Rule {
            columns: Some(&["points_earned", "feedback", "status", "graded_at"]),
            ..Rule::scoped(
                PROGRESS_TEACHER_CHAIN,
                "teachers grade progress on assignments of classrooms they own",
            )
        },
        _ => Rule::DENY,
    }
}

fn rule_for(relation: Relation, operation: Operation, role: Role) -> Rule {
    match role {
        Role::Student => student_rule(relation, operation),
        Role::Teacher => teacher_rule(relation, operation),
        Role::Admin => Rule::any("admins act on every row"),
    }
}

/// Lookup structure over every `(relation, operation, role)` cell.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    rules: HashMap<(Relation, Operation, Role), Rule>,
}

impl PolicyTable {
    /// The classroom policy.
    pub fn classroom() -> Self {
        let mut rules = HashMap::new();
        for relation in Relation::ALL {
            for operation in Operation::ALL {
                for role in Role::ALL {
                    rules.insert((relation, operation, role), rule_for(relation, operation, role));
                }
            }
        }
        Self { rules }
    }

    pub fn rule(&self, relation: Relation, operation: Operation, role: Role) -> &Rule {
        self.rules
            .get(&(relation, operation, role))
            .unwrap_or(&Rule::DENY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(Relation, Operation, Role), &Rule)> {
        self.rules.iter()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::classroom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classguard_core::UserId;

    #[test]
    fn table_covers_every_cell() {
        let table = PolicyTable::classroom();
        assert_eq!(table.iter().count(), Relation::ALL.len() * Operation::ALL.len() * Role::ALL.len());
    }

    #[test]
    fn empty_cells_deny_students_and_teachers_but_not_admins() {
        let table = PolicyTable::classroom();
        for (relation, operation) in [
            (Relation::Enrollments, Operation::Read),
            (Relation::Assignments, Operation::Insert),
            (Relation::Progress, Operation::Delete),
            (Relation::Users, Operation::Delete),
        ] {
            assert!(table.rule(relation, operation, Role::Student).is_deny());
            assert!(table.rule(relation, operation, Role::Teacher).is_deny());
            assert!(!table.rule(relation, operation, Role::Admin).is_deny());
        }
        assert!(table.rule(Relation::Classrooms, Operation::Insert, Role::Student).is_deny());
        assert!(table.rule(Relation::Progress, Operation::Insert, Role::Teacher).is_deny());
    }

    #[test]
    fn student_profile_updates_cannot_touch_role() {
        let rule = PolicyTable::classroom()
            .rule(Relation::Users, Operation::Update, Role::Student)
            .to_owned();
        assert!(rule.permits_columns(["full_name"].into_iter()));
        assert!(!rule.permits_columns(["full_name", "role"].into_iter()));
        assert!(rule.permits_columns(["full_name", "updated_at"].into_iter()));
        assert!(!rule.permits_columns(["full_name", "created_at"].into_iter()));
    }

    #[test]
    fn teacher_progress_scope_follows_the_ownership_chain() {
        let me = Principal::teacher(UserId::from_u128(1));
        let rule = PolicyTable::classroom()
            .rule(Relation::Progress, Operation::Read, Role::Teacher)
            .to_owned();

        let filter = rule.target_filter(&Catalog::new(), Relation::Progress, &me);

        assert_eq!(
            filter,
            RowFilter::in_relation(
                "assignment_id",
                Relation::Assignments,
                "id",
                RowFilter::in_relation(
                    "classroom_id",
                    Relation::Classrooms,
                    "id",
                    RowFilter::eq("teacher_id", me.id.to_value()),
                ),
            )
        );
    }

    #[test]
    fn student_submission_requires_pending_and_lands_submitted() {
        let me = Principal::student(UserId::from_u128(4));
        let rule = PolicyTable::classroom()
            .rule(Relation::Progress, Operation::Update, Role::Student)
            .to_owned();
        let catalog = Catalog::new();

        assert_eq!(
            rule.target_filter(&catalog, Relation::Progress, &me),
            RowFilter::eq("user_id", me.id.to_value()).and(RowFilter::any_of("status", ["pending"]))
        );
        assert_eq!(
            rule.check_filter(&catalog, Relation::Progress, &me),
            RowFilter::eq("user_id", me.id.to_value()).and(RowFilter::any_of("status", ["submitted"]))
        );
        assert!(!rule.permits_columns(["submission_text", "points_earned"].into_iter()));
    }

    #[test]
    fn student_inserts_must_leave_grading_fields_unset() {
        let me = Principal::student(UserId::from_u128(4));
        let rule = PolicyTable::classroom()
            .rule(Relation::Progress, Operation::Insert, Role::Student)
            .to_owned();
        let check = rule.check_filter(&Catalog::new(), Relation::Progress, &me);

        let RowFilter::And(parts) = check else {
            panic!("expected a conjunction, got {check:?}");
        };
        assert!(parts.contains(&RowFilter::eq("feedback", Value::Null)));
        assert!(parts.contains(&RowFilter::eq("graded_at", Value::Null)));
        assert!(parts.contains(
            &RowFilter::eq("points_earned", Value::Null).or(RowFilter::any_of("points_earned", [0]))
        ));
    }

    #[test]
    fn null_only_constraints_render_as_is_null() {
        let c = Constraint {
            column: "feedback",
            allowed: &[Literal::Null],
        };
        assert_eq!(crate::sql::render_where(&c.to_filter()).sql, "\"feedback\" IS NULL");
    }
}
