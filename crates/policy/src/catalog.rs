//! Relation catalog: static description of every relation the gateway serves.
//!
//! Pure data plus lookup. Ownership predicates are composed from the foreign
//! keys declared here (see [`crate::rules::Scope`]).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::filter::RowFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Users,
    Classrooms,
    #[serde(rename = "classroom_enrollments")]
    Enrollments,
    Assignments,
    Progress,
}

impl Relation {
    pub const ALL: [Relation; 5] = [
        Relation::Users,
        Relation::Classrooms,
        Relation::Enrollments,
        Relation::Assignments,
        Relation::Progress,
    ];

    /// Table name in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Users => "users",
            Relation::Classrooms => "classrooms",
            Relation::Enrollments => "classroom_enrollments",
            Relation::Assignments => "assignments",
            Relation::Progress => "progress",
        }
    }
}

impl core::fmt::Display for Relation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownRelation(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Read,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" | "select" => Ok(Operation::Read),
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(PolicyError::UnknownOperation(other.to_string())),
        }
    }
}

/// `column` on the owning relation references `target.target_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub target: Relation,
    pub target_column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSchema {
    pub relation: Relation,
    pub primary_key: &'static str,
    pub columns: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
}

impl RelationSchema {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    pub fn require_column(&self, column: &str) -> PolicyResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(PolicyError::UnknownColumn {
                relation: self.relation.to_string(),
                column: column.to_string(),
            })
        }
    }
}

const USERS: RelationSchema = RelationSchema {
    relation: Relation::Users,
    primary_key: "id",
    columns: &["id", "email", "full_name", "role", "created_at", "updated_at"],
    foreign_keys: &[],
};

const CLASSROOMS: RelationSchema = RelationSchema {
    relation: Relation::Classrooms,
    primary_key: "id",
    columns: &["id", "name", "description", "teacher_id", "created_at", "updated_at"],
    foreign_keys: &[ForeignKey {
        column: "teacher_id",
        target: Relation::Users,
        target_column: "id",
    }],
};

const ENROLLMENTS: RelationSchema = RelationSchema {
    relation: Relation::Enrollments,
    primary_key: "id",
    columns: &["id", "classroom_id", "user_id", "enrolled_at"],
    foreign_keys: &[
        ForeignKey {
            column: "classroom_id",
            target: Relation::Classrooms,
            target_column: "id",
        },
        ForeignKey {
            column: "user_id",
            target: Relation::Users,
            target_column: "id",
        },
    ],
};

const ASSIGNMENTS: RelationSchema = RelationSchema {
    relation: Relation::Assignments,
    primary_key: "id",
    columns: &[
        "id",
        "classroom_id",
        "title",
        "description",
        "due_date",
        "max_points",
        "created_at",
        "updated_at",
    ],
    foreign_keys: &[ForeignKey {
        column: "classroom_id",
        target: Relation::Classrooms,
        target_column: "id",
    }],
};

const PROGRESS: RelationSchema = RelationSchema {
    relation: Relation::Progress,
    primary_key: "id",
    columns: &[
        "id",
        "user_id",
        "assignment_id",
        "status",
        "submission_text",
        "points_earned",
        "feedback",
        "submitted_at",
        "graded_at",
        "created_at",
        "updated_at",
    ],
    foreign_keys: &[
        ForeignKey {
            column: "user_id",
            target: Relation::Users,
            target_column: "id",
        },
        ForeignKey {
            column: "assignment_id",
            target: Relation::Assignments,
            target_column: "id",
        },
    ],
};

/// Lookup over the static relation schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Catalog {
    pub fn new() -> Self {
        Self
    }

    pub fn schema(&self, relation: Relation) -> &'static RelationSchema {
        match relation {
            Relation::Users => &USERS,
            Relation::Classrooms => &CLASSROOMS,
            Relation::Enrollments => &ENROLLMENTS,
            Relation::Assignments => &ASSIGNMENTS,
            Relation::Progress => &PROGRESS,
        }
    }

    pub fn lookup(&self, name: &str) -> PolicyResult<&'static RelationSchema> {
        Ok(self.schema(name.parse()?))
    }

    /// Every column a filter names must exist on the relation it applies to.
    pub fn validate_filter(&self, relation: Relation, filter: &RowFilter) -> PolicyResult<()> {
        let schema = self.schema(relation);
        match filter {
            RowFilter::All | RowFilter::Nothing => Ok(()),
            RowFilter::Eq { column, .. } | RowFilter::AnyOf { column, .. } => {
                schema.require_column(column)
            }
            RowFilter::And(parts) | RowFilter::Or(parts) => parts
                .iter()
                .try_for_each(|p| self.validate_filter(relation, p)),
            RowFilter::InRelation {
                column,
                relation: target,
                select,
                filter,
            } => {
                schema.require_column(column)?;
                self.schema(*target).require_column(select)?;
                self.validate_filter(*target, filter)
            }
        }
    }

    /// Every column a patch or new row sets must exist on the relation.
    pub fn validate_columns<'a>(
        &self,
        relation: Relation,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> PolicyResult<()> {
        let schema = self.schema(relation);
        columns.into_iter().try_for_each(|c| schema.require_column(c))
    }

    /// Foreign-key chain `path` starting at `relation`, ending with a filter on
    /// the last target: `row.path[0] ∈ (SELECT pk FROM ... WHERE leaf)`.
    ///
    /// Returns `Nothing` when the path names a column that is not a foreign key
    /// (a misconfigured chain must never widen visibility).
    pub fn follow(&self, relation: Relation, path: &[&str], leaf: RowFilter) -> RowFilter {
        let Some((first, rest)) = path.split_first() else {
            return leaf;
        };
        let Some(fk) = self.schema(relation).foreign_key(first) else {
            tracing::error!(relation = %relation, column = *first, "ownership path is not a foreign key");
            return RowFilter::Nothing;
        };
        let inner = self.follow(fk.target, rest, leaf);
        RowFilter::in_relation(fk.column, fk.target, fk.target_column, inner)
    }
}
