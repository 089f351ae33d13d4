//! Helper predicates callable by name.
//!
//! Each helper is a pure function of the caller (and, for classroom
//! ownership, the catalog's `classrooms` rows). They are exposed through the
//! gateway's `call` under their RPC names, with camelCase aliases.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use classguard_auth::Caller;
use classguard_core::{ClassroomId, Role, UserId};

use crate::catalog::Relation;
use crate::error::{PolicyError, PolicyResult};
use crate::filter::{RowFilter, RowSource};

pub fn is_teacher(caller: &Caller) -> bool {
    caller.role() == Some(Role::Teacher)
}

pub fn is_admin(caller: &Caller) -> bool {
    caller.role() == Some(Role::Admin)
}

/// True iff the caller is the user `user_id`.
pub fn owns_student_record(caller: &Caller, user_id: UserId) -> bool {
    caller.principal().is_some_and(|p| p.id == user_id)
}

/// `classrooms` rows proving the caller teaches `classroom_id`.
pub fn owns_classroom_filter(caller: &Caller, classroom_id: ClassroomId) -> RowFilter {
    match caller.principal() {
        Some(p) => RowFilter::eq("id", classroom_id.to_value()).and(RowFilter::eq("teacher_id", p.id.to_value())),
        None => RowFilter::Nothing,
    }
}

/// True iff the caller is the teacher of `classroom_id`.
pub fn owns_classroom(caller: &Caller, classroom_id: ClassroomId, source: &dyn RowSource) -> bool {
    let filter = owns_classroom_filter(caller, classroom_id).resolve(source);
    source
        .rows(Relation::Classrooms)
        .iter()
        .any(|row| filter.matches(row))
}

// ─────────────────────────────────────────────────────────────────────────────
// Named helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    IsTeacher,
    IsAdmin,
    OwnsStudentRecord { target_user_id: UserId },
    OwnsClassroom { target_classroom_id: ClassroomId },
}

#[derive(Deserialize)]
struct StudentArgs {
    #[serde(alias = "targetUserId", alias = "userId")]
    target_user_id: UserId,
}

#[derive(Deserialize)]
struct ClassroomArgs {
    #[serde(alias = "targetClassroomId", alias = "classroomId")]
    target_classroom_id: ClassroomId,
}

fn args<T: DeserializeOwned>(name: &str, args: &Value) -> PolicyResult<T> {
    T::deserialize(args).map_err(|e| PolicyError::InvalidArguments(format!("{name}: {e}")))
}

/// What the gateway must do to answer a helper call.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperCheck {
    Decided(bool),
    /// True iff `relation` has at least one row matching `filter`.
    Exists { relation: Relation, filter: RowFilter },
}

impl Helper {
    pub fn parse(name: &str, arguments: &Value) -> PolicyResult<Self> {
        match name {
            "is_teacher" | "isTeacher" => Ok(Helper::IsTeacher),
            "is_admin" | "isAdmin" => Ok(Helper::IsAdmin),
            "validate_student_access" | "ownsStudentRecord" => {
                let a: StudentArgs = args(name, arguments)?;
                Ok(Helper::OwnsStudentRecord {
                    target_user_id: a.target_user_id,
                })
            }
            "validate_teacher_classroom_access" | "ownsClassroom" => {
                let a: ClassroomArgs = args(name, arguments)?;
                Ok(Helper::OwnsClassroom {
                    target_classroom_id: a.target_classroom_id,
                })
            }
            other => Err(PolicyError::UnknownHelper(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Helper::IsTeacher => "is_teacher",
            Helper::IsAdmin => "is_admin",
            Helper::OwnsStudentRecord { .. } => "validate_student_access",
            Helper::OwnsClassroom { .. } => "validate_teacher_classroom_access",
        }
    }

    pub fn check(&self, caller: &Caller) -> HelperCheck {
        match *self {
            Helper::IsTeacher => HelperCheck::Decided(is_teacher(caller)),
            Helper::IsAdmin => HelperCheck::Decided(is_admin(caller)),
            Helper::OwnsStudentRecord { target_user_id } => {
                HelperCheck::Decided(owns_student_record(caller, target_user_id))
            }
            Helper::OwnsClassroom { target_classroom_id } => match owns_classroom_filter(caller, target_classroom_id) {
                RowFilter::Nothing => HelperCheck::Decided(false),
                filter => HelperCheck::Exists {
                    relation: Relation::Classrooms,
                    filter,
                },
            },
        }
    }

    pub fn evaluate(&self, caller: &Caller, source: &dyn RowSource) -> bool {
        match self.check(caller) {
            HelperCheck::Decided(answer) => answer,
            HelperCheck::Exists { relation, filter } => {
                let filter = filter.resolve(source);
                source.rows(relation).iter().any(|row| filter.matches(row))
            }
        }
    }
}
