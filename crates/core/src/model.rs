//! Classroom domain records.
//!
//! These mirror the stored relations one-to-one. Ownership chains:
//! progress → assignment → classroom → teacher, progress → student, and
//! enrollment bridging student ↔ classroom.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::DomainError;
use crate::id::{AssignmentId, ClassroomId, EnrollmentId, ProgressId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a principal. Closed set: every policy decision matches on all
/// three variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// New users start as students (the `users.role` column default).
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress status
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a progress record: pending → submitted → graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    Pending,
    Submitted,
    Graded,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Submitted => "submitted",
            ProgressStatus::Graded => "graded",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProgressStatus::Pending => 0,
            ProgressStatus::Submitted => 1,
            ProgressStatus::Graded => 2,
        }
    }

    /// True when moving from `self` to `next` does not go backwards.
    pub fn is_forward_to(&self, next: ProgressStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl core::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProgressStatus::Pending),
            "submitted" => Ok(ProgressStatus::Submitted),
            "graded" => Ok(ProgressStatus::Graded),
            other => Err(DomainError::validation(format!("unknown progress status '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>, full_name: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            full_name: full_name.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A classroom, owned by exactly one teacher (`teacher_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub teacher_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Classroom {
    pub fn new(id: ClassroomId, name: impl Into<String>, teacher_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            teacher_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Membership edge between a student and a classroom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub classroom_id: ClassroomId,
    pub user_id: UserId,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(id: EnrollmentId, classroom_id: ClassroomId, user_id: UserId) -> Self {
        Self {
            id,
            classroom_id,
            user_id,
            enrolled_at: Utc::now(),
        }
    }
}

fn default_max_points() -> i64 {
    Assignment::DEFAULT_MAX_POINTS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub classroom_id: ClassroomId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default = "default_max_points")]
    pub max_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub const DEFAULT_MAX_POINTS: i64 = 100;

    pub fn new(id: AssignmentId, classroom_id: ClassroomId, title: impl Into<String>, max_points: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            classroom_id,
            title: title.into(),
            description: None,
            due_date: None,
            max_points,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a grade against this assignment's bounds.
    pub fn check_points(&self, points_earned: i64) -> Result<(), DomainError> {
        if points_earned < 0 {
            return Err(DomainError::invariant(format!(
                "points_earned {points_earned} is negative"
            )));
        }
        if points_earned > self.max_points {
            return Err(DomainError::invariant(format!(
                "points_earned {points_earned} exceeds max_points {} for assignment {}",
                self.max_points, self.id
            )));
        }
        Ok(())
    }
}

/// A student's progress on one assignment.
///
/// # Invariants
/// - One record per (user, assignment) pair.
/// - `points_earned <= assignment.max_points`.
/// - Grading sets `points_earned`, `feedback`, `status = graded` and
///   `graded_at` in the same write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub id: ProgressId,
    pub user_id: UserId,
    pub assignment_id: AssignmentId,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub submission_text: Option<String>,
    #[serde(default)]
    pub points_earned: i64,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    /// A freshly assigned, pending record.
    pub fn pending(id: ProgressId, user_id: UserId, assignment_id: AssignmentId) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            assignment_id,
            status: ProgressStatus::Pending,
            submission_text: None,
            points_earned: 0,
            feedback: None,
            submitted_at: None,
            graded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn submitted(mut self, text: impl Into<String>) -> Self {
        let now = Utc::now();
        self.status = ProgressStatus::Submitted;
        self.submission_text = Some(text.into());
        self.submitted_at = Some(now);
        self.updated_at = now;
        self
    }

    pub fn graded(mut self, points_earned: i64, feedback: impl Into<String>) -> Self {
        let now = Utc::now();
        self.status = ProgressStatus::Graded;
        self.points_earned = points_earned;
        self.feedback = Some(feedback.into());
        self.graded_at = Some(now);
        self.updated_at = now;
        self
    }
}

impl Entity for User {
    type Id = UserId;
    const RELATION: &'static str = "users";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Classroom {
    type Id = ClassroomId;
    const RELATION: &'static str = "classrooms";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Enrollment {
    type Id = EnrollmentId;
    const RELATION: &'static str = "classroom_enrollments";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Assignment {
    type Id = AssignmentId;
    const RELATION: &'static str = "assignments";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Entity for Progress {
    type Id = ProgressId;
    const RELATION: &'static str = "progress";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    #[test]
    fn role_round_trips_through_its_column_value() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(serde_json::to_value(role).unwrap(), serde_json::json!(role.as_str()));
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn status_ordering_is_forward_only() {
        use ProgressStatus::*;
        assert!(Pending.is_forward_to(Submitted));
        assert!(Submitted.is_forward_to(Graded));
        assert!(Graded.is_forward_to(Graded));
        assert!(!Graded.is_forward_to(Pending));
        assert!(!Submitted.is_forward_to(Pending));
    }

    #[test]
    fn grade_bounds() {
        let a = Assignment::new(AssignmentId::new(), ClassroomId::new(), "Quiz", 50);
        assert!(a.check_points(50).is_ok());
        assert!(a.check_points(0).is_ok());
        assert!(a.check_points(51).is_err());
        assert!(a.check_points(-1).is_err());
    }

    #[test]
    fn progress_row_carries_column_names_and_defaults() {
        let p = Progress::pending(ProgressId::new(), UserId::new(), AssignmentId::new());
        let row = Row::from_record(&p).unwrap();

        assert_eq!(row.get_str("status"), Some("pending"));
        assert_eq!(row.get_i64("points_earned"), Some(0));
        assert_eq!(row.get_str("user_id"), Some(p.user_id.to_string().as_str()));

        let back: Progress = row.to_record().unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn assignment_defaults_max_points_when_absent() {
        let json = serde_json::json!({
            "id": AssignmentId::new(),
            "classroom_id": ClassroomId::new(),
            "title": "Essay",
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });
        let a: Assignment = serde_json::from_value(json).unwrap();
        assert_eq!(a.max_points, Assignment::DEFAULT_MAX_POINTS);
    }
}
