//! The concrete requests the audit sends for each write cell.
//!
//! Updates use a small patch a caller of that role would plausibly send;
//! inserts offer a fixed list of candidate rows, some inside and some outside
//! each role's scope.

use chrono::Utc;

use classguard_core::{
    AssignmentId, Classroom, ClassroomId, DomainResult, Enrollment, EnrollmentId, Progress, ProgressId, Role, Row,
    User, UserId,
};
use classguard_policy::Relation;

use crate::seed::ids::*;

/// Patch sent for `update` cells.
pub fn update_patch(role: Option<Role>, relation: Relation) -> Row {
    match relation {
        Relation::Users => Row::new().with("full_name", "Audited Name"),
        Relation::Classrooms => Row::new().with("description", "audited"),
        Relation::Enrollments => Row::new().with("enrolled_at", Utc::now().to_rfc3339()),
        Relation::Assignments => Row::new().with("description", "audited"),
        Relation::Progress => match role {
            Some(Role::Student) | None => Row::new()
                .with("status", "submitted")
                .with("submission_text", "audit submission"),
            Some(Role::Teacher) | Some(Role::Admin) => Row::new().with("feedback", "audit feedback"),
        },
    }
}

/// A row offered to `insert`.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertCandidate {
    pub id: String,
    pub row: Row,
}

impl InsertCandidate {
    fn new<T: serde::Serialize>(id: impl ToString, record: &T) -> DomainResult<Self> {
        Ok(Self {
            id: id.to_string(),
            row: Row::from_record(record)?,
        })
    }
}

pub const NEW_USER: UserId = UserId::from_u128(0xf00d_0001);
pub const NEW_CLASSROOM_T1: ClassroomId = ClassroomId::from_u128(0xf00d_0101);
pub const NEW_CLASSROOM_T2: ClassroomId = ClassroomId::from_u128(0xf00d_0102);
pub const NEW_ENROLLMENT: EnrollmentId = EnrollmentId::from_u128(0xf00d_0201);
pub const NEW_ASSIGNMENT: AssignmentId = AssignmentId::from_u128(0xf00d_0301);

/// Pending progress on the fresh poetry assignment, one per student.
pub fn new_progress_id(student: UserId) -> ProgressId {
    ProgressId::from_u128(0xf00d_0400 + (student.as_uuid().as_u128() & 0xff))
}

/// Progress inserted already graded (never allowed for students).
pub const PRE_GRADED: ProgressId = ProgressId::from_u128(0xf00d_0500);

pub fn insert_candidates(relation: Relation) -> DomainResult<Vec<InsertCandidate>> {
    match relation {
        Relation::Users => Ok(vec![InsertCandidate::new(
            NEW_USER,
            &User::new(NEW_USER, "new.student@student.edu", "New Student", Role::Student),
        )?]),
        Relation::Classrooms => [(NEW_CLASSROOM_T1, TEACHER_1), (NEW_CLASSROOM_T2, TEACHER_2)]
            .into_iter()
            .map(|(id, teacher)| InsertCandidate::new(id, &Classroom::new(id, "Elective", teacher)))
            .collect(),
        Relation::Enrollments => Ok(vec![InsertCandidate::new(
            NEW_ENROLLMENT,
            &Enrollment::new(NEW_ENROLLMENT, MATH, STUDENT_3),
        )?]),
        Relation::Assignments => Ok(vec![InsertCandidate::new(
            NEW_ASSIGNMENT,
            &classguard_core::Assignment::new(NEW_ASSIGNMENT, MATH, "Pop Quiz", 10),
        )?]),
        Relation::Progress => {
            let mut candidates = [STUDENT_1, STUDENT_2, STUDENT_3, STUDENT_4]
                .into_iter()
                .map(|student| {
                    let id = new_progress_id(student);
                    InsertCandidate::new(id, &Progress::pending(id, student, POETRY_READING))
                })
                .collect::<DomainResult<Vec<_>>>()?;
            candidates.push(InsertCandidate::new(
                PRE_GRADED,
                &Progress::pending(PRE_GRADED, STUDENT_1, POETRY_READING)
                    .submitted("copied")
                    .graded(20, "self-graded"),
            )?);
            Ok(candidates)
        }
    }
}
