//! Fixed classroom dataset used by the audit and the integration tests.
//!
//! Two teachers, one admin, four students and four classrooms. Ids are
//! fixed so reports and assertions can name rows directly.

use classguard_auth::{Caller, Principal};
use serde::Serialize;

use classguard_core::{
    Assignment, AssignmentId, Classroom, ClassroomId, DomainError, DomainResult, Enrollment, EnrollmentId, Entity,
    Progress, ProgressId, Role, Row, User, UserId,
};
use classguard_infra::Tables;
use classguard_policy::{PolicyError, Relation};

pub mod ids {
    use super::*;

    pub const TEACHER_1: UserId = UserId::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
    pub const TEACHER_2: UserId = UserId::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);
    pub const ADMIN: UserId = UserId::from_u128(0x3333_3333_3333_3333_3333_3333_3333_3333);
    pub const STUDENT_1: UserId = UserId::from_u128(0x4444_4444_4444_4444_4444_4444_4444_4444);
    pub const STUDENT_2: UserId = UserId::from_u128(0x5555_5555_5555_5555_5555_5555_5555_5555);
    pub const STUDENT_3: UserId = UserId::from_u128(0x6666_6666_6666_6666_6666_6666_6666_6666);
    pub const STUDENT_4: UserId = UserId::from_u128(0x7777_7777_7777_7777_7777_7777_7777_7777);

    pub const MATH: ClassroomId = ClassroomId::from_u128(0xaaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa);
    pub const SCIENCE: ClassroomId = ClassroomId::from_u128(0xbbbb_bbbb_bbbb_bbbb_bbbb_bbbb_bbbb_bbbb);
    pub const HISTORY: ClassroomId = ClassroomId::from_u128(0xcccc_cccc_cccc_cccc_cccc_cccc_cccc_cccc);
    pub const ENGLISH: ClassroomId = ClassroomId::from_u128(0xdddd_dddd_dddd_dddd_dddd_dddd_dddd_dddd);

    pub const QUADRATICS: AssignmentId = AssignmentId::from_u128(0xa1);
    pub const LINEAR_FUNCTIONS: AssignmentId = AssignmentId::from_u128(0xa2);
    pub const CELL_LAB: AssignmentId = AssignmentId::from_u128(0xb1);
    pub const WWII_ESSAY: AssignmentId = AssignmentId::from_u128(0xc1);
    pub const SHAKESPEARE: AssignmentId = AssignmentId::from_u128(0xd1);
    /// Just posted: nobody has progress on it yet.
    pub const POETRY_READING: AssignmentId = AssignmentId::from_u128(0xd2);
}

use ids::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    /// Short name used in reports (`teacher_1`, `student_3`, ...).
    pub label: &'static str,
    pub user: User,
}

impl SeedUser {
    pub fn caller(&self) -> Caller {
        Principal::new(self.user.id, self.user.role).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedData {
    pub users: Vec<SeedUser>,
    pub classrooms: Vec<Classroom>,
    pub enrollments: Vec<Enrollment>,
    pub assignments: Vec<Assignment>,
    pub progress: Vec<Progress>,
}

impl SeedData {
    pub fn standard() -> Self {
        let users = [
            ("teacher_1", TEACHER_1, "sarah.johnson@school.edu", "Ms. Sarah Johnson", Role::Teacher),
            ("teacher_2", TEACHER_2, "david.wilson@school.edu", "Mr. David Wilson", Role::Teacher),
            ("admin", ADMIN, "admin@school.edu", "Admin User", Role::Admin),
            ("student_1", STUDENT_1, "alice.smith@student.edu", "Alice Smith", Role::Student),
            ("student_2", STUDENT_2, "bob.jones@student.edu", "Bob Jones", Role::Student),
            ("student_3", STUDENT_3, "carol.davis@student.edu", "Carol Davis", Role::Student),
            ("student_4", STUDENT_4, "david.brown@student.edu", "David Brown", Role::Student),
        ]
        .into_iter()
        .map(|(label, id, email, name, role)| SeedUser {
            label,
            user: User::new(id, email, name, role),
        })
        .collect();

        let classrooms = [
            (MATH, "Mathematics 101", TEACHER_1),
            (SCIENCE, "Science 101", TEACHER_1),
            (HISTORY, "History 101", TEACHER_2),
            (ENGLISH, "English 101", TEACHER_2),
        ]
        .into_iter()
        .map(|(id, name, teacher)| Classroom::new(id, name, teacher))
        .collect();

        let enrollments: Vec<Enrollment> = [
            (MATH, STUDENT_1),
            (SCIENCE, STUDENT_1),
            (MATH, STUDENT_2),
            (HISTORY, STUDENT_2),
            (SCIENCE, STUDENT_3),
            (ENGLISH, STUDENT_3),
            (HISTORY, STUDENT_4),
            (ENGLISH, STUDENT_4),
        ]
        .into_iter()
        .zip(1u128..)
        .map(|((classroom, user), n)| Enrollment::new(EnrollmentId::from_u128(n), classroom, user))
        .collect();

        let assignments: Vec<Assignment> = [
            (QUADRATICS, MATH, "Quadratic Equations", 100),
            (LINEAR_FUNCTIONS, MATH, "Linear Functions Quiz", 50),
            (CELL_LAB, SCIENCE, "Cell Structure Lab", 100),
            (WWII_ESSAY, HISTORY, "World War II Essay", 100),
            (SHAKESPEARE, ENGLISH, "Shakespeare Analysis", 80),
            (POETRY_READING, ENGLISH, "Poetry Reading", 20),
        ]
        .into_iter()
        .map(|(id, classroom, title, max)| Assignment::new(id, classroom, title, max))
        .collect();

        // One record per (enrolled student, assignment), cycling through the
        // lifecycle so every status shows up in every classroom.
        let mut progress = Vec::new();
        for enrollment in &enrollments {
            for assignment in assignments
                .iter()
                .filter(|a| a.classroom_id == enrollment.classroom_id && a.id != POETRY_READING)
            {
                let n = progress.len() as u128 + 1;
                let record = Progress::pending(ProgressId::from_u128(0x1000 + n), enrollment.user_id, assignment.id);
                let record = match n % 3 {
                    0 => record,
                    1 => record.submitted("first draft"),
                    _ => record
                        .submitted("final answer")
                        .graded(assignment.max_points / 2, "Good work!"),
                };
                progress.push(record);
            }
        }

        Self {
            users,
            classrooms,
            enrollments,
            assignments,
            progress,
        }
    }

    pub fn user(&self, label: &str) -> Option<&SeedUser> {
        self.users.iter().find(|u| u.label == label)
    }

    pub fn classroom(&self, id: ClassroomId) -> Option<&Classroom> {
        self.classrooms.iter().find(|c| c.id == id)
    }

    pub fn assignment(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    /// Classrooms `user` is enrolled in.
    pub fn enrolled_classrooms(&self, user: UserId) -> impl Iterator<Item = ClassroomId> + '_ {
        self.enrollments
            .iter()
            .filter(move |e| e.user_id == user)
            .map(|e| e.classroom_id)
    }

    pub fn to_tables(&self) -> DomainResult<Tables> {
        let mut tables = Tables::new();
        push_all(&mut tables, self.users.iter().map(|u| &u.user))?;
        push_all(&mut tables, &self.classrooms)?;
        push_all(&mut tables, &self.enrollments)?;
        push_all(&mut tables, &self.assignments)?;
        push_all(&mut tables, &self.progress)?;
        Ok(tables)
    }
}

fn push_all<'r, E>(tables: &mut Tables, records: impl IntoIterator<Item = &'r E>) -> DomainResult<()>
where
    E: Entity + Serialize + 'r,
{
    let relation: Relation = E::RELATION
        .parse()
        .map_err(|e: PolicyError| DomainError::validation(e.to_string()))?;
    for record in records {
        tables.push(relation, Row::from_record(record)?);
    }
    Ok(())
}
