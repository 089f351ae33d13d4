#![allow(dead_code)]

use std::sync::Arc;

use classguard_auth::{Caller, Principal};
use classguard_core::{
    Assignment, AssignmentId, Classroom, ClassroomId, Enrollment, EnrollmentId, Progress, ProgressId, Role, Row, User,
    UserId,
};
use classguard_gateway::QueryGateway;
use classguard_infra::{InMemoryRowStore, Tables};
use classguard_policy::{PolicyEngine, PolicyOptions, Relation};

pub const TEACHER_1: UserId = UserId::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
pub const TEACHER_2: UserId = UserId::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);
pub const ADMIN: UserId = UserId::from_u128(0x3333_3333_3333_3333_3333_3333_3333_3333);
pub const STUDENT_1: UserId = UserId::from_u128(0x4444_4444_4444_4444_4444_4444_4444_4444);
pub const STUDENT_2: UserId = UserId::from_u128(0x5555_5555_5555_5555_5555_5555_5555_5555);

pub const MATH: ClassroomId = ClassroomId::from_u128(0xaaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa);
pub const SCIENCE: ClassroomId = ClassroomId::from_u128(0xbbbb_bbbb_bbbb_bbbb_bbbb_bbbb_bbbb_bbbb);
pub const HISTORY: ClassroomId = ClassroomId::from_u128(0xcccc_cccc_cccc_cccc_cccc_cccc_cccc_cccc);

pub const MATH_HOMEWORK: AssignmentId = AssignmentId::from_u128(0xa001);
pub const SCIENCE_LAB: AssignmentId = AssignmentId::from_u128(0xb001);
pub const HISTORY_ESSAY: AssignmentId = AssignmentId::from_u128(0xc001);

/// Student 1 on the math homework (pending).
pub const P_S1_MATH: ProgressId = ProgressId::from_u128(0x41);
/// Student 1 on the science lab (submitted).
pub const P_S1_SCIENCE: ProgressId = ProgressId::from_u128(0x42);
/// Student 2 on the math homework (submitted).
pub const P_S2_MATH: ProgressId = ProgressId::from_u128(0x51);
/// Student 2 on the history essay (submitted).
pub const P_S2_HISTORY: ProgressId = ProgressId::from_u128(0x53);

pub fn student(id: UserId) -> Caller {
    Principal::student(id).into()
}

pub fn teacher(id: UserId) -> Caller {
    Principal::teacher(id).into()
}

pub fn admin() -> Caller {
    Principal::admin(ADMIN).into()
}

fn row<T: serde::Serialize>(record: &T) -> Row {
    Row::from_record(record).unwrap()
}

pub fn tables() -> Tables {
    let mut tables = Tables::new();
    for (id, email, name, role) in [
        (TEACHER_1, "teacher1@school.test", "Teacher One", Role::Teacher),
        (TEACHER_2, "teacher2@school.test", "Teacher Two", Role::Teacher),
        (ADMIN, "admin@school.test", "Admin", Role::Admin),
        (STUDENT_1, "student1@school.test", "Student One", Role::Student),
        (STUDENT_2, "student2@school.test", "Student Two", Role::Student),
    ] {
        tables.push(Relation::Users, row(&User::new(id, email, name, role)));
    }

    for (id, name, owner) in [
        (MATH, "Mathematics 101", TEACHER_1),
        (SCIENCE, "Science Lab", TEACHER_1),
        (HISTORY, "World History", TEACHER_2),
    ] {
        tables.push(Relation::Classrooms, row(&Classroom::new(id, name, owner)));
    }

    for (n, classroom, user) in [
        (1, MATH, STUDENT_1),
        (2, SCIENCE, STUDENT_1),
        (3, MATH, STUDENT_2),
        (4, HISTORY, STUDENT_2),
    ] {
        tables.push(
            Relation::Enrollments,
            row(&Enrollment::new(EnrollmentId::from_u128(n), classroom, user)),
        );
    }

    for (id, classroom, title, max) in [
        (MATH_HOMEWORK, MATH, "Algebra homework", 100),
        (SCIENCE_LAB, SCIENCE, "Lab report", 50),
        (HISTORY_ESSAY, HISTORY, "Essay", 100),
    ] {
        tables.push(Relation::Assignments, row(&Assignment::new(id, classroom, title, max)));
    }

    let progress = [
        Progress::pending(P_S1_MATH, STUDENT_1, MATH_HOMEWORK),
        Progress::pending(P_S1_SCIENCE, STUDENT_1, SCIENCE_LAB).submitted("my lab"),
        Progress::pending(P_S2_MATH, STUDENT_2, MATH_HOMEWORK).submitted("x = 4"),
        Progress::pending(P_S2_HISTORY, STUDENT_2, HISTORY_ESSAY).submitted("essay"),
    ];
    for p in &progress {
        tables.push(Relation::Progress, row(p));
    }
    tables
}

pub fn store() -> Arc<InMemoryRowStore> {
    Arc::new(InMemoryRowStore::with_tables(tables()))
}

pub fn gateway_with(options: PolicyOptions) -> (QueryGateway, Arc<InMemoryRowStore>) {
    let store = store();
    (QueryGateway::new(PolicyEngine::new(options), store.clone()), store)
}

pub fn gateway() -> (QueryGateway, Arc<InMemoryRowStore>) {
    gateway_with(PolicyOptions::default())
}

pub fn ids(rows: &[Row]) -> Vec<String> {
    let mut ids: Vec<String> = rows.iter().filter_map(|r| r.get_str("id")).map(str::to_string).collect();
    ids.sort();
    ids
}

pub fn id_list<T: ToString>(values: &[T]) -> Vec<String> {
    let mut ids: Vec<String> = values.iter().map(ToString::to_string).collect();
    ids.sort();
    ids
}
