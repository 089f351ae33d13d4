//! Expected outcomes, derived straight from the typed seed records.
//!
//! Deliberately shares nothing with the policy engine: no row filters, no
//! rule table. Each answer is written out per role the way the classroom
//! policy is described in prose.

use std::collections::BTreeSet;

use classguard_auth::Caller;
use classguard_core::{AssignmentId, ClassroomId, Progress, ProgressStatus, Role, UserId};
use classguard_policy::{Helper, Operation, Relation};

use crate::probe::InsertCandidate;
use crate::seed::SeedData;

pub type RowIds = BTreeSet<String>;

#[derive(Debug, Clone, Copy)]
pub struct Oracle<'a> {
    seed: &'a SeedData,
}

fn ids<T: ToString>(values: impl IntoIterator<Item = T>) -> RowIds {
    values.into_iter().map(|v| v.to_string()).collect()
}

impl<'a> Oracle<'a> {
    pub fn new(seed: &'a SeedData) -> Self {
        Self { seed }
    }

    fn teaches(&self, teacher: UserId, classroom: ClassroomId) -> bool {
        self.seed.classroom(classroom).is_some_and(|c| c.teacher_id == teacher)
    }

    fn teaches_assignment(&self, teacher: UserId, assignment: AssignmentId) -> bool {
        self.seed
            .assignment(assignment)
            .is_some_and(|a| self.teaches(teacher, a.classroom_id))
    }

    fn enrolled(&self, student: UserId, classroom: ClassroomId) -> bool {
        self.seed.enrolled_classrooms(student).any(|c| c == classroom)
    }

    /// Row ids of `relation` the caller should get back from `operation`
    /// (the seed plus, for inserts, `candidates`).
    pub fn expected(&self, caller: &Caller, relation: Relation, operation: Operation, candidates: &[InsertCandidate]) -> RowIds {
        let Some(principal) = caller.principal() else {
            return RowIds::new();
        };
        let (me, role) = (principal.id, principal.role);
        match operation {
            Operation::Read => self.visible(me, role, relation),
            Operation::Update => self.updatable(me, role, relation),
            Operation::Delete => self.deletable(me, role, relation),
            Operation::Insert => candidates
                .iter()
                .filter(|c| self.may_insert(me, role, relation, c))
                .map(|c| c.id.clone())
                .collect(),
        }
    }

    fn all(&self, relation: Relation) -> RowIds {
        let seed = self.seed;
        match relation {
            Relation::Users => ids(seed.users.iter().map(|u| u.user.id)),
            Relation::Classrooms => ids(seed.classrooms.iter().map(|c| c.id)),
            Relation::Enrollments => ids(seed.enrollments.iter().map(|e| e.id)),
            Relation::Assignments => ids(seed.assignments.iter().map(|a| a.id)),
            Relation::Progress => ids(seed.progress.iter().map(|p| p.id)),
        }
    }

    fn visible(&self, me: UserId, role: Role, relation: Relation) -> RowIds {
        let seed = self.seed;
        match (role, relation) {
            (Role::Admin, _) => self.all(relation),
            (Role::Teacher, Relation::Users) => self.all(relation),
            (Role::Student, Relation::Users) => ids([me]),
            (Role::Student, Relation::Classrooms) => ids(seed.enrolled_classrooms(me)),
            (Role::Teacher, Relation::Classrooms) => {
                ids(seed.classrooms.iter().filter(|c| c.teacher_id == me).map(|c| c.id))
            }
            (Role::Student | Role::Teacher, Relation::Enrollments) => RowIds::new(),
            (Role::Student, Relation::Assignments) => ids(
                seed.assignments
                    .iter()
                    .filter(|a| self.enrolled(me, a.classroom_id))
                    .map(|a| a.id),
            ),
            (Role::Teacher, Relation::Assignments) => ids(
                seed.assignments
                    .iter()
                    .filter(|a| self.teaches(me, a.classroom_id))
                    .map(|a| a.id),
            ),
            (Role::Student, Relation::Progress) => {
                ids(seed.progress.iter().filter(|p| p.user_id == me).map(|p| p.id))
            }
            (Role::Teacher, Relation::Progress) => ids(
                seed.progress
                    .iter()
                    .filter(|p| self.teaches_assignment(me, p.assignment_id))
                    .map(|p| p.id),
            ),
        }
    }

    /// Rows the role's probe patch lands on.
    fn updatable(&self, me: UserId, role: Role, relation: Relation) -> RowIds {
        match (role, relation) {
            (Role::Admin, _) => self.all(relation),
            (Role::Student, Relation::Users) => ids([me]),
            (Role::Teacher, Relation::Users) => self.all(relation),
            (Role::Teacher, Relation::Classrooms) | (Role::Teacher, Relation::Progress) => {
                self.visible(me, role, relation)
            }
            // A student may only submit work that is still pending.
            (Role::Student, Relation::Progress) => ids(
                self.seed
                    .progress
                    .iter()
                    .filter(|p| p.user_id == me && p.status == ProgressStatus::Pending)
                    .map(|p| p.id),
            ),
            _ => RowIds::new(),
        }
    }

    fn deletable(&self, me: UserId, role: Role, relation: Relation) -> RowIds {
        match (role, relation) {
            (Role::Admin, _) => self.all(relation),
            (Role::Teacher, Relation::Classrooms) => self.visible(me, role, relation),
            _ => RowIds::new(),
        }
    }

    fn may_insert(&self, me: UserId, role: Role, relation: Relation, candidate: &InsertCandidate) -> bool {
        match (role, relation) {
            (Role::Admin, _) => true,
            (Role::Teacher, Relation::Classrooms) => candidate.row.get_str("teacher_id") == Some(me.to_string().as_str()),
            (Role::Student, Relation::Progress) => candidate
                .row
                .to_record::<Progress>()
                .is_ok_and(|p| {
                    p.user_id == me
                        && p.status == ProgressStatus::Pending
                        && p.points_earned == 0
                        && p.feedback.is_none()
                        && p.graded_at.is_none()
                }),
            _ => false,
        }
    }

    pub fn helper(&self, caller: &Caller, helper: &Helper) -> bool {
        let Some(principal) = caller.principal() else {
            return false;
        };
        match *helper {
            Helper::IsTeacher => principal.role == Role::Teacher,
            Helper::IsAdmin => principal.role == Role::Admin,
            Helper::OwnsStudentRecord { target_user_id } => principal.id == target_user_id,
            Helper::OwnsClassroom { target_classroom_id } => self.teaches(principal.id, target_classroom_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::ids::*;
    use classguard_auth::Principal;

    #[test]
    fn student_one_sees_math_and_science() {
        let seed = SeedData::standard();
        let oracle = Oracle::new(&seed);
        let caller: Caller = Principal::student(STUDENT_1).into();

        assert_eq!(
            oracle.expected(&caller, Relation::Classrooms, Operation::Read, &[]),
            ids([MATH, SCIENCE])
        );
        assert!(oracle.expected(&Caller::Anonymous, Relation::Users, Operation::Read, &[]).is_empty());
    }

    #[test]
    fn teacher_progress_follows_the_chain() {
        let seed = SeedData::standard();
        let oracle = Oracle::new(&seed);
        let caller: Caller = Principal::teacher(TEACHER_2).into();

        let expected = oracle.expected(&caller, Relation::Progress, Operation::Read, &[]);
        for p in &seed.progress {
            let history_or_english = matches!(p.assignment_id, a if a == WWII_ESSAY || a == SHAKESPEARE);
            assert_eq!(expected.contains(&p.id.to_string()), history_or_english);
        }
    }
}
