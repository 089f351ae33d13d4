//! `classguard-core` — classroom domain records and shared primitives.
//!
//! This crate contains **pure domain** types (no storage or policy concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod model;
pub mod row;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AssignmentId, ClassroomId, EnrollmentId, ProgressId, UserId};
pub use model::{Assignment, Classroom, Enrollment, Progress, ProgressStatus, Role, User};
pub use row::Row;
