//! Column defaults, timestamps and typed validation for rows on their way
//! to storage.
//!
//! Rows are checked by round-tripping through the typed record of their
//! relation: unknown enum values, malformed ids and missing required columns
//! are caught here rather than by the store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use classguard_core::{Assignment, Classroom, DomainResult, Enrollment, Progress, Row, User};
use classguard_policy::{Catalog, Relation, STAMPED_COLUMNS};

pub(crate) fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn normalize<T: Serialize + DeserializeOwned>(row: &Row) -> DomainResult<Row> {
    Row::from_record(&row.to_record::<T>()?)
}

/// Check that `row` is a complete, well-formed record of `relation` and
/// return it with every column present.
pub(crate) fn normalize_row(relation: Relation, row: &Row) -> DomainResult<Row> {
    match relation {
        Relation::Users => normalize::<User>(row),
        Relation::Classrooms => normalize::<Classroom>(row),
        Relation::Enrollments => normalize::<Enrollment>(row),
        Relation::Assignments => normalize::<Assignment>(row),
        Relation::Progress => normalize::<Progress>(row),
    }
}

/// Fill the columns storage would default (id, timestamps), then normalize.
pub(crate) fn complete_insert(catalog: &Catalog, relation: Relation, mut row: Row, now: DateTime<Utc>) -> DomainResult<Row> {
    let schema = catalog.schema(relation);
    if !row.contains(schema.primary_key) {
        row.set(schema.primary_key, Uuid::now_v7().to_string());
    }
    for column in ["created_at", "updated_at", "enrolled_at"] {
        if schema.has_column(column) && !row.contains(column) {
            row.set(column, timestamp(now));
        }
    }
    normalize_row(relation, &row)
}

/// Stamp `updated_at` (replacing any caller value), plus
/// `submitted_at`/`graded_at` when a progress patch moves the status there
/// without setting them.
pub(crate) fn stamp_update(catalog: &Catalog, relation: Relation, patch: &mut Row, now: DateTime<Utc>) {
    let schema = catalog.schema(relation);
    for column in STAMPED_COLUMNS {
        if schema.has_column(column) {
            patch.set(*column, timestamp(now));
        }
    }
    if relation != Relation::Progress {
        return;
    }
    let stamp = match patch.get_str("status") {
        Some("submitted") => "submitted_at",
        Some("graded") => "graded_at",
        _ => return,
    };
    if !patch.contains(stamp) {
        patch.set(stamp, timestamp(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classguard_core::ProgressStatus;

    #[test]
    fn insert_fills_ids_timestamps_and_record_defaults() {
        let row = Row::new()
            .with("user_id", "44444444-4444-4444-4444-444444444444")
            .with("assignment_id", "aaaaaaaa-0000-0000-0000-000000000001");

        let row = complete_insert(&Catalog::new(), Relation::Progress, row, Utc::now()).unwrap();
        let progress: Progress = row.to_record().unwrap();

        assert_eq!(progress.status, ProgressStatus::Pending);
        assert_eq!(progress.points_earned, 0);
        assert!(row.contains("id"));
        assert!(row.contains("graded_at"));
    }

    #[test]
    fn insert_rejects_unknown_status() {
        let row = Row::new()
            .with("user_id", "44444444-4444-4444-4444-444444444444")
            .with("assignment_id", "aaaaaaaa-0000-0000-0000-000000000001")
            .with("status", "done");

        assert!(complete_insert(&Catalog::new(), Relation::Progress, row, Utc::now()).is_err());
    }

    #[test]
    fn grading_patch_is_stamped() {
        let catalog = Catalog::new();
        let mut patch = Row::new().with("status", "graded").with("points_earned", 90);
        stamp_update(&catalog, Relation::Progress, &mut patch, Utc::now());
        assert!(patch.contains("graded_at"));
        assert!(patch.contains("updated_at"));
        assert!(!patch.contains("submitted_at"));

        let mut patch = Row::new().with("classroom_id", "c1");
        stamp_update(&catalog, Relation::Enrollments, &mut patch, Utc::now());
        assert_eq!(patch.len(), 1);
    }

    #[test]
    fn caller_updated_at_is_replaced() {
        let now = Utc::now();
        let mut patch = Row::new().with("feedback", "ok").with("updated_at", "1999-01-01T00:00:00Z");
        stamp_update(&Catalog::new(), Relation::Progress, &mut patch, now);
        assert_eq!(patch.get("updated_at"), Some(&timestamp(now)));
    }

    #[test]
    fn explicit_stamps_are_kept() {
        let mut patch = Row::new().with("status", "submitted").with("submitted_at", Value::Null);
        stamp_update(&Catalog::new(), Relation::Progress, &mut patch, Utc::now());
        assert_eq!(patch.get("submitted_at"), Some(&Value::Null));
    }
}
