use serde::{Deserialize, Serialize};

use classguard_core::Row;
use classguard_policy::{Operation, PolicyError, PolicyResult, RowFilter};

/// A write request against one relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Mutation {
    Insert {
        row: Row,
    },
    Update {
        #[serde(default)]
        filter: RowFilter,
        patch: Row,
    },
    Delete {
        #[serde(default)]
        filter: RowFilter,
    },
}

impl Mutation {
    pub fn insert(row: Row) -> Self {
        Mutation::Insert { row }
    }

    pub fn update(filter: RowFilter, patch: Row) -> Self {
        Mutation::Update { filter, patch }
    }

    pub fn delete(filter: RowFilter) -> Self {
        Mutation::Delete { filter }
    }

    /// Build a mutation from an operation name, a filter and a row payload
    /// (the new row for inserts, the patch for updates; ignored for deletes).
    pub fn from_parts(operation: &str, filter: RowFilter, payload: Row) -> PolicyResult<Self> {
        match operation.parse::<Operation>()? {
            Operation::Insert => Ok(Mutation::insert(payload)),
            Operation::Update => Ok(Mutation::update(filter, payload)),
            Operation::Delete => Ok(Mutation::delete(filter)),
            Operation::Read => Err(PolicyError::UnknownOperation(format!(
                "{operation} is not a write operation"
            ))),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Mutation::Insert { .. } => Operation::Insert,
            Mutation::Update { .. } => Operation::Update,
            Mutation::Delete { .. } => Operation::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_map_to_mutations() {
        let patch = Row::new().with("status", "submitted");
        let m = Mutation::from_parts("update", RowFilter::eq("id", "p1"), patch.clone()).unwrap();
        assert_eq!(m, Mutation::update(RowFilter::eq("id", "p1"), patch));
        assert_eq!(m.operation(), Operation::Update);

        assert!(matches!(
            Mutation::from_parts("select", RowFilter::All, Row::new()),
            Err(PolicyError::UnknownOperation(_))
        ));
        assert!(matches!(
            Mutation::from_parts("upsert", RowFilter::All, Row::new()),
            Err(PolicyError::UnknownOperation(_))
        ));
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let m: Mutation = serde_json::from_value(json!({
            "operation": "delete",
            "filter": {"eq": {"column": "id", "value": "c1"}}
        }))
        .unwrap();
        assert_eq!(m, Mutation::delete(RowFilter::eq("id", "c1")));

        let m: Mutation = serde_json::from_value(json!({
            "operation": "update",
            "patch": {"feedback": "ok"}
        }))
        .unwrap();
        assert_eq!(m, Mutation::update(RowFilter::All, Row::new().with("feedback", "ok")));
    }
}
