//! Resolve `InRelation` subqueries against a row store.
//!
//! Subqueries run with system visibility, exactly like the store would run
//! them inline. Used where the gateway must test rows in process (write
//! checks on post-images) rather than hand the filter to storage.

use std::future::Future;
use std::pin::Pin;

use classguard_infra::{RowStore, StoreError, StoreResult};
use classguard_policy::{ResolvedFilter, RowFilter, select_values};

type Resolving<'a> = Pin<Box<dyn Future<Output = StoreResult<RowFilter>> + Send + 'a>>;

/// Replace every subquery in `filter` with the values it currently selects.
pub async fn resolve_filter(store: &dyn RowStore, filter: &RowFilter) -> StoreResult<ResolvedFilter> {
    let resolved = resolve_node(store, filter).await?;
    ResolvedFilter::new(resolved).ok_or_else(|| StoreError::Backend("subquery left unresolved".to_string()))
}

fn resolve_node<'a>(store: &'a dyn RowStore, filter: &'a RowFilter) -> Resolving<'a> {
    Box::pin(async move {
        match filter {
            RowFilter::And(parts) => {
                let mut acc = RowFilter::All;
                for part in parts {
                    acc = acc.and(resolve_node(store, part).await?);
                }
                Ok(acc)
            }
            RowFilter::Or(parts) => {
                let mut acc = RowFilter::Nothing;
                for part in parts {
                    acc = acc.or(resolve_node(store, part).await?);
                }
                Ok(acc)
            }
            RowFilter::InRelation {
                column,
                relation,
                select,
                filter,
            } => {
                let rows = store.select(*relation, filter).await?;
                let values = select_values(&rows, &ResolvedFilter::all(), select);
                Ok(RowFilter::any_of(column.clone(), values))
            }
            other => Ok(other.clone()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use classguard_core::Row;
    use classguard_infra::{InMemoryRowStore, Tables};
    use classguard_policy::Relation;

    fn store() -> InMemoryRowStore {
        let mut tables = Tables::new();
        for (id, teacher) in [("c1", "t1"), ("c2", "t1"), ("c3", "t2")] {
            tables.push(Relation::Classrooms, Row::new().with("id", id).with("teacher_id", teacher));
        }
        for (id, classroom) in [("a1", "c1"), ("a2", "c3")] {
            tables.push(Relation::Assignments, Row::new().with("id", id).with("classroom_id", classroom));
        }
        InMemoryRowStore::with_tables(tables)
    }

    #[tokio::test]
    async fn nested_subqueries_become_value_lists() {
        let store = store();
        let filter = RowFilter::in_relation(
            "assignment_id",
            Relation::Assignments,
            "id",
            RowFilter::in_relation("classroom_id", Relation::Classrooms, "id", RowFilter::eq("teacher_id", "t1")),
        );

        let resolved = resolve_filter(&store, &filter).await.unwrap();

        assert_eq!(resolved.filter(), &RowFilter::any_of("assignment_id", ["a1"]));
        assert!(resolved.matches(&Row::new().with("assignment_id", "a1")));
        assert!(!resolved.matches(&Row::new().with("assignment_id", "a2")));
    }

    #[tokio::test]
    async fn empty_subquery_matches_nothing() {
        let store = store();
        let filter = RowFilter::eq("status", "pending").and(RowFilter::in_relation(
            "classroom_id",
            Relation::Classrooms,
            "id",
            RowFilter::eq("teacher_id", "nobody"),
        ));

        let resolved = resolve_filter(&store, &filter).await.unwrap();

        assert!(!resolved.matches(&Row::new().with("status", "pending").with("classroom_id", "c1")));
    }
}
