use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use classguard_core::Row;
use classguard_policy::{Catalog, Relation, RowFilter, RowSource};

use super::{RowStore, StoreError, StoreResult};

/// Every relation's rows, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    rows: HashMap<Relation, Vec<Row>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, relation: Relation, row: Row) {
        self.rows.entry(relation).or_default().push(row);
    }

    fn contains(&self, relation: Relation, column: &str, value: &Value) -> bool {
        self.rows(relation)
            .iter()
            .any(|r| r.get(column) == Some(value))
    }

    /// Primary-key uniqueness and foreign-key existence, as the relational
    /// schema declares them.
    fn check_constraints(&self, catalog: &Catalog, relation: Relation, row: &Row, replacing: Option<&Value>) -> StoreResult<()> {
        let schema = catalog.schema(relation);
        let pk = match row.get(schema.primary_key) {
            Some(v) if !v.is_null() => v,
            _ => {
                return Err(StoreError::Rejected(format!(
                    "{relation}.{} must not be null",
                    schema.primary_key
                )));
            }
        };
        if replacing != Some(pk) && self.contains(relation, schema.primary_key, pk) {
            return Err(StoreError::Rejected(format!(
                "duplicate key {relation}.{} = {pk}",
                schema.primary_key
            )));
        }
        for fk in schema.foreign_keys {
            let Some(value) = row.get(fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            if !self.contains(fk.target, fk.target_column, value) {
                return Err(StoreError::Rejected(format!(
                    "{relation}.{} = {value} has no matching {}.{}",
                    fk.column, fk.target, fk.target_column
                )));
            }
        }
        Ok(())
    }

    fn take_matching<F>(&mut self, relation: Relation, pred: F) -> Vec<Row>
    where
        F: Fn(&Row) -> bool,
    {
        let rows = self.rows.entry(relation).or_default();
        let (removed, kept): (Vec<Row>, Vec<Row>) = rows.drain(..).partition(|r| pred(r));
        *rows = kept;
        removed
    }

    /// Remove rows that reference `removed` through a foreign key, and
    /// their dependants in turn (`ON DELETE CASCADE`).
    fn cascade(&mut self, catalog: &Catalog, relation: Relation, removed: &[Row]) -> usize {
        let mut count = 0;
        for child in Relation::ALL {
            for fk in catalog.schema(child).foreign_keys.iter().filter(|fk| fk.target == relation) {
                let gone: Vec<&Value> = removed
                    .iter()
                    .filter_map(|r| r.get(fk.target_column))
                    .filter(|v| !v.is_null())
                    .collect();
                if gone.is_empty() {
                    continue;
                }
                let orphans = self.take_matching(child, |r| r.get(fk.column).is_some_and(|v| gone.contains(&v)));
                count += orphans.len() + self.cascade(catalog, child, &orphans);
            }
        }
        count
    }
}

impl RowSource for Tables {
    fn rows(&self, relation: Relation) -> &[Row] {
        self.rows.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// In-memory row store for tests/dev.
///
/// Each call holds the table lock for its whole duration, so a filtered
/// update is atomic with respect to every other call.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    catalog: Catalog,
    tables: RwLock<Tables>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing tables (seed data), bypassing constraints.
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            catalog: Catalog::new(),
            tables: RwLock::new(tables),
        }
    }

    /// Copy of every stored row.
    pub fn snapshot(&self) -> StoreResult<Tables> {
        self.tables
            .read()
            .map(|t| t.clone())
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl RowStore for InMemoryRowStore {
    async fn select(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let filter = filter.resolve(&*tables);
        Ok(tables
            .rows(relation)
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<Row> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        tables.check_constraints(&self.catalog, relation, &row, None)?;
        tables.push(relation, row.clone());
        Ok(row)
    }

    async fn update(&self, relation: Relation, filter: &RowFilter, patch: &Row) -> StoreResult<Vec<Row>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let filter = filter.resolve(&*tables);
        let pk = self.catalog.schema(relation).primary_key;

        // Validate every post-image first so a rejected row leaves the
        // whole update unapplied.
        let mut staged = Vec::new();
        for (idx, row) in tables.rows(relation).iter().enumerate() {
            if !filter.matches(row) {
                continue;
            }
            let mut post = row.clone();
            post.apply_patch(patch);
            tables.check_constraints(&self.catalog, relation, &post, row.get(pk))?;
            staged.push((idx, post));
        }

        let rows = tables.rows.entry(relation).or_default();
        for (idx, post) in &staged {
            rows[*idx] = post.clone();
        }
        Ok(staged.into_iter().map(|(_, post)| post).collect())
    }

    async fn delete(&self, relation: Relation, filter: &RowFilter) -> StoreResult<Vec<Row>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        let filter = filter.resolve(&*tables);
        let removed = tables.take_matching(relation, |r| filter.matches(r));
        let cascaded = tables.cascade(&self.catalog, relation, &removed);
        if cascaded > 0 {
            tracing::debug!(relation = %relation, cascaded, "removed dependent rows");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        Row::try_from(v).unwrap()
    }

    fn seeded() -> InMemoryRowStore {
        let mut t = Tables::new();
        t.push(Relation::Users, row(json!({"id": "t1", "role": "teacher"})));
        t.push(Relation::Classrooms, row(json!({"id": "math", "teacher_id": "t1", "name": "Math"})));
        InMemoryRowStore::with_tables(t)
    }

    #[tokio::test]
    async fn select_resolves_subqueries() {
        let store = seeded();
        let filter = RowFilter::in_relation("teacher_id", Relation::Users, "id", RowFilter::eq("role", "teacher"));

        let rows = store.select(Relation::Classrooms, &filter).await.unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn insert_enforces_keys() {
        let store = seeded();

        let dup = store
            .insert(Relation::Classrooms, row(json!({"id": "math", "teacher_id": "t1"})))
            .await;
        assert!(matches!(dup, Err(StoreError::Rejected(_))));

        let orphan = store
            .insert(Relation::Classrooms, row(json!({"id": "art", "teacher_id": "ghost"})))
            .await;
        assert!(matches!(orphan, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn rejected_update_changes_nothing() {
        let store = seeded();
        let patch = row(json!({"teacher_id": "ghost"}));

        let res = store.update(Relation::Classrooms, &RowFilter::All, &patch).await;

        assert!(res.is_err());
        let rows = store.select(Relation::Classrooms, &RowFilter::All).await.unwrap();
        assert_eq!(rows[0].get_str("teacher_id"), Some("t1"));
    }

    #[tokio::test]
    async fn update_returns_post_images_and_delete_returns_removed() {
        let store = seeded();

        let updated = store
            .update(Relation::Classrooms, &RowFilter::eq("id", "math"), &row(json!({"name": "Algebra"})))
            .await
            .unwrap();
        assert_eq!(updated[0].get_str("name"), Some("Algebra"));

        let removed = store.delete(Relation::Classrooms, &RowFilter::eq("id", "nope")).await.unwrap();
        assert!(removed.is_empty());
        let removed = store.delete(Relation::Classrooms, &RowFilter::All).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(store.snapshot().unwrap().rows(Relation::Classrooms).is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_through_foreign_keys() {
        let mut t = Tables::new();
        t.push(Relation::Users, row(json!({"id": "t1", "role": "teacher"})));
        t.push(Relation::Users, row(json!({"id": "s1", "role": "student"})));
        for (id, teacher) in [("math", "t1"), ("art", "t1")] {
            t.push(Relation::Classrooms, row(json!({"id": id, "teacher_id": teacher})));
        }
        t.push(Relation::Enrollments, row(json!({"id": "e1", "classroom_id": "math", "user_id": "s1"})));
        t.push(Relation::Assignments, row(json!({"id": "a1", "classroom_id": "math"})));
        t.push(Relation::Assignments, row(json!({"id": "a2", "classroom_id": "art"})));
        t.push(Relation::Progress, row(json!({"id": "p1", "assignment_id": "a1", "user_id": "s1"})));
        t.push(Relation::Progress, row(json!({"id": "p2", "assignment_id": "a2", "user_id": "s1"})));
        let store = InMemoryRowStore::with_tables(t);

        let removed = store.delete(Relation::Classrooms, &RowFilter::eq("id", "math")).await.unwrap();

        assert_eq!(removed.len(), 1);
        let tables = store.snapshot().unwrap();
        assert!(tables.rows(Relation::Enrollments).is_empty());
        assert_eq!(tables.rows(Relation::Assignments).len(), 1);
        assert_eq!(tables.rows(Relation::Progress)[0].get_str("id"), Some("p2"));
        assert_eq!(tables.rows(Relation::Users).len(), 2);
    }
}
