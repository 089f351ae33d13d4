//! Row filters: the query-level form of a policy decision.
//!
//! A [`RowFilter`] is a tree of column conditions. `InRelation` nodes express
//! relationship chains ("this row's `assignment_id` is one of the assignment
//! ids whose classroom is owned by me") and are what ownership predicates
//! compile to. Backends either push the whole tree into the query (see
//! [`crate::sql`]) or [`resolve`](RowFilter::resolve) the subqueries against a
//! snapshot and evaluate rows in process with [`ResolvedFilter::matches`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use classguard_core::Row;

use crate::catalog::Relation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFilter {
    /// Matches every row.
    All,
    /// Matches no row.
    Nothing,
    /// `column == value` (a missing column compares as `null`).
    Eq { column: String, value: Value },
    /// `column ∈ values`.
    AnyOf { column: String, values: Vec<Value> },
    And(Vec<RowFilter>),
    Or(Vec<RowFilter>),
    /// `column ∈ (SELECT select FROM relation WHERE filter)`.
    InRelation {
        column: String,
        relation: Relation,
        select: String,
        filter: Box<RowFilter>,
    },
}

impl Default for RowFilter {
    fn default() -> Self {
        RowFilter::All
    }
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        RowFilter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn any_of<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        RowFilter::AnyOf {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn in_relation(
        column: impl Into<String>,
        relation: Relation,
        select: impl Into<String>,
        filter: RowFilter,
    ) -> Self {
        RowFilter::InRelation {
            column: column.into(),
            relation,
            select: select.into(),
            filter: Box::new(filter),
        }
    }

    /// Build a conjunction of `column == value` pairs (a caller's "match"
    /// filter such as `{status: 'submitted'}`).
    pub fn matching<'a>(pairs: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        pairs
            .into_iter()
            .fold(RowFilter::All, |acc, (c, v)| acc.and(RowFilter::eq(c, v)))
    }

    /// Intersection. `All` is the identity and `Nothing` absorbs.
    pub fn and(self, other: RowFilter) -> RowFilter {
        match (self, other) {
            (RowFilter::Nothing, _) | (_, RowFilter::Nothing) => RowFilter::Nothing,
            (RowFilter::All, f) | (f, RowFilter::All) => f,
            (RowFilter::And(mut a), RowFilter::And(b)) => {
                a.extend(b);
                RowFilter::And(a)
            }
            (RowFilter::And(mut a), f) => {
                a.push(f);
                RowFilter::And(a)
            }
            (f, RowFilter::And(mut b)) => {
                b.insert(0, f);
                RowFilter::And(b)
            }
            (a, b) => RowFilter::And(vec![a, b]),
        }
    }

    /// Union. `Nothing` is the identity and `All` absorbs.
    pub fn or(self, other: RowFilter) -> RowFilter {
        match (self, other) {
            (RowFilter::All, _) | (_, RowFilter::All) => RowFilter::All,
            (RowFilter::Nothing, f) | (f, RowFilter::Nothing) => f,
            (RowFilter::Or(mut a), RowFilter::Or(b)) => {
                a.extend(b);
                RowFilter::Or(a)
            }
            (RowFilter::Or(mut a), f) => {
                a.push(f);
                RowFilter::Or(a)
            }
            (a, b) => RowFilter::Or(vec![a, b]),
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, RowFilter::Nothing)
    }

    /// True if any node needs another relation to evaluate.
    pub fn has_subqueries(&self) -> bool {
        match self {
            RowFilter::InRelation { .. } => true,
            RowFilter::And(parts) | RowFilter::Or(parts) => parts.iter().any(Self::has_subqueries),
            _ => false,
        }
    }

    /// Replace every `InRelation` with the concrete set of values it selects
    /// from `source`, innermost first.
    pub fn resolve(&self, source: &dyn RowSource) -> ResolvedFilter {
        ResolvedFilter(self.resolve_inner(source))
    }

    fn resolve_inner(&self, source: &dyn RowSource) -> RowFilter {
        match self {
            RowFilter::All | RowFilter::Nothing | RowFilter::Eq { .. } | RowFilter::AnyOf { .. } => {
                self.clone()
            }
            RowFilter::And(parts) => parts
                .iter()
                .map(|p| p.resolve_inner(source))
                .fold(RowFilter::All, RowFilter::and),
            RowFilter::Or(parts) => parts
                .iter()
                .map(|p| p.resolve_inner(source))
                .fold(RowFilter::Nothing, RowFilter::or),
            RowFilter::InRelation {
                column,
                relation,
                select,
                filter,
            } => {
                let inner = filter.resolve(source);
                let values = select_values(source.rows(*relation), &inner, select);
                RowFilter::AnyOf {
                    column: column.clone(),
                    values,
                }
            }
        }
    }
}

/// Distinct values of `select` over the rows `filter` admits.
pub fn select_values<'a>(
    rows: impl IntoIterator<Item = &'a Row>,
    filter: &ResolvedFilter,
    select: &str,
) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    let mut values = Vec::new();
    for row in rows {
        if !filter.matches(row) {
            continue;
        }
        let Some(value) = row.get(select) else { continue };
        if value.is_null() {
            continue;
        }
        if seen.insert(value.to_string()) {
            values.push(value.clone());
        }
    }
    values
}

/// Synchronous view of stored rows, used to resolve subqueries in process.
pub trait RowSource {
    fn rows(&self, relation: Relation) -> &[Row];
}

/// A filter with no remaining subqueries; can be evaluated row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter(RowFilter);

impl ResolvedFilter {
    /// Wrap a filter that is already subquery-free.
    ///
    /// Returns `None` if it still contains `InRelation` nodes.
    pub fn new(filter: RowFilter) -> Option<Self> {
        if filter.has_subqueries() { None } else { Some(Self(filter)) }
    }

    /// Admits every row.
    pub fn all() -> Self {
        Self(RowFilter::All)
    }

    pub fn filter(&self) -> &RowFilter {
        &self.0
    }

    pub fn into_filter(self) -> RowFilter {
        self.0
    }

    pub fn matches(&self, row: &Row) -> bool {
        eval(&self.0, row)
    }
}

fn eval(filter: &RowFilter, row: &Row) -> bool {
    match filter {
        RowFilter::All => true,
        RowFilter::Nothing => false,
        RowFilter::Eq { column, value } => row.get(column).unwrap_or(&Value::Null) == value,
        RowFilter::AnyOf { column, values } => {
            let actual = row.get(column).unwrap_or(&Value::Null);
            values.iter().any(|v| v == actual)
        }
        RowFilter::And(parts) => parts.iter().all(|p| eval(p, row)),
        RowFilter::Or(parts) => parts.iter().any(|p| eval(p, row)),
        // Unreachable through `ResolvedFilter::new`/`resolve`; never admit.
        RowFilter::InRelation { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct Tables(HashMap<Relation, Vec<Row>>);

    impl RowSource for Tables {
        fn rows(&self, relation: Relation) -> &[Row] {
            self.0.get(&relation).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    fn row(v: serde_json::Value) -> Row {
        Row::try_from(v).unwrap()
    }

    fn tables() -> Tables {
        let mut t = HashMap::new();
        t.insert(
            Relation::Classrooms,
            vec![
                row(json!({"id": "math", "teacher_id": "t1"})),
                row(json!({"id": "history", "teacher_id": "t2"})),
            ],
        );
        t.insert(
            Relation::Assignments,
            vec![
                row(json!({"id": "a1", "classroom_id": "math"})),
                row(json!({"id": "a2", "classroom_id": "history"})),
            ],
        );
        Tables(t)
    }

    #[test]
    fn and_or_simplify_identities() {
        let f = RowFilter::eq("id", "x");
        assert_eq!(RowFilter::All.and(f.clone()), f);
        assert_eq!(f.clone().and(RowFilter::Nothing), RowFilter::Nothing);
        assert_eq!(RowFilter::Nothing.or(f.clone()), f);
        assert_eq!(f.clone().or(RowFilter::All), RowFilter::All);
    }

    #[test]
    fn resolve_chases_nested_relations() {
        let filter = RowFilter::in_relation(
            "assignment_id",
            Relation::Assignments,
            "id",
            RowFilter::in_relation(
                "classroom_id",
                Relation::Classrooms,
                "id",
                RowFilter::eq("teacher_id", "t1"),
            ),
        );

        let resolved = filter.resolve(&tables());

        assert_eq!(resolved.filter(), &RowFilter::any_of("assignment_id", ["a1"]));
        assert!(resolved.matches(&row(json!({"assignment_id": "a1"}))));
        assert!(!resolved.matches(&row(json!({"assignment_id": "a2"}))));
        assert!(!resolved.matches(&row(json!({}))));
    }

    #[test]
    fn empty_subquery_matches_nothing() {
        let filter = RowFilter::in_relation("id", Relation::Classrooms, "id", RowFilter::eq("teacher_id", "nobody"));
        let resolved = filter.resolve(&tables());
        assert!(!resolved.matches(&row(json!({"id": "math"}))));
    }

    #[test]
    fn missing_column_compares_as_null() {
        let f = ResolvedFilter::new(RowFilter::eq("description", Value::Null)).unwrap();
        assert!(f.matches(&row(json!({"id": "x"}))));
    }

    #[test]
    fn unresolved_filters_are_not_accepted_as_resolved() {
        let f = RowFilter::in_relation("id", Relation::Classrooms, "id", RowFilter::All);
        assert!(ResolvedFilter::new(f).is_none());
    }

    #[test]
    fn caller_filters_deserialize_from_json() {
        let f: RowFilter = serde_json::from_value(json!({
            "and": [
                {"eq": {"column": "status", "value": "submitted"}},
                "all"
            ]
        }))
        .unwrap();
        assert_eq!(
            f,
            RowFilter::And(vec![RowFilter::eq("status", "submitted"), RowFilter::All])
        );
    }
}
