//! Render row filters as parameterized Postgres `WHERE` fragments.
//!
//! Column values are compared as `jsonb` so a single parameter type covers
//! text, uuid, integer and timestamp columns: the store binds every parameter
//! as JSON. Foreign-key chains become nested `IN (SELECT ...)` subqueries, so
//! policy is applied inside the query and no denied row leaves the database.

use serde_json::Value;

use crate::filter::RowFilter;

/// SQL text plus the JSON parameters it references (`$n`, 1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Quote an identifier. Names come from the catalog, but quoting keeps any
/// caller-supplied column name inert.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn render_where(filter: &RowFilter) -> SqlFragment {
    render_where_offset(filter, 0)
}

/// Like [`render_where`], numbering parameters after `offset` existing ones.
pub fn render_where_offset(filter: &RowFilter, offset: usize) -> SqlFragment {
    let mut writer = Writer {
        sql: String::new(),
        params: Vec::new(),
        offset,
    };
    writer.filter(filter);
    SqlFragment {
        sql: writer.sql,
        params: writer.params,
    }
}

struct Writer {
    sql: String,
    params: Vec<Value>,
    offset: usize,
}

impl Writer {
    fn param(&mut self, value: &Value) -> String {
        self.params.push(value.clone());
        format!("${}", self.offset + self.params.len())
    }

    fn join(&mut self, parts: &[RowFilter], op: &str, empty: &str) {
        if parts.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(op);
            }
            self.filter(part);
        }
        self.sql.push(')');
    }

    fn filter(&mut self, filter: &RowFilter) {
        match filter {
            RowFilter::All => self.sql.push_str("TRUE"),
            RowFilter::Nothing => self.sql.push_str("FALSE"),
            RowFilter::Eq { column, value } if value.is_null() => {
                self.sql.push_str(&format!("{} IS NULL", quote_ident(column)));
            }
            RowFilter::Eq { column, value } => {
                let p = self.param(value);
                self.sql.push_str(&format!("to_jsonb({}) = {}", quote_ident(column), p));
            }
            RowFilter::AnyOf { values, .. } if values.is_empty() => self.sql.push_str("FALSE"),
            RowFilter::AnyOf { column, values } => {
                let placeholders: Vec<String> = values.iter().map(|v| self.param(v)).collect();
                self.sql.push_str(&format!(
                    "to_jsonb({}) IN ({})",
                    quote_ident(column),
                    placeholders.join(", ")
                ));
            }
            RowFilter::And(parts) => self.join(parts, " AND ", "TRUE"),
            RowFilter::Or(parts) => self.join(parts, " OR ", "FALSE"),
            RowFilter::InRelation {
                column,
                relation,
                select,
                filter,
            } => {
                self.sql.push_str(&format!(
                    "{} IN (SELECT {} FROM {} WHERE ",
                    quote_ident(column),
                    quote_ident(select),
                    quote_ident(relation.as_str())
                ));
                self.filter(filter);
                self.sql.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Relation;
    use serde_json::json;

    #[test]
    fn ownership_chain_renders_as_nested_subqueries() {
        let filter = RowFilter::in_relation(
            "assignment_id",
            Relation::Assignments,
            "id",
            RowFilter::in_relation("classroom_id", Relation::Classrooms, "id", RowFilter::eq("teacher_id", "t1")),
        )
        .and(RowFilter::eq("status", "submitted"));

        let fragment = render_where(&filter);

        assert_eq!(
            fragment.sql,
            "(\"assignment_id\" IN (SELECT \"id\" FROM \"assignments\" WHERE \
             \"classroom_id\" IN (SELECT \"id\" FROM \"classrooms\" WHERE to_jsonb(\"teacher_id\") = $1)) \
             AND to_jsonb(\"status\") = $2)"
        );
        assert_eq!(fragment.params, vec![json!("t1"), json!("submitted")]);
    }

    #[test]
    fn offsets_and_edge_cases() {
        let f = render_where_offset(&RowFilter::any_of("id", ["a", "b"]), 3);
        assert_eq!(f.sql, "to_jsonb(\"id\") IN ($4, $5)");

        assert_eq!(render_where(&RowFilter::Nothing).sql, "FALSE");
        assert_eq!(render_where(&RowFilter::AnyOf { column: "id".into(), values: vec![] }).sql, "FALSE");
        assert_eq!(render_where(&RowFilter::eq("description", Value::Null)).sql, "\"description\" IS NULL");
    }

    #[test]
    fn hostile_values_stay_in_parameters() {
        let f = render_where(&RowFilter::eq("user_id", "'; DROP TABLE progress; --"));
        assert_eq!(f.sql, "to_jsonb(\"user_id\") = $1");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
