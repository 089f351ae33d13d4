//! Untyped row representation shared by the policy engine and storage.
//!
//! Rows are JSON objects keyed by column name. Typed records convert to and
//! from rows through serde, so ids appear as hyphenated strings and
//! timestamps as RFC 3339 strings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Serialize a typed record into a row.
    pub fn from_record<T: Serialize>(record: &T) -> DomainResult<Self> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(DomainError::row_conversion(format!(
                "record serialized to non-object value: {other}"
            ))),
            Err(e) => Err(DomainError::row_conversion(e.to_string())),
        }
    }

    /// Deserialize the row into a typed record.
    pub fn to_record<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| DomainError::row_conversion(e.to_string()))
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.0.get(column).and_then(Value::as_i64)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    /// Builder-style `set`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite this row's columns with the columns of `patch`.
    pub fn apply_patch(&mut self, patch: &Row) {
        for (column, value) in &patch.0 {
            self.0.insert(column.clone(), value.clone());
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Row {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl TryFrom<Value> for Row {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::row_conversion(format!(
                "expected JSON object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_overwrites_only_patched_columns() {
        let mut row = Row::try_from(json!({"id": "a", "status": "pending", "points_earned": 0})).unwrap();
        let patch = Row::new().with("status", "graded").with("points_earned", 85);

        row.apply_patch(&patch);

        assert_eq!(row.get_str("id"), Some("a"));
        assert_eq!(row.get_str("status"), Some("graded"));
        assert_eq!(row.get_i64("points_earned"), Some(85));
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert!(Row::try_from(json!([1, 2, 3])).is_err());
    }
}
