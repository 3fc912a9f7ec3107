//! Row and streaming types for query results.

use crate::error::AppError;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::pin::Pin;

/// Parameters bound to a statement, by name.
pub type Params = HashMap<String, JsonValue>;

/// A stream of rows from a query result.
///
/// Rows are fetched on demand, not loaded all at once.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<Row, AppError>> + Send + 'a>>;

/// A single result row: column name to JSON value.
///
/// The column layout depends on the backend that produced the row; typed
/// extraction is available through [`Row::get`] and [`Row::get_opt`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    data: HashMap<String, JsonValue>,
}

impl Row {
    pub fn new(data: HashMap<String, JsonValue>) -> Self {
        Self { data }
    }

    /// Gets a column, deserializing to the requested type.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if the column is missing or has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        self.data
            .get(key)
            .ok_or_else(|| AppError::Decode(format!("column not found: {}", key)))
            .and_then(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| AppError::Decode(format!("failed to deserialize '{}': {}", key, e)))
            })
    }

    /// Gets a column, treating a missing key or `null` as `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.data.get(key) {
            Some(v) if v.is_null() => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| AppError::Decode(format!("failed to deserialize '{}': {}", key, e))),
            None => Ok(None),
        }
    }

    /// Returns the raw JSON value for a column, if it exists.
    pub fn get_raw(&self, key: &str) -> Option<&JsonValue> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> HashMap<String, JsonValue> {
        self.data
    }
}

impl From<HashMap<String, JsonValue>> for Row {
    fn from(data: HashMap<String, JsonValue>) -> Self {
        Self::new(data)
    }
}

impl From<Map<String, JsonValue>> for Row {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self::new(map.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => Row::from(map),
            _ => panic!("row fixture must be an object"),
        }
    }

    #[test]
    fn test_row_get_typed() {
        let row = row(json!({"name": "Alice", "count": 42}));

        let name: String = row.get("name").unwrap();
        let count: i64 = row.get("count").unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(count, 42);
    }

    #[test]
    fn test_row_get_missing_key_is_decode_error() {
        let row = Row::default();
        let result: Result<String, _> = row.get("missing");
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[test]
    fn test_row_get_wrong_type_is_decode_error() {
        let row = row(json!({"observations": 7}));
        let result: Result<Vec<String>, _> = row.get("observations");
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[test]
    fn test_row_get_opt_missing_and_null() {
        let row = row(json!({"name": null}));

        let name: Option<String> = row.get_opt("name").unwrap();
        let other: Option<String> = row.get_opt("other").unwrap();
        assert_eq!(name, None);
        assert_eq!(other, None);
    }

    #[test]
    fn test_row_columns() {
        let row = row(json!({"a": 1, "b": 2}));

        let mut columns: Vec<_> = row.columns().collect();
        columns.sort();
        assert_eq!(columns, vec!["a", "b"]);
        assert!(row.contains("a"));
        assert_eq!(row.len(), 2);
    }
}
