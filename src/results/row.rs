use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::types::Value;

/// A row from a query result
///
/// Column names (and the name index built from them) are shared by every row of the same result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub values: Vec<Value>,
    column_index: Arc<HashMap<String, usize>>,
}

impl Row {
    /// Create a row, building a fresh name index
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        let column_index = Arc::new(Self::build_index(&column_names));
        Self::with_index(column_names, column_index, values)
    }

    pub(crate) fn with_index(
        column_names: Arc<Vec<String>>,
        column_index: Arc<HashMap<String, usize>>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index,
        }
    }

    /// Name to position map. The first of several equally named columns wins.
    pub(crate) fn build_index(column_names: &[String]) -> HashMap<String, usize> {
        let mut index = HashMap::with_capacity(column_names.len());
        for (i, name) in column_names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        index
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index.get(column_name) {
            return Some(idx);
        }

        // Engine names are usually lower case; accept any casing
        self.column_names
            .iter()
            .position(|col| col.eq_ignore_ascii_case(column_name))
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The row as a JSON object keyed by column name.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .column_names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), JsonValue::from(value.clone())))
            .collect();
        JsonValue::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_position() {
        let row = Row::new(
            Arc::new(vec!["reltid".into(), "relid".into()]),
            vec![Value::Int32(7), Value::from("iirelation")],
        );
        assert_eq!(row.get("relid"), Some(&Value::from("iirelation")));
        assert_eq!(row.get("RELTID"), Some(&Value::Int32(7)));
        assert_eq!(row.get_by_index(2), None);
        assert_eq!(
            row.to_json(),
            serde_json::json!({"reltid": 7, "relid": "iirelation"})
        );
    }
}
