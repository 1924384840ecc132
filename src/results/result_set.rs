use std::collections::HashMap;
use std::sync::Arc;

use super::row::Row;
use crate::types::Value;

/// Every row of a query, read to the end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<Row>,
    /// Row count the engine reported when the result was exhausted
    pub rows_affected: i64,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with a known capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index: None,
        }
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(Row::build_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row built from bare values, sharing this result's column names
    pub fn add_row_values(&mut self, row_values: Vec<Value>) {
        if self.column_names.is_none() {
            self.set_column_names(Arc::new(Vec::new()));
        }
        let row = match (&self.column_names, &self.column_index) {
            (Some(names), Some(index)) => {
                Row::with_index(Arc::clone(names), Arc::clone(index), row_values)
            }
            (Some(names), None) => Row::new(Arc::clone(names), row_values),
            (None, _) => Row::new(Arc::new(Vec::new()), row_values),
        };
        self.results.push(row);
    }

    /// Add a row
    pub fn add_row(&mut self, row: Row) {
        if self.column_names.is_none() {
            self.column_names = Some(Arc::clone(&row.column_names));
        }
        self.results.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The single value of a one-row, one-column result, as `select count(*)` returns.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        match self.results.as_slice() {
            [row] if row.len() == 1 => row.get_by_index(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_names() {
        let mut rs = ResultSet::with_capacity(2);
        rs.set_column_names(Arc::new(vec!["n".into()]));
        rs.add_row_values(vec![Value::Int64(1)]);
        rs.add_row_values(vec![Value::Int64(2)]);
        assert_eq!(rs.len(), 2);
        assert!(Arc::ptr_eq(
            &rs.results[0].column_names,
            &rs.results[1].column_names
        ));
        assert_eq!(rs.results[1].get("n"), Some(&Value::Int64(2)));
        assert_eq!(rs.scalar(), None);
    }
}
