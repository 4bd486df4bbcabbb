use std::collections::HashMap;
use std::sync::Arc;

use super::row::{DbRow, index_columns};
use crate::types::{Record, RowValues};

/// A result set from a database query
///
/// Row-returning statements fill `results`; write statements leave it empty and report
/// `rows_affected` (and, on MySQL, `insert_id`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<DbRow>,
    /// The number of rows affected (for DML statements) or returned (for queries)
    pub rows_affected: usize,
    /// Auto-increment id reported by the engine for the last insert
    pub insert_id: Option<i64>,
    column_names: Option<Arc<Vec<String>>>,
    #[doc(hidden)]
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Result of a statement that returned no rows.
    #[must_use]
    pub fn affected(rows_affected: usize) -> ResultSet {
        ResultSet {
            rows_affected,
            ..ResultSet::default()
        }
    }

    /// Build a result set from column names and row values in one go.
    ///
    /// ```rust
    /// use querykit::prelude::*;
    ///
    /// let rs = ResultSet::from_rows(&["id", "name"], vec![vec![1.into(), "a".into()]]);
    /// assert_eq!(rs.first().and_then(|r| r.get("name")), Some(&RowValues::Text("a".into())));
    /// ```
    #[must_use]
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut rs = ResultSet::with_capacity(rows.len());
        rs.set_column_names(Arc::new(columns.iter().map(ToString::to_string).collect()));
        for row in rows {
            rs.add_row_values(row);
        }
        rs
    }

    /// Set the column names for this result set (shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(index_columns(&column_names));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set; ignored until column names are set.
    pub fn add_row_values(&mut self, values: Vec<RowValues>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        {
            self.results.push(DbRow {
                column_names: column_names.clone(),
                values,
                column_index: column_index.clone(),
            });
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&DbRow> {
        self.results.first()
    }

    /// Owned records, one per row.
    #[must_use]
    pub fn to_records(&self) -> Vec<Record> {
        self.results.iter().map(DbRow::to_record).collect()
    }

    /// Values of one column across all rows; rows without it are skipped.
    #[must_use]
    pub fn column(&self, name: &str) -> Vec<RowValues> {
        self.results
            .iter()
            .filter_map(|row| row.get(name).cloned())
            .collect()
    }
}
