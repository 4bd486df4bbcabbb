use crate::error::{DbError, DbResult};
use crate::types::{QueryAndParams, Record, RowValues};

use super::fragments::Fragments;

/// One `REPLACE(column, search, replace)` rewrite for [`TableBuilder::replace`].
///
/// [`TableBuilder::replace`]: super::TableBuilder::replace
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement {
    pub column: String,
    pub search: String,
    pub replace: String,
}

impl Replacement {
    pub fn new(
        column: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// Every column any row mentions, in first-seen order.
pub(crate) fn union_columns(rows: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}

impl Fragments {
    /// `set()` data followed by the record's columns; a record column overrides `set()`.
    fn merged_set(&self, record: Option<&Record>) -> (Vec<(String, String)>, Vec<RowValues>) {
        let mut columns: Vec<(String, String)> = Vec::new();
        let mut params = Vec::new();
        let mut set_params = self.set_params.iter();

        let overridden = |quoted: &str| {
            record.is_some_and(|r| r.columns().any(|c| self.write_column(c) == quoted))
        };
        for (column, value) in &self.set_data {
            let is_mark = value == self.placeholder();
            let param = if is_mark { set_params.next() } else { None };
            if overridden(column) {
                continue;
            }
            columns.push((column.clone(), value.clone()));
            if let Some(param) = param {
                params.push(param.clone());
            }
        }
        if let Some(record) = record {
            for (column, value) in record.iter() {
                columns.push((self.write_column(column), self.placeholder().to_string()));
                params.push(value.clone());
            }
        }
        (columns, params)
    }

    /// `INSERT INTO t (cols) VALUES (...)` for one row.
    ///
    /// # Errors
    /// Returns a deferred builder error, or `DbError::InvalidInput` when there is nothing to
    /// insert.
    pub fn compile_insert(&self, record: &Record, suffix: &str) -> DbResult<QueryAndParams> {
        self.check()?;
        let (columns, params) = self.merged_set(Some(record));
        if columns.is_empty() {
            return Err(DbError::InvalidInput(
                "insert requires at least one column".to_string(),
            ));
        }
        let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
        let values: Vec<&str> = columns.iter().map(|(_, v)| v.as_str()).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){suffix}",
            self.table,
            names.join(", "),
            values.join(", ")
        );
        Ok(QueryAndParams::new(self.dialect.seed_placeholders(&sql), params))
    }

    /// Multi-row insert; a column missing from a row is written as `DEFAULT`.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for an empty batch.
    pub(crate) fn compile_insert_rows(
        &self,
        rows: &[Record],
        suffix: &str,
    ) -> DbResult<QueryAndParams> {
        self.check()?;
        let columns = union_columns(rows);
        if columns.is_empty() {
            return Err(DbError::InvalidInput(
                "batch insert requires at least one column".to_string(),
            ));
        }

        let mut params = Vec::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let cells: Vec<&str> = columns
                .iter()
                .map(|column| match row.get(column) {
                    Some(value) => {
                        params.push(value.clone());
                        self.placeholder()
                    }
                    None => "DEFAULT",
                })
                .collect();
            tuples.push(format!("({})", cells.join(", ")));
        }

        let names: Vec<String> = columns.iter().map(|c| self.write_column(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}{suffix}",
            self.table,
            names.join(", "),
            tuples.join(", ")
        );
        Ok(QueryAndParams::new(self.dialect.seed_placeholders(&sql), params))
    }

    fn with_where(&self, sql: &mut String, params: &mut Vec<RowValues>) {
        if !self.wheres.is_empty() {
            sql.push(' ');
            sql.push_str(&self.wheres.render());
            params.extend(self.wheres.params.iter().cloned());
        }
    }

    /// `UPDATE t SET col = val[, ...] [WHERE ...]`.
    ///
    /// # Errors
    /// Returns a deferred builder error, or `DbError::InvalidInput` when nothing is set.
    pub fn compile_update(&self, record: &Record) -> DbResult<QueryAndParams> {
        self.check()?;
        let (columns, mut params) = self.merged_set(Some(record));
        if columns.is_empty() {
            return Err(DbError::InvalidInput(
                "update requires at least one column to set".to_string(),
            ));
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|(column, value)| format!("{column} = {value}"))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        self.with_where(&mut sql, &mut params);
        Ok(QueryAndParams::new(self.dialect.seed_placeholders(&sql), params))
    }

    /// `UPDATE t SET col = REPLACE(col, search, replace)[, ...] [WHERE ...]`.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for an empty replacement list.
    pub fn compile_replace(&self, replacements: &[Replacement]) -> DbResult<QueryAndParams> {
        self.check()?;
        if replacements.is_empty() {
            return Err(DbError::InvalidInput(
                "replace requires at least one column".to_string(),
            ));
        }
        let mark = self.placeholder();
        let mut params = Vec::with_capacity(replacements.len() * 2);
        let assignments: Vec<String> = replacements
            .iter()
            .map(|r| {
                params.push(RowValues::Text(r.search.clone()));
                params.push(RowValues::Text(r.replace.clone()));
                let column = self.write_column(&r.column);
                format!("{column} = REPLACE({column}, {mark}, {mark})")
            })
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        self.with_where(&mut sql, &mut params);
        Ok(QueryAndParams::new(self.dialect.seed_placeholders(&sql), params))
    }

    /// `DELETE FROM t [WHERE ...]`.
    ///
    /// # Errors
    /// Returns a deferred builder error.
    pub fn compile_delete(&self) -> DbResult<QueryAndParams> {
        self.check()?;
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", self.table);
        self.with_where(&mut sql, &mut params);
        Ok(QueryAndParams::new(self.dialect.seed_placeholders(&sql), params))
    }

    /// `TRUNCATE TABLE t`, or a full `DELETE` when truncation is disabled.
    #[must_use]
    pub fn compile_truncate(&self) -> String {
        if self.allow_truncate {
            format!("TRUNCATE TABLE {}", self.table)
        } else {
            self.compile_empty_table()
        }
    }

    #[must_use]
    pub fn compile_empty_table(&self) -> String {
        format!("DELETE FROM {}", self.table)
    }
}
