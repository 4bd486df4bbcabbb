//! Table-scoped query builders.
//!
//! A builder is bound to one table and one driver. Fluent calls accumulate fragments in a
//! shared [`Fragments`] value; terminal calls compile them for the driver's dialect,
//! execute, and (with `reset = true`) clear the accumulated state so the builder can be
//! reused:
//! ```rust,no_run
//! use querykit::prelude::*;
//!
//! # async fn demo(driver: &mut dyn Driver) -> DbResult<()> {
//! let mut users = driver.table("users");
//! let active = users
//!     .select("id, email")
//!     .where_("active", "=", true)
//!     .group_start()
//!     .like("email", "@example.com", LikeSide::Before)
//!     .or_where_null("email")
//!     .group_end()
//!     .order_by("id", "DESC")
//!     .limit(20)
//!     .get_result_array(true)
//!     .await?;
//! # let _ = active;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

mod any;
mod dml;
mod fragments;
mod mysql;
mod postgres;
mod select;

pub use any::Builder;
pub use dml::Replacement;
pub use fragments::{Fragments, LikeSide};
pub use mysql::MySqlBuilder;
pub use postgres::PgBuilder;

use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::placeholders::interpolate;
use crate::results::{DbRow, ResultSet};
use crate::types::{QueryAndParams, Record, RowValues};
use fragments::{Clause, Conj};
use select::COUNT_ALIAS;

/// Rows written per statement by the bulk operations.
pub const BATCH_SIZE: usize = 100;

/// Column name → SQL type, as reported by the catalog.
pub type ColumnTypes = HashMap<String, String>;

/// Outcome of a single-row insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub status: bool,
    /// Generated key: the auto-increment id on MySQL, the key column from `RETURNING *`
    /// on PostgreSQL.
    pub insert_id: Option<RowValues>,
}

/// Outcome of an update, delete or bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// True when every statement issued for the call succeeded
    pub status: bool,
    pub affected_rows: usize,
}

impl UpdateResult {
    fn merge(self, other: UpdateResult) -> UpdateResult {
        UpdateResult {
            status: self.status && other.status,
            affected_rows: self.affected_rows + other.affected_rows,
        }
    }
}

/// Text content of a catalog cell; some servers report names as binary strings.
pub(crate) fn cell_text(value: &RowValues) -> Option<String> {
    match value {
        RowValues::Text(s) => Some(s.clone()),
        RowValues::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Execute one compiled statement, labelled `table::operation` for the query log.
async fn run<B: TableBuilder + ?Sized>(
    builder: &mut B,
    operation: &str,
    query: QueryAndParams,
) -> DbResult<usize> {
    let call_site = format!("{}::{operation}", builder.fragments().table_name());
    let driver = builder.driver();
    driver.annotate(&call_site);
    driver.prepared_query(&query.query, &query.params).await
}

/// Execute and take the stashed result.
async fn fetch<B: TableBuilder + ?Sized>(
    builder: &mut B,
    operation: &str,
    query: QueryAndParams,
) -> DbResult<ResultSet> {
    run(builder, operation, query).await?;
    builder.driver().get_result_array()
}

async fn write<B: TableBuilder + ?Sized>(
    builder: &mut B,
    operation: &str,
    query: DbResult<QueryAndParams>,
) -> DbResult<UpdateResult> {
    let affected_rows = run(builder, operation, query?).await?;
    Ok(UpdateResult {
        status: true,
        affected_rows,
    })
}

async fn insert_rows<B: TableBuilder + ?Sized>(
    builder: &mut B,
    rows: &[Record],
) -> DbResult<UpdateResult> {
    if rows.is_empty() || rows.iter().all(Record::is_empty) {
        return Err(DbError::InvalidInput("insert_bulk requires rows".to_string()));
    }
    let mut total = UpdateResult {
        status: true,
        affected_rows: 0,
    };
    for chunk in rows.chunks(BATCH_SIZE) {
        let query = builder.fragments().compile_insert_rows(chunk, "");
        total = total.merge(write(builder, "insert_bulk", query).await?);
    }
    Ok(total)
}

async fn upsert_rows<B: TableBuilder + ?Sized>(
    builder: &mut B,
    operation: &str,
    rows: &[Record],
    key: &str,
    excluded: &[&str],
) -> DbResult<UpdateResult> {
    if rows.is_empty() || rows.iter().all(Record::is_empty) {
        return Err(DbError::InvalidInput(format!("{operation} requires rows")));
    }
    let mut total = UpdateResult {
        status: true,
        affected_rows: 0,
    };
    for chunk in rows.chunks(BATCH_SIZE) {
        let columns = dml::union_columns(chunk);
        let clause = builder.upsert_clause(&columns, key, excluded);
        let query = builder.fragments().compile_insert_rows(chunk, &clause);
        total = total.merge(write(builder, operation, query).await?);
    }
    Ok(total)
}

/// Every row must carry the same columns, including the key.
fn bulk_update_columns(rows: &[Record], key: &str) -> DbResult<Vec<String>> {
    let first = rows
        .first()
        .ok_or_else(|| DbError::InvalidInput("update_bulk requires rows".to_string()))?;
    let columns: Vec<String> = first.columns().map(ToString::to_string).collect();
    if !first.contains(key) {
        return Err(DbError::InvalidInput(format!(
            "every update_bulk row must carry the key column \"{key}\""
        )));
    }
    if columns.len() < 2 {
        return Err(DbError::InvalidInput(
            "update_bulk rows need at least one column besides the key".to_string(),
        ));
    }
    for (i, row) in rows.iter().enumerate().skip(1) {
        if row.len() != columns.len() || !columns.iter().all(|c| row.contains(c)) {
            return Err(DbError::InvalidInput(format!(
                "update_bulk row {i} does not have the same columns as the first row"
            )));
        }
    }
    Ok(columns)
}

async fn update_rows<B: TableBuilder + ?Sized>(
    builder: &mut B,
    rows: &[Record],
    key: &str,
) -> DbResult<UpdateResult> {
    builder.fragments().check()?;
    let columns = bulk_update_columns(rows, key)?;
    let types = builder.column_types().await?;
    let mut total = UpdateResult {
        status: true,
        affected_rows: 0,
    };
    for chunk in rows.chunks(BATCH_SIZE) {
        let affected_rows = builder.update_bulk_chunk(chunk, key, &columns, &types).await?;
        total = total.merge(UpdateResult {
            status: true,
            affected_rows,
        });
    }
    Ok(total)
}

fn count_value(row: Option<&DbRow>) -> DbResult<u64> {
    match row.and_then(|r| r.get(COUNT_ALIAS)) {
        Some(RowValues::Int(n)) => u64::try_from(*n)
            .map_err(|e| DbError::Execution(format!("invalid row count: {e}"))),
        Some(RowValues::Text(s)) => s
            .parse()
            .map_err(|e| DbError::Execution(format!("invalid row count \"{s}\": {e}"))),
        Some(RowValues::Float(f)) if *f >= 0.0 => Ok(*f as u64),
        _ => Ok(0),
    }
}

/// A table-scoped query builder.
///
/// Implementors supply the state, the driver and the few statements whose shape differs
/// between dialects; every fluent and terminal method is provided on top of those.
#[async_trait]
pub trait TableBuilder: Send {
    fn fragments(&self) -> &Fragments;

    fn fragments_mut(&mut self) -> &mut Fragments;

    fn driver(&mut self) -> &mut dyn Driver;

    /// Insert one row and report the generated key.
    ///
    /// # Errors
    /// Returns a deferred builder error, `DbError::InvalidInput` for an empty row, or the
    /// driver's execution error.
    async fn insert(&mut self, record: Record, reset: bool) -> DbResult<InsertResult>;

    /// The conflict clause appended to an upsert's multi-row insert.
    fn upsert_clause(&self, columns: &[String], key: &str, excluded: &[&str]) -> String;

    /// Column types of the bound table, used to stage bulk updates.
    ///
    /// # Errors
    /// Returns `DbError::SchemaIntrospection` when the catalog cannot be read.
    async fn column_types(&mut self) -> DbResult<ColumnTypes>;

    /// Apply one chunk of a bulk update; returns the affected row count.
    ///
    /// # Errors
    /// Returns `DbError::SchemaIntrospection` for a column without a known type, or the
    /// driver's execution error.
    async fn update_bulk_chunk(
        &mut self,
        rows: &[Record],
        key: &str,
        columns: &[String],
        types: &ColumnTypes,
    ) -> DbResult<usize>;

    // ---- fluent surface ----

    fn select(&mut self, columns: &str) -> &mut Self {
        self.fragments_mut().select(columns);
        self
    }

    fn select_raw(&mut self, expression: &str) -> &mut Self {
        self.fragments_mut().select_raw(expression);
        self
    }

    fn select_max(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.fragments_mut().select_aggregate("MAX", column, alias);
        self
    }

    fn select_min(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.fragments_mut().select_aggregate("MIN", column, alias);
        self
    }

    fn select_avg(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.fragments_mut().select_aggregate("AVG", column, alias);
        self
    }

    fn select_sum(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.fragments_mut().select_aggregate("SUM", column, alias);
        self
    }

    fn select_count(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.fragments_mut().select_aggregate("COUNT", column, alias);
        self
    }

    fn distinct(&mut self) -> &mut Self {
        self.fragments_mut().distinct();
        self
    }

    /// `join_type` is one of `""`, `inner`, `left`, `right`, `cross`, or (PostgreSQL)
    /// `full`/`outer`; `table` may carry an alias (`"comments c"`).
    fn join(&mut self, table: &str, condition: &str, join_type: &str) -> &mut Self {
        self.fragments_mut().join(table, condition, join_type);
        self
    }

    fn join_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.fragments_mut().join_raw(sql, params);
        self
    }

    fn where_(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.fragments_mut()
            .compare(Clause::Where, Conj::And, column, op, value.into());
        self
    }

    fn or_where(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.fragments_mut()
            .compare(Clause::Where, Conj::Or, column, op, value.into());
        self
    }

    /// Raw predicate; `?` marks bind `params` in order on either dialect.
    fn where_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.fragments_mut()
            .raw_predicate(Clause::Where, Conj::And, sql, params);
        self
    }

    fn or_where_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.fragments_mut()
            .raw_predicate(Clause::Where, Conj::Or, sql, params);
        self
    }

    fn where_column(&mut self, left: &str, op: &str, right: &str) -> &mut Self {
        self.fragments_mut()
            .column_comparison(Conj::And, left, op, right);
        self
    }

    fn where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fragments_mut().in_list(Conj::And, column, values, false);
        self
    }

    fn or_where_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fragments_mut().in_list(Conj::Or, column, values, false);
        self
    }

    fn where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fragments_mut().in_list(Conj::And, column, values, true);
        self
    }

    fn or_where_not_in<I, V>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fragments_mut().in_list(Conj::Or, column, values, true);
        self
    }

    fn where_null(&mut self, column: &str) -> &mut Self {
        self.fragments_mut().null_check(Conj::And, column, false);
        self
    }

    fn or_where_null(&mut self, column: &str) -> &mut Self {
        self.fragments_mut().null_check(Conj::Or, column, false);
        self
    }

    fn where_not_null(&mut self, column: &str) -> &mut Self {
        self.fragments_mut().null_check(Conj::And, column, true);
        self
    }

    fn or_where_not_null(&mut self, column: &str) -> &mut Self {
        self.fragments_mut().null_check(Conj::Or, column, true);
        self
    }

    fn where_between(
        &mut self,
        column: &str,
        low: impl Into<RowValues>,
        high: impl Into<RowValues>,
    ) -> &mut Self {
        self.fragments_mut()
            .between(Conj::And, column, low.into(), high.into());
        self
    }

    fn or_where_between(
        &mut self,
        column: &str,
        low: impl Into<RowValues>,
        high: impl Into<RowValues>,
    ) -> &mut Self {
        self.fragments_mut()
            .between(Conj::Or, column, low.into(), high.into());
        self
    }

    fn like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.fragments_mut()
            .like(Conj::And, column, value, side, false);
        self
    }

    fn or_like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.fragments_mut()
            .like(Conj::Or, column, value, side, false);
        self
    }

    fn not_like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.fragments_mut()
            .like(Conj::And, column, value, side, true);
        self
    }

    fn or_not_like(&mut self, column: &str, value: &str, side: LikeSide) -> &mut Self {
        self.fragments_mut()
            .like(Conj::Or, column, value, side, true);
        self
    }

    fn group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Where, Conj::And, false);
        self
    }

    fn or_group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Where, Conj::Or, false);
        self
    }

    fn not_group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Where, Conj::And, true);
        self
    }

    fn or_not_group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Where, Conj::Or, true);
        self
    }

    fn group_end(&mut self) -> &mut Self {
        self.fragments_mut().close_group(Clause::Where);
        self
    }

    fn having(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.fragments_mut()
            .compare(Clause::Having, Conj::And, column, op, value.into());
        self
    }

    fn or_having(&mut self, column: &str, op: &str, value: impl Into<RowValues>) -> &mut Self {
        self.fragments_mut()
            .compare(Clause::Having, Conj::Or, column, op, value.into());
        self
    }

    fn having_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.fragments_mut()
            .raw_predicate(Clause::Having, Conj::And, sql, params);
        self
    }

    fn or_having_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.fragments_mut()
            .raw_predicate(Clause::Having, Conj::Or, sql, params);
        self
    }

    fn having_group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Having, Conj::And, false);
        self
    }

    fn or_having_group_start(&mut self) -> &mut Self {
        self.fragments_mut()
            .open_group(Clause::Having, Conj::Or, false);
        self
    }

    fn having_group_end(&mut self) -> &mut Self {
        self.fragments_mut().close_group(Clause::Having);
        self
    }

    fn group_by(&mut self, columns: &str) -> &mut Self {
        self.fragments_mut().group_by(columns);
        self
    }

    /// `direction` is `ASC`, `DESC` or `RANDOM` (case-insensitive; empty means `ASC`).
    fn order_by(&mut self, columns: &str, direction: &str) -> &mut Self {
        self.fragments_mut().order_by(columns, direction);
        self
    }

    fn order_by_raw(&mut self, expression: &str) -> &mut Self {
        self.fragments_mut().order_by_raw(expression);
        self
    }

    fn limit(&mut self, limit: u64) -> &mut Self {
        self.fragments_mut().limit(limit);
        self
    }

    fn offset(&mut self, offset: u64) -> &mut Self {
        self.fragments_mut().offset(offset);
        self
    }

    fn for_update(&mut self) -> &mut Self {
        self.fragments_mut().for_update();
        self
    }

    fn set(&mut self, column: &str, value: impl Into<RowValues>) -> &mut Self {
        self.fragments_mut().set(column, value.into());
        self
    }

    fn set_raw(&mut self, column: &str, expression: &str) -> &mut Self {
        self.fragments_mut().set_raw(column, expression);
        self
    }

    fn set_record(&mut self, record: &Record) -> &mut Self {
        self.fragments_mut().set_record(record);
        self
    }

    /// Column read back as the insert id on PostgreSQL (default `id`).
    fn key(&mut self, column: &str) -> &mut Self {
        self.fragments_mut().key = column.to_string();
        self
    }

    /// Clear all accumulated state, including any deferred error.
    fn reset_query(&mut self) -> &mut Self {
        self.fragments_mut().reset();
        self
    }

    // ---- reads ----

    /// # Errors
    /// Returns a deferred builder error or the driver's execution error.
    async fn get(&mut self, reset: bool) -> DbResult<ResultSet> {
        let outcome = match self.fragments().compile_select() {
            Ok(query) => fetch(self, "get", query).await,
            Err(e) => Err(e),
        };
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// # Errors
    /// Same as [`TableBuilder::get`].
    async fn get_result_array(&mut self, reset: bool) -> DbResult<Vec<DbRow>> {
        Ok(self.get(reset).await?.results)
    }

    /// # Errors
    /// Same as [`TableBuilder::get`].
    async fn get_row_array(&mut self, reset: bool) -> DbResult<Option<DbRow>> {
        Ok(self.get(reset).await?.results.into_iter().next())
    }

    /// First matching row; sets `LIMIT 1`.
    ///
    /// # Errors
    /// Same as [`TableBuilder::get`].
    async fn first(&mut self, reset: bool) -> DbResult<Option<DbRow>> {
        self.limit(1);
        self.get_row_array(reset).await
    }

    /// # Errors
    /// Same as [`TableBuilder::get`].
    async fn count_all_results(&mut self, reset: bool) -> DbResult<u64> {
        let outcome = match self.fragments().compile_count() {
            Ok(query) => match fetch(self, "count_all_results", query).await {
                Ok(result) => count_value(result.first()),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        if reset {
            self.reset_query();
        }
        outcome
    }

    // ---- writes ----

    /// Insert rows in chunks of [`BATCH_SIZE`]; a column missing from a row gets
    /// `DEFAULT`. Chunks already written stay written when a later chunk fails.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for an empty batch or the first chunk's error.
    async fn insert_bulk(&mut self, rows: Vec<Record>, reset: bool) -> DbResult<UpdateResult> {
        let outcome = insert_rows(self, &rows).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// # Errors
    /// Returns a deferred builder error, `DbError::InvalidInput` when nothing is set, or the
    /// driver's execution error.
    async fn update(&mut self, record: Record, reset: bool) -> DbResult<UpdateResult> {
        let query = self.fragments().compile_update(&record);
        let outcome = write(self, "update", query).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// Update many rows keyed by `key` through a staging structure, in chunks of
    /// [`BATCH_SIZE`]. Accumulated WHERE predicates further restrict the target rows.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` when rows disagree on their columns or lack the key,
    /// `DbError::SchemaIntrospection` when a column type is unknown, or the first chunk's
    /// execution error.
    async fn update_bulk(
        &mut self,
        rows: Vec<Record>,
        key: &str,
        reset: bool,
    ) -> DbResult<UpdateResult> {
        let outcome = update_rows(self, &rows, key).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// Insert or update on `key` conflict; `excluded` columns keep their stored values.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for an empty row or the driver's execution error.
    async fn upsert(
        &mut self,
        record: Record,
        key: &str,
        excluded: &[&str],
        reset: bool,
    ) -> DbResult<UpdateResult> {
        let outcome = upsert_rows(self, "upsert", &[record], key, excluded).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// # Errors
    /// Same as [`TableBuilder::upsert`], per chunk.
    async fn upsert_bulk(
        &mut self,
        rows: Vec<Record>,
        key: &str,
        excluded: &[&str],
        reset: bool,
    ) -> DbResult<UpdateResult> {
        let outcome = upsert_rows(self, "upsert_bulk", &rows, key, excluded).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// # Errors
    /// Returns `DbError::InvalidInput` for an empty list or the driver's execution error.
    async fn replace(
        &mut self,
        replacements: &[Replacement],
        reset: bool,
    ) -> DbResult<UpdateResult> {
        let query = self.fragments().compile_replace(replacements);
        let outcome = write(self, "replace", query).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// # Errors
    /// Returns a deferred builder error or the driver's execution error.
    async fn delete(&mut self, reset: bool) -> DbResult<UpdateResult> {
        let query = self.fragments().compile_delete();
        let outcome = write(self, "delete", query).await;
        if reset {
            self.reset_query();
        }
        outcome
    }

    /// `TRUNCATE`, or `DELETE FROM` when the connection disallows truncation.
    ///
    /// # Errors
    /// Returns the driver's execution error.
    async fn truncate(&mut self, reset: bool) -> DbResult<bool> {
        let sql = self.fragments().compile_truncate();
        let outcome = run(self, "truncate", QueryAndParams::new_without_params(sql)).await;
        if reset {
            self.reset_query();
        }
        outcome.map(|_| true)
    }

    /// `DELETE FROM` the whole table; accumulated conditions are ignored.
    ///
    /// # Errors
    /// Returns the driver's execution error.
    async fn empty_table(&mut self, reset: bool) -> DbResult<bool> {
        let sql = self.fragments().compile_empty_table();
        let outcome = run(self, "empty_table", QueryAndParams::new_without_params(sql)).await;
        if reset {
            self.reset_query();
        }
        outcome.map(|_| true)
    }

    // ---- debug compilation ----

    /// The SELECT as it would run, with parameters substituted as literals.
    ///
    /// # Errors
    /// Returns a deferred builder error.
    fn get_compiled_select(&mut self, reset: bool) -> DbResult<String> {
        let fragments = self.fragments();
        let compiled = fragments
            .compile_select()
            .map(|q| interpolate(&q.query, &q.params, fragments.dialect()));
        if reset {
            self.reset_query();
        }
        compiled
    }

    /// # Errors
    /// Returns a deferred builder error or `DbError::InvalidInput` for an empty row.
    fn get_compiled_insert(&mut self, record: &Record, reset: bool) -> DbResult<String> {
        let fragments = self.fragments();
        let compiled = fragments
            .compile_insert(record, "")
            .map(|q| interpolate(&q.query, &q.params, fragments.dialect()));
        if reset {
            self.reset_query();
        }
        compiled
    }

    /// # Errors
    /// Returns a deferred builder error or `DbError::InvalidInput` when nothing is set.
    fn get_compiled_update(&mut self, record: &Record, reset: bool) -> DbResult<String> {
        let fragments = self.fragments();
        let compiled = fragments
            .compile_update(record)
            .map(|q| interpolate(&q.query, &q.params, fragments.dialect()));
        if reset {
            self.reset_query();
        }
        compiled
    }

    /// # Errors
    /// Returns a deferred builder error.
    fn get_compiled_delete(&mut self, reset: bool) -> DbResult<String> {
        let fragments = self.fragments();
        let compiled = fragments
            .compile_delete()
            .map(|q| interpolate(&q.query, &q.params, fragments.dialect()));
        if reset {
            self.reset_query();
        }
        compiled
    }
}

impl dyn Driver + '_ {
    /// Start a builder for `table` on this connection.
    pub fn table(&mut self, table: &str) -> Builder<'_> {
        Builder::new(self, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_update_rows_must_agree() {
        let rows = vec![
            Record::from([("id", 1), ("score", 10)]),
            Record::from([("score", 20), ("id", 2)]),
        ];
        assert_eq!(bulk_update_columns(&rows, "id").unwrap(), vec!["id", "score"]);

        let ragged = vec![
            Record::from([("id", 1), ("score", 10)]),
            Record::from([("id", 2)]),
        ];
        assert!(matches!(
            bulk_update_columns(&ragged, "id"),
            Err(DbError::InvalidInput(_))
        ));
        assert!(bulk_update_columns(&rows, "uuid").is_err());
    }

    #[test]
    fn counts_from_either_cell_type() {
        let rs = ResultSet::from_rows(&[COUNT_ALIAS], vec![vec![RowValues::Int(42)]]);
        assert_eq!(count_value(rs.first()).unwrap(), 42);
        let rs = ResultSet::from_rows(&[COUNT_ALIAS], vec![vec!["7".into()]]);
        assert_eq!(count_value(rs.first()).unwrap(), 7);
    }
}
