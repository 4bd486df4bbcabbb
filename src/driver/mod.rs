//! The driver contract shared by every engine.
//!
//! A driver owns one live connection handle and the bookkeeping around it: the stashed
//! result of the last statement, transaction state, the last insert id and the query log.
//! Engines implement only the execution primitives; the rest is provided here on top of
//! [`DriverState`].

use std::time::Instant;

use async_trait::async_trait;

mod log;

pub use log::{QueryLog, QueryLogEntry};

use crate::config::ConnectionConfig;
use crate::dialect::{Dialect, EscapeKind};
use crate::error::{DbError, DbResult};
use crate::placeholders::interpolate;
use crate::results::{DbRow, ResultSet};
use crate::types::RowValues;

/// Where the connection stands with respect to an explicit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
    /// A statement failed inside the transaction
    Failed,
}

/// Bookkeeping every driver carries next to its connection handle.
#[derive(Debug)]
pub struct DriverState {
    last_result: Option<ResultSet>,
    transaction: TransactionState,
    log: QueryLog,
    insert_id: Option<i64>,
    affected_rows: usize,
    call_site: Option<String>,
    debug: bool,
}

impl DriverState {
    #[must_use]
    pub fn new(log: QueryLog, debug: bool) -> Self {
        Self {
            last_result: None,
            transaction: TransactionState::Idle,
            log,
            insert_id: None,
            affected_rows: 0,
            call_site: None,
            debug,
        }
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Record the outcome of one statement: trace it, log it in debug mode, stash the
    /// result and track transaction failure.
    ///
    /// # Errors
    /// Returns the statement's own error unchanged.
    pub fn finish(
        &mut self,
        dialect: Dialect,
        sql: &str,
        params: &[RowValues],
        started: Instant,
        outcome: DbResult<ResultSet>,
    ) -> DbResult<usize> {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let call_site = self.call_site.take();
        tracing::debug!(
            sql = %sql,
            params = params.len(),
            elapsed_ms,
            call_site = call_site.as_deref().unwrap_or(""),
            ok = outcome.is_ok(),
            "statement executed"
        );
        if self.debug {
            self.log.push(QueryLogEntry {
                sql: interpolate(sql, params, dialect),
                elapsed_ms,
                call_site,
            });
        }

        match outcome {
            Ok(result) => {
                let rows = result.rows_affected;
                self.affected_rows = rows;
                if result.insert_id.is_some() {
                    self.insert_id = result.insert_id;
                }
                self.last_result = Some(result);
                Ok(rows)
            }
            Err(err) => {
                self.last_result = None;
                self.affected_rows = 0;
                if self.transaction == TransactionState::Active {
                    self.transaction = TransactionState::Failed;
                }
                Err(err)
            }
        }
    }

    /// Forget the connection-bound state after a disconnect.
    pub fn reset(&mut self) {
        self.last_result = None;
        self.transaction = TransactionState::Idle;
        self.call_site = None;
    }
}

/// A connection to one database engine.
///
/// ```rust,no_run
/// use querykit::prelude::*;
///
/// # async fn demo(driver: &mut dyn Driver) -> DbResult<()> {
/// driver.prepared_query("SELECT id FROM users WHERE active = ?", &[true.into()]).await?;
/// for row in driver.get_result_array()?.results {
///     println!("{:?}", row.get("id"));
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Driver: Send {
    fn dialect(&self) -> Dialect;

    fn config(&self) -> &ConnectionConfig;

    fn state(&self) -> &DriverState;

    fn state_mut(&mut self) -> &mut DriverState;

    fn is_connected(&self) -> bool;

    /// Close the handle; `false` when it was already closed.
    async fn disconnect(&mut self) -> bool;

    /// Execute SQL text exactly as given, without parameters.
    ///
    /// # Errors
    /// Returns `DbError::Execution` on engine failure.
    async fn raw_query(&mut self, sql: &str) -> DbResult<usize>;

    /// Execute a statement with bound parameters in the dialect's placeholder style.
    ///
    /// Returns the number of affected (or returned) rows; the full result is stashed for
    /// [`Driver::get_result_array`].
    ///
    /// # Errors
    /// Returns `DbError::Execution` on engine failure or `DbError::Parameter` when a value
    /// cannot be bound.
    async fn prepared_query(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize>;

    /// Run a transaction-control statement (`BEGIN`, `COMMIT`, `ROLLBACK`).
    ///
    /// # Errors
    /// Returns `DbError::Transaction` on failure.
    async fn control(&mut self, statement: &str) -> DbResult<()>;

    fn escape(&self, value: &RowValues, kind: EscapeKind) -> String {
        self.dialect().escape(value, kind)
    }

    /// Label the next statement for the query log.
    fn annotate(&mut self, call_site: &str) {
        self.state_mut().call_site = Some(call_site.to_string());
    }

    /// # Errors
    /// Returns `DbError::Transaction` when a transaction is already open or `BEGIN` fails.
    async fn trans_begin(&mut self) -> DbResult<()> {
        if self.state().transaction != TransactionState::Idle {
            return Err(DbError::Transaction(
                "a transaction is already active".to_string(),
            ));
        }
        self.control("BEGIN").await?;
        self.state_mut().transaction = TransactionState::Active;
        Ok(())
    }

    /// Commit the open transaction.
    ///
    /// On PostgreSQL a transaction that saw a failed statement cannot commit; it is rolled
    /// back and reported as an error.
    ///
    /// # Errors
    /// Returns `DbError::Transaction` when no transaction is open, the transaction failed,
    /// or `COMMIT` fails.
    async fn trans_commit(&mut self) -> DbResult<()> {
        match self.state().transaction {
            TransactionState::Idle => {
                Err(DbError::Transaction("no active transaction".to_string()))
            }
            TransactionState::Failed if self.dialect() == Dialect::Postgres => {
                if let Err(err) = self.control("ROLLBACK").await {
                    tracing::warn!(error = %err, "rollback of failed transaction did not complete");
                }
                self.state_mut().transaction = TransactionState::Idle;
                Err(DbError::Transaction(
                    "transaction had a failed statement and was rolled back".to_string(),
                ))
            }
            _ => {
                let outcome = self.control("COMMIT").await;
                self.state_mut().transaction = TransactionState::Idle;
                outcome
            }
        }
    }

    /// # Errors
    /// Returns `DbError::Transaction` when no transaction is open or `ROLLBACK` fails.
    async fn trans_rollback(&mut self) -> DbResult<()> {
        if self.state().transaction == TransactionState::Idle {
            return Err(DbError::Transaction("no active transaction".to_string()));
        }
        let outcome = self.control("ROLLBACK").await;
        self.state_mut().transaction = TransactionState::Idle;
        outcome
    }

    fn trans_status(&self) -> TransactionState {
        self.state().transaction
    }

    /// Take the stashed result of the last statement.
    ///
    /// # Errors
    /// Returns `DbError::NoActiveQuery` when nothing is stashed.
    fn get_result_array(&mut self) -> DbResult<ResultSet> {
        self.state_mut()
            .last_result
            .take()
            .ok_or(DbError::NoActiveQuery)
    }

    /// Take the first row of the stashed result.
    ///
    /// # Errors
    /// Returns `DbError::NoActiveQuery` when nothing is stashed.
    fn get_row_array(&mut self) -> DbResult<Option<DbRow>> {
        Ok(self.get_result_array()?.results.into_iter().next())
    }

    fn affected_rows(&self) -> usize {
        self.state().affected_rows
    }

    fn insert_id(&self) -> Option<i64> {
        self.state().insert_id
    }

    fn query_log(&self) -> QueryLog {
        self.state().log.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_statement_marks_active_transaction() {
        let mut state = DriverState::new(QueryLog::new(), true);
        state.transaction = TransactionState::Active;
        let err = state.finish(
            Dialect::MySql,
            "INSERT INTO `t` (`a`) VALUES (?)",
            &[RowValues::Int(1)],
            Instant::now(),
            Err(DbError::Execution("duplicate".into())),
        );
        assert!(err.is_err());
        assert_eq!(state.transaction, TransactionState::Failed);
        assert_eq!(state.log.entries()[0].sql, "INSERT INTO `t` (`a`) VALUES (1)");
    }

    #[test]
    fn log_is_only_written_in_debug_mode() {
        let log = QueryLog::new();
        let mut state = DriverState::new(log.clone(), false);
        state.call_site = Some("users::get".into());
        let rows = state
            .finish(
                Dialect::Postgres,
                "SELECT 1",
                &[],
                Instant::now(),
                Ok(ResultSet::affected(0)),
            )
            .unwrap();
        assert_eq!(rows, 0);
        assert!(log.is_empty());
        assert!(state.call_site.is_none());
    }
}
