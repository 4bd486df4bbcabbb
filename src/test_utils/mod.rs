//! Test doubles and helpers, behind the `test-utils` feature.
//!
//! [`RecordingDriver`] implements [`Driver`] without a server: it records every statement
//! it is asked to run and answers with queued results, so builder and model behavior can
//! be asserted on the exact SQL and parameters they produce.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverState, QueryLog};
use crate::error::DbResult;
use crate::results::ResultSet;
use crate::types::RowValues;

/// One statement as the driver received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<RowValues>,
}

/// Shared view of the statements a [`RecordingDriver`] received.
///
/// Cloning shares the underlying list, so a test can keep a handle while a builder or
/// model holds the driver.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    inner: Arc<Mutex<Vec<RecordedStatement>>>,
}

impl Recording {
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedStatement>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn push(&self, statement: RecordedStatement) {
        self.lock().push(statement);
    }

    #[must_use]
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.lock().clone()
    }

    /// SQL text of every statement, in execution order.
    #[must_use]
    pub fn sql(&self) -> Vec<String> {
        self.lock().iter().map(|s| s.sql.clone()).collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<RecordedStatement> {
        self.lock().last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// A driver that records statements instead of running them.
///
/// Each statement consumes the next queued response. With the queue empty, statements
/// starting with `SELECT` or `SHOW` return an empty result and everything else reports
/// one affected row.
#[derive(Debug)]
pub struct RecordingDriver {
    dialect: Dialect,
    config: ConnectionConfig,
    state: DriverState,
    connected: bool,
    recording: Recording,
    responses: VecDeque<DbResult<ResultSet>>,
}

impl RecordingDriver {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        let driver_name = match dialect {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        };
        let config = ConnectionConfig::new(driver_name, "localhost", "test", "", "test")
            .with_debug(true);
        Self::with_config(dialect, config)
    }

    #[must_use]
    pub fn mysql() -> Self {
        Self::new(Dialect::MySql)
    }

    #[must_use]
    pub fn postgres() -> Self {
        Self::new(Dialect::Postgres)
    }

    #[must_use]
    pub fn with_config(dialect: Dialect, config: ConnectionConfig) -> Self {
        let state = DriverState::new(QueryLog::new(), config.debug);
        Self {
            dialect,
            config,
            state,
            connected: true,
            recording: Recording::default(),
            responses: VecDeque::new(),
        }
    }

    /// Handle on the recorded statements.
    #[must_use]
    pub fn recording(&self) -> Recording {
        self.recording.clone()
    }

    /// Queue the response for the next unanswered statement.
    pub fn respond(&mut self, response: DbResult<ResultSet>) -> &mut Self {
        self.responses.push_back(response);
        self
    }

    /// Queue a row-returning response.
    pub fn respond_rows(&mut self, columns: &[&str], rows: Vec<Vec<RowValues>>) -> &mut Self {
        self.respond(Ok(ResultSet::from_rows(columns, rows)))
    }

    fn answer(&mut self, sql: &str) -> DbResult<ResultSet> {
        if let Some(response) = self.responses.pop_front() {
            return response;
        }
        let head = sql.trim_start().to_ascii_uppercase();
        if head.starts_with("SELECT") || head.starts_with("SHOW") {
            Ok(ResultSet::default())
        } else {
            Ok(ResultSet::affected(1))
        }
    }

    fn run(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize> {
        let started = Instant::now();
        self.recording.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let outcome = self.answer(sql);
        self.state
            .finish(self.dialect, sql, params, started, outcome)
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn state(&self) -> &DriverState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DriverState {
        &mut self.state
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> bool {
        let was_connected = self.connected;
        self.connected = false;
        self.state.reset();
        was_connected
    }

    async fn raw_query(&mut self, sql: &str) -> DbResult<usize> {
        self.run(sql, &[])
    }

    async fn prepared_query(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize> {
        self.run(sql, params)
    }

    async fn control(&mut self, statement: &str) -> DbResult<()> {
        self.recording.push(RecordedStatement {
            sql: statement.to_string(),
            params: Vec::new(),
        });
        Ok(())
    }
}

/// Connection settings for live-database tests, read from `{PREFIX}_HOST`,
/// `{PREFIX}_USER`, `{PREFIX}_PASSWORD`, `{PREFIX}_DATABASE` and `{PREFIX}_PORT`.
///
/// `None` when `{PREFIX}_HOST` is unset, so live tests can skip.
#[must_use]
pub fn live_config(driver_name: &str, prefix: &str) -> Option<ConnectionConfig> {
    let var = |name: &str| std::env::var(format!("{prefix}_{name}")).ok();
    let host = var("HOST")?;
    let mut config = ConnectionConfig::new(
        driver_name,
        host,
        var("USER").unwrap_or_else(|| "root".to_string()),
        var("PASSWORD").unwrap_or_default(),
        var("DATABASE").unwrap_or_else(|| "querykit_test".to_string()),
    )
    .with_debug(true);
    if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
        config = config.with_port(port);
    }
    Some(config)
}
