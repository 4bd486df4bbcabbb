//! MySQL / MariaDB driver built on `sqlx`.
//!
//! - config: connect options and the connect handshake
//! - params: binding `RowValues` onto `sqlx` queries
//! - query: row decoding and result building

mod config;
mod params;
mod query;

use std::time::Instant;

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, Executor};

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverState, QueryLog};
use crate::error::{DbError, DbResult};
use crate::query_builder::Builder;
use crate::results::ResultSet;
use crate::types::RowValues;

use params::{bind_all, statement_returns_rows};
use query::build_result_set;

/// Native error text, preferring the server's error code and message when present.
pub(crate) fn describe(e: &sqlx::Error) -> String {
    match e {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => format!("{} ({code})", db.message()),
            None => db.message().to_string(),
        },
        other => other.to_string(),
    }
}

fn not_connected() -> DbError {
    DbError::Connection("mysql connection is closed".to_string())
}

fn written(rows_affected: u64, last_insert_id: u64) -> DbResult<ResultSet> {
    let mut result = ResultSet::affected(usize::try_from(rows_affected).map_err(|e| {
        DbError::Execution(format!("mysql affected rows conversion error: {e}"))
    })?);
    if last_insert_id > 0 {
        result.insert_id = i64::try_from(last_insert_id).ok();
    }
    Ok(result)
}

async fn execute_prepared(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[RowValues],
    debug: bool,
) -> DbResult<ResultSet> {
    let query = bind_all(sqlx::query(sql), params);
    if statement_returns_rows(sql) {
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        build_result_set(&rows)
    } else {
        let done = query
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        written(done.rows_affected(), done.last_insert_id())
    }
}

async fn execute_raw(conn: &mut MySqlConnection, sql: &str, debug: bool) -> DbResult<ResultSet> {
    if statement_returns_rows(sql) {
        let rows = (&mut *conn)
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        build_result_set(&rows)
    } else {
        let done = (&mut *conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        written(done.rows_affected(), done.last_insert_id())
    }
}

/// A single MySQL or MariaDB connection.
pub struct MySqlDriver {
    conn: Option<MySqlConnection>,
    config: ConnectionConfig,
    state: DriverState,
}

impl std::fmt::Debug for MySqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlDriver")
            .field("hostname", &self.config.hostname)
            .field("database", &self.config.database)
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl MySqlDriver {
    /// Connect using `config`; statements are logged into `log` in debug mode.
    ///
    /// # Errors
    /// Returns `DbError::Config` or `DbError::Connection` when the connection cannot be
    /// established.
    pub async fn connect(config: ConnectionConfig, log: QueryLog) -> DbResult<Self> {
        let conn = config::connect(&config).await?;
        let state = DriverState::new(log, config.debug);
        Ok(Self {
            conn: Some(conn),
            config,
            state,
        })
    }

    /// Start a builder for `table`.
    pub fn table(&mut self, table: &str) -> Builder<'_> {
        Builder::new(self, table)
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
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
        self.conn.is_some()
    }

    async fn disconnect(&mut self) -> bool {
        self.state.reset();
        match self.conn.take() {
            Some(conn) => {
                if let Err(e) = conn.close().await {
                    tracing::warn!(error = %e, "mysql connection did not close cleanly");
                }
                true
            }
            None => false,
        }
    }

    async fn raw_query(&mut self, sql: &str) -> DbResult<usize> {
        let started = Instant::now();
        let debug = self.config.debug;
        let outcome = match self.conn.as_mut() {
            Some(conn) => execute_raw(conn, sql, debug).await,
            None => Err(not_connected()),
        };
        self.state.finish(Dialect::MySql, sql, &[], started, outcome)
    }

    async fn prepared_query(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize> {
        let started = Instant::now();
        let debug = self.config.debug;
        let outcome = match self.conn.as_mut() {
            Some(conn) => execute_prepared(conn, sql, params, debug).await,
            None => Err(not_connected()),
        };
        self.state
            .finish(Dialect::MySql, sql, params, started, outcome)
    }

    async fn control(&mut self, statement: &str) -> DbResult<()> {
        let debug = self.config.debug;
        let conn = self.conn.as_mut().ok_or_else(not_connected)?;
        conn.execute(sqlx::raw_sql(statement))
            .await
            .map(|_| ())
            .map_err(|e| DbError::native(DbError::Transaction, describe(&e), debug))
    }
}
