//! PostgreSQL driver built on `tokio-postgres`.
//!
//! - config: connection settings and the connect handshake
//! - params: `ToSql` for `RowValues`
//! - query: row decoding and result building
//! - executor: statement execution on a live client

mod config;
mod executor;
mod params;
mod query;

use std::time::Instant;

use async_trait::async_trait;
use tokio_postgres::Client;

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::driver::{Driver, DriverState, QueryLog};
use crate::error::{DbError, DbResult};
use crate::query_builder::Builder;
use crate::types::RowValues;

/// Native error text, preferring the server's SQLSTATE and message when present.
pub(crate) fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => e.to_string(),
    }
}

fn not_connected() -> DbError {
    DbError::Connection("postgres connection is closed".to_string())
}

/// A single PostgreSQL connection.
pub struct PgDriver {
    client: Option<Client>,
    config: ConnectionConfig,
    state: DriverState,
}

impl std::fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDriver")
            .field("hostname", &self.config.hostname)
            .field("database", &self.config.database)
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl PgDriver {
    /// Connect using `config`; statements are logged into `log` in debug mode.
    ///
    /// # Errors
    /// Returns `DbError::Config` or `DbError::Connection` when the connection cannot be
    /// established.
    pub async fn connect(config: ConnectionConfig, log: QueryLog) -> DbResult<Self> {
        let client = config::connect(&config).await?;
        let state = DriverState::new(log, config.debug);
        Ok(Self {
            client: Some(client),
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
impl Driver for PgDriver {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    async fn disconnect(&mut self) -> bool {
        self.state.reset();
        // dropping the client ends the spawned connection task
        self.client.take().is_some()
    }

    async fn raw_query(&mut self, sql: &str) -> DbResult<usize> {
        let started = Instant::now();
        let outcome = match self.client.as_ref() {
            Some(client) => executor::execute_simple(client, sql, self.config.debug).await,
            None => Err(not_connected()),
        };
        self.state
            .finish(Dialect::Postgres, sql, &[], started, outcome)
    }

    async fn prepared_query(&mut self, sql: &str, params: &[RowValues]) -> DbResult<usize> {
        let started = Instant::now();
        let outcome = match self.client.as_ref() {
            Some(client) => {
                executor::execute_prepared(client, sql, params, self.config.debug).await
            }
            None => Err(not_connected()),
        };
        self.state
            .finish(Dialect::Postgres, sql, params, started, outcome)
    }

    async fn control(&mut self, statement: &str) -> DbResult<()> {
        let client = self.client.as_ref().ok_or_else(not_connected)?;
        executor::execute_control(client, statement, self.config.debug).await
    }
}
