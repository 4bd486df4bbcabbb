use tokio_postgres::{Client, NoTls};

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};

use super::describe;

/// Translate a connection config into `tokio_postgres` settings.
pub(super) fn pg_config(cfg: &ConnectionConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&cfg.hostname)
        .port(cfg.port())
        .user(&cfg.username)
        .password(&cfg.password)
        .dbname(&cfg.database)
        .connect_timeout(cfg.connect_timeout())
        .application_name("querykit");
    pg
}

/// Open a connection and spawn its background task on the current runtime.
///
/// # Errors
/// Returns `DbError::Config` for incomplete settings and `DbError::Connection` when the
/// server cannot be reached within the configured timeout.
pub(super) async fn connect(cfg: &ConnectionConfig) -> DbResult<Client> {
    cfg.validate()?;
    let pg = pg_config(cfg);

    let attempt = tokio::time::timeout(cfg.connect_timeout(), pg.connect(NoTls))
        .await
        .map_err(|_| {
            DbError::Connection(format!(
                "timed out after {}s connecting to {}:{}",
                cfg.connect_timeout_secs,
                cfg.hostname,
                cfg.port()
            ))
        })?;
    let (client, connection) =
        attempt.map_err(|e| DbError::native(DbError::Connection, describe(&e), cfg.debug))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection task ended with an error");
        }
    });

    if let Some(charset) = cfg.charset.as_deref() {
        let sql = format!(
            "SET client_encoding TO {}",
            Dialect::Postgres.literal(&charset.into())
        );
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| DbError::native(DbError::Connection, describe(&e), cfg.debug))?;
    }

    tracing::debug!(host = %cfg.hostname, database = %cfg.database, "postgres connection established");
    Ok(client)
}
