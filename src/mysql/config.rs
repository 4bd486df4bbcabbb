use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};

use crate::config::ConnectionConfig;
use crate::error::{DbError, DbResult};

use super::describe;

/// Translate a connection config into `sqlx` connect options.
pub(super) fn connect_options(cfg: &ConnectionConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&cfg.hostname)
        .port(cfg.port())
        .username(&cfg.username)
        .password(&cfg.password)
        .database(&cfg.database);
    if let Some(charset) = cfg.charset.as_deref() {
        options = options.charset(charset);
    }
    if let Some(collation) = cfg.collation.as_deref() {
        options = options.collation(collation);
    }
    // statements are traced by the driver itself
    options.disable_statement_logging()
}

/// # Errors
/// Returns `DbError::Config` for incomplete settings and `DbError::Connection` when the
/// server cannot be reached within the configured timeout.
pub(super) async fn connect(cfg: &ConnectionConfig) -> DbResult<MySqlConnection> {
    cfg.validate()?;
    let options = connect_options(cfg);

    let conn = tokio::time::timeout(cfg.connect_timeout(), MySqlConnection::connect_with(&options))
        .await
        .map_err(|_| {
            DbError::Connection(format!(
                "timed out after {}s connecting to {}:{}",
                cfg.connect_timeout_secs,
                cfg.hostname,
                cfg.port()
            ))
        })?
        .map_err(|e| DbError::native(DbError::Connection, describe(&e), cfg.debug))?;

    tracing::debug!(host = %cfg.hostname, database = %cfg.database, "mysql connection established");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_connection_config() {
        let cfg = ConnectionConfig::new("mariadb", "db.internal", "app", "pw", "sales")
            .with_charset("utf8mb4");
        let options = connect_options(&cfg);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("sales"));
        assert_eq!(options.get_charset(), "utf8mb4");
    }
}
