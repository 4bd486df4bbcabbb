//! Connection configuration.
//!
//! Configs deserialize from JSON (or any serde format) using the camelCase keys hosts
//! already use, with snake_case accepted as aliases:
//! ```rust
//! use querykit::config::DatabaseConfig;
//!
//! let cfg = DatabaseConfig::from_json_str(r#"{
//!     "defaultConnection": "default",
//!     "connections": {
//!         "default": {
//!             "hostname": "127.0.0.1",
//!             "username": "app",
//!             "password": "secret",
//!             "database": "app",
//!             "driverName": "postgres",
//!             "tablePrefix": "app_"
//!         }
//!     }
//! }"#).unwrap();
//! assert_eq!(cfg.connection(None).unwrap().port(), 5432);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};

pub const DEFAULT_CONNECTION: &str = "default";

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION.to_string()
}

/// Settings for one named connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(alias = "driver_name", alias = "driver")]
    pub driver_name: String,
    #[serde(default, alias = "table_prefix", alias = "prefix")]
    pub table_prefix: String,
    /// Development mode: keep native engine messages and record the query log.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub charset: Option<String>,
    #[serde(default)]
    pub collation: Option<String>,
    /// When false, `truncate()` falls back to `DELETE FROM`.
    #[serde(default = "default_true", alias = "allow_truncate")]
    pub allow_truncate: bool,
    #[serde(default = "default_connect_timeout", alias = "connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(
        driver_name: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port: None,
            username: username.into(),
            password: password.into(),
            database: database.into(),
            driver_name: driver_name.into(),
            table_prefix: String::new(),
            debug: false,
            charset: None,
            collation: None,
            allow_truncate: true,
            connect_timeout_secs: default_connect_timeout(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    #[must_use]
    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    #[must_use]
    pub fn with_allow_truncate(mut self, allow: bool) -> Self {
        self.allow_truncate = allow;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Dialect selected by `driver_name`.
    ///
    /// # Errors
    /// Returns `DbError::UnsupportedDriver` for names no dialect claims.
    pub fn dialect(&self) -> DbResult<Dialect> {
        Dialect::from_driver_name(&self.driver_name)
    }

    /// Configured port, or the dialect's default when unset or the driver is unknown.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| self.dialect().map_or(0, Dialect::default_port))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Check the fields every driver needs before a connection attempt.
    ///
    /// # Errors
    /// Returns `DbError::Config` naming the first missing field.
    pub fn validate(&self) -> DbResult<()> {
        let required = [
            ("hostname", &self.hostname),
            ("username", &self.username),
            ("database", &self.database),
            ("driverName", &self.driver_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DbError::Config(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Every named connection plus the name used when callers do not pick one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(
        default = "default_connection_name",
        alias = "default_connection",
        alias = "defaultGroup"
    )]
    pub default_connection: String,
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_connection: default_connection_name(),
            connections: HashMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Config holding a single connection registered under the default name.
    #[must_use]
    pub fn single(connection: ConnectionConfig) -> Self {
        let mut cfg = Self::default();
        cfg.connections
            .insert(DEFAULT_CONNECTION.to_string(), connection);
        cfg
    }

    #[must_use]
    pub fn with_connection(mut self, name: impl Into<String>, connection: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), connection);
        self
    }

    /// Parse a config document.
    ///
    /// # Errors
    /// Returns `DbError::Config` when the JSON does not match the expected shape.
    pub fn from_json_str(raw: &str) -> DbResult<Self> {
        serde_json::from_str(raw).map_err(|e| DbError::Config(format!("invalid database config: {e}")))
    }

    /// Resolve `name`, or the default connection when `None`.
    ///
    /// # Errors
    /// Returns `DbError::Config` when no connection has that name.
    pub fn connection(&self, name: Option<&str>) -> DbResult<&ConnectionConfig> {
        let name = name.unwrap_or(&self.default_connection);
        self.connections
            .get(name)
            .ok_or_else(|| DbError::Config(format!("no connection named \"{name}\" is configured")))
    }
}
