//! Named connections, created lazily from configuration.
//!
//! ```rust,no_run
//! use querykit::config::{ConnectionConfig, DatabaseConfig};
//! use querykit::prelude::*;
//! use querykit::registry::ConnectionRegistry;
//!
//! # async fn demo() -> DbResult<()> {
//! let config = DatabaseConfig::single(ConnectionConfig::new(
//!     "postgres", "localhost", "app", "secret", "app",
//! ));
//! let mut registry = ConnectionRegistry::new(config);
//! let db = registry.connect(None).await?;
//! let total = db.table("users").where_("active", "=", true).count_all_results(true).await?;
//! # let _ = total;
//! registry.disconnect_all().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{ConnectionConfig, DatabaseConfig};
use crate::driver::{Driver, QueryLog};
use crate::error::{DbError, DbResult};

/// Future returned by a driver factory.
pub type DriverFuture = Pin<Box<dyn Future<Output = DbResult<Box<dyn Driver>>> + Send>>;

/// Opens a driver for one connection config.
pub type DriverFactory = Arc<dyn Fn(ConnectionConfig, QueryLog) -> DriverFuture + Send + Sync>;

/// A registry shared between tasks.
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry>>;

/// Maps connection names to live drivers.
///
/// Drivers are opened on first use through the factory registered for the connection's
/// `driverName` and cached until disconnected. All drivers share one query log.
pub struct ConnectionRegistry {
    config: DatabaseConfig,
    factories: HashMap<String, DriverFactory>,
    drivers: HashMap<String, Box<dyn Driver>>,
    log: QueryLog,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut factories: Vec<&String> = self.factories.keys().collect();
        factories.sort();
        let mut connected: Vec<&String> = self.drivers.keys().collect();
        connected.sort();
        f.debug_struct("ConnectionRegistry")
            .field("default_connection", &self.config.default_connection)
            .field("factories", &factories)
            .field("connected", &connected)
            .finish_non_exhaustive()
    }
}

impl ConnectionRegistry {
    /// A registry with factories for every compiled-in engine.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        let mut registry = Self {
            config,
            factories: HashMap::new(),
            drivers: HashMap::new(),
            log: QueryLog::new(),
        };
        registry.register_builtin();
        registry
    }

    #[cfg(feature = "mysql")]
    fn register_mysql(&mut self) {
        for name in ["mysql", "mysqli", "mariadb"] {
            self.register_factory(name, |config, log| async move {
                let driver = crate::mysql::MySqlDriver::connect(config, log).await?;
                Ok(Box::new(driver) as Box<dyn Driver>)
            });
        }
    }

    #[cfg(feature = "postgres")]
    fn register_postgres(&mut self) {
        for name in ["postgres", "postgre", "postgresql", "pgsql"] {
            self.register_factory(name, |config, log| async move {
                let driver = crate::postgres::PgDriver::connect(config, log).await?;
                Ok(Box::new(driver) as Box<dyn Driver>)
            });
        }
    }

    fn register_builtin(&mut self) {
        #[cfg(feature = "mysql")]
        self.register_mysql();
        #[cfg(feature = "postgres")]
        self.register_postgres();
    }

    /// Register (or replace) the factory used for `driver_name`.
    pub fn register_factory<F, Fut>(&mut self, driver_name: &str, factory: F)
    where
        F: Fn(ConnectionConfig, QueryLog) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DbResult<Box<dyn Driver>>> + Send + 'static,
    {
        let factory: DriverFactory =
            Arc::new(move |config: ConnectionConfig, log: QueryLog| -> DriverFuture {
                Box::pin(factory(config, log))
            });
        self.factories
            .insert(driver_name.trim().to_ascii_lowercase(), factory);
    }

    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn resolve(&self, name: Option<&str>) -> String {
        name.unwrap_or(&self.config.default_connection).to_string()
    }

    /// The driver for `name` (the default connection when `None`), opening it on first use.
    ///
    /// # Errors
    /// Returns `DbError::Config` for an unknown connection name or an incomplete config,
    /// `DbError::UnsupportedDriver` when no factory handles its driver name, or the
    /// factory's connection error.
    pub async fn connect(&mut self, name: Option<&str>) -> DbResult<&mut dyn Driver> {
        let name = self.resolve(name);
        let stale = self.drivers.get(&name).is_some_and(|d| !d.is_connected());
        if stale {
            self.drivers.remove(&name);
        }

        if !self.drivers.contains_key(&name) {
            let config = self.config.connection(Some(&name))?.clone();
            config.validate()?;
            let driver_name = config.driver_name.trim().to_ascii_lowercase();
            let factory = self
                .factories
                .get(&driver_name)
                .cloned()
                .ok_or_else(|| DbError::UnsupportedDriver(config.driver_name.clone()))?;
            tracing::debug!(connection = %name, driver = %driver_name, "opening connection");
            let driver = factory(config, self.log.clone()).await?;
            self.drivers.insert(name.clone(), driver);
        }

        self.drivers
            .get_mut(&name)
            .map(|d| &mut **d as &mut dyn Driver)
            .ok_or_else(|| DbError::Connection(format!("connection {name} is not available")))
    }

    /// Install an already established driver under `name`, returning any driver it
    /// replaces.
    pub fn insert(&mut self, name: &str, driver: Box<dyn Driver>) -> Option<Box<dyn Driver>> {
        self.drivers.insert(name.to_string(), driver)
    }

    #[must_use]
    pub fn is_connected(&self, name: &str) -> bool {
        self.drivers.get(name).is_some_and(|d| d.is_connected())
    }

    /// Close and forget the driver for `name`; false when none was open.
    pub async fn disconnect(&mut self, name: &str) -> bool {
        match self.drivers.remove(name) {
            Some(mut driver) => driver.disconnect().await,
            None => false,
        }
    }

    /// Close every driver; returns how many were open.
    pub async fn disconnect_all(&mut self) -> usize {
        let mut closed = 0;
        for (name, mut driver) in self.drivers.drain() {
            if driver.disconnect().await {
                closed += 1;
            } else {
                tracing::warn!(connection = %name, "connection was already closed");
            }
        }
        closed
    }

    /// The log every driver opened here writes to in debug mode.
    #[must_use]
    pub fn query_log(&self) -> QueryLog {
        self.log.clone()
    }

    /// Wrap the registry for sharing between tasks.
    #[must_use]
    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_connection_is_a_config_error() {
        let mut registry = ConnectionRegistry::new(DatabaseConfig::default());
        let err = registry.connect(Some("reports")).await.err();
        assert!(matches!(err, Some(DbError::Config(_))));
    }

    #[tokio::test]
    async fn unregistered_driver_is_rejected() {
        let config = DatabaseConfig::single(ConnectionConfig::new(
            "sqlite", "localhost", "u", "", "db",
        ));
        let mut registry = ConnectionRegistry::new(config);
        let err = registry.connect(None).await.err();
        assert!(matches!(err, Some(DbError::UnsupportedDriver(name)) if name == "sqlite"));
        assert!(!registry.is_connected("default"));
    }
}
