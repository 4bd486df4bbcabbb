//! Table-scoped query builders, drivers and a thin model layer for MySQL and PostgreSQL.
//!
//! * [`driver::Driver`] is the connection contract; [`mysql::MySqlDriver`] (sqlx) and
//!   [`postgres::PgDriver`] (tokio-postgres) implement it.
//! * `driver.table(name)` returns a [`query_builder::Builder`] that accumulates fragments
//!   and compiles them with the right placeholders, quoting and literal escaping.
//! * [`model::Model`] adds soft deletes, timestamps, an allow-list and callbacks.
//! * [`registry::ConnectionRegistry`] opens named connections from a
//!   [`config::DatabaseConfig`].
//!
//! ```rust,no_run
//! use querykit::config::ConnectionConfig;
//! use querykit::postgres::PgDriver;
//! use querykit::prelude::*;
//!
//! # async fn demo() -> DbResult<()> {
//! let config = ConnectionConfig::new("postgres", "localhost", "app", "secret", "app");
//! let mut db = PgDriver::connect(config, QueryLog::new()).await?;
//! let recent = db
//!     .table("posts")
//!     .where_("published", "=", true)
//!     .order_by("created_at", "DESC")
//!     .limit(10)
//!     .get_result_array(true)
//!     .await?;
//! # let _ = recent;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod model;
pub mod placeholders;
pub mod prelude;
pub mod query_builder;
pub mod registry;
pub mod results;
pub mod types;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{DbError, DbResult};
