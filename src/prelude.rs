//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits
//! so that `use querykit::prelude::*;` covers typical builder and driver code.

pub use crate::config::{ConnectionConfig, DatabaseConfig};
pub use crate::dialect::{Dialect, EscapeKind, JoinType};
pub use crate::driver::{Driver, QueryLog, QueryLogEntry, TransactionState};
pub use crate::error::{DbError, DbResult};
pub use crate::model::{BuilderCall, DateFormat, EventData, Model, ModelConfig, ModelEvent, WriteResult};
pub use crate::query_builder::{
    Builder, InsertResult, LikeSide, Replacement, TableBuilder, UpdateResult,
};
pub use crate::registry::{ConnectionRegistry, SharedRegistry};
pub use crate::results::{DbRow, ResultSet};
pub use crate::types::{Payload, QueryAndParams, Record, RowValues};

#[cfg(feature = "mysql")]
pub use crate::mysql::MySqlDriver;
#[cfg(feature = "postgres")]
pub use crate::postgres::PgDriver;
