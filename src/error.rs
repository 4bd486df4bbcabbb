use thiserror::Error;

/// Message surfaced in place of native engine text when a connection is not in debug mode.
pub const GENERIC_DB_MESSAGE: &str = "A database error has occurred.";

pub type DbResult<T> = Result<T, DbError>;

/// The single error type raised by drivers, builders, models and the registry.
///
/// Every variant carries a human readable message and maps onto an HTTP-style status code
/// through [`DbError::status_code`]. Messages coming from the engines are only kept
/// verbatim when the connection runs in debug mode; see [`DbError::native`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported join type: {0}")]
    UnsupportedJoinType(String),

    #[error("No active query: run a query before reading its result")]
    NoActiveQuery,

    #[error("Schema introspection error: {0}")]
    SchemaIntrospection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Parameter conversion error: {0}")]
    Parameter(String),
}

impl DbError {
    /// HTTP-style status code for the error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            DbError::Connection(_) => 503,
            DbError::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// Wrap a native engine error, keeping its text only in debug mode.
    ///
    /// ```rust
    /// use querykit::DbError;
    ///
    /// let err = DbError::native(DbError::Execution, "syntax error at or near \"SELEC\"", false);
    /// assert_eq!(err, DbError::Execution(querykit::error::GENERIC_DB_MESSAGE.to_string()));
    /// ```
    pub fn native(
        kind: impl FnOnce(String) -> DbError,
        detail: impl std::fmt::Display,
        debug: bool,
    ) -> DbError {
        if debug {
            kind(detail.to_string())
        } else {
            kind(GENERIC_DB_MESSAGE.to_string())
        }
    }

    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, DbError::Connection(_))
    }

    #[must_use]
    pub fn is_transaction(&self) -> bool {
        matches!(self, DbError::Transaction(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_detail_depends_on_debug_mode() {
        let verbose = DbError::native(DbError::Connection, "Access denied for user 'x'", true);
        assert_eq!(
            verbose.to_string(),
            "Connection error: Access denied for user 'x'"
        );

        let quiet = DbError::native(DbError::Connection, "Access denied for user 'x'", false);
        assert_eq!(quiet.to_string(), format!("Connection error: {GENERIC_DB_MESSAGE}"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(DbError::Connection("down".into()).status_code(), 503);
        assert_eq!(DbError::InvalidInput("empty".into()).status_code(), 400);
        assert_eq!(DbError::NoActiveQuery.status_code(), 500);
        assert_eq!(DbError::UnsupportedJoinType("sideways".into()).status_code(), 500);
    }
}
