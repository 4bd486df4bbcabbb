use tokio_postgres::Client;

use crate::error::{DbError, DbResult};
use crate::results::ResultSet;
use crate::types::RowValues;

use super::describe;
use super::params::Params;
use super::query::{build_result_set_from_simple, build_result_set_from_statement};

/// Prepare and run one statement, collecting rows when it describes any columns.
///
/// # Errors
/// Returns `DbError::Execution` from preparation, binding or execution.
pub(super) async fn execute_prepared(
    client: &Client,
    query: &str,
    params: &[RowValues],
    debug: bool,
) -> DbResult<ResultSet> {
    let stmt = client
        .prepare(query)
        .await
        .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
    let converted = Params::convert(params);

    if stmt.columns().is_empty() {
        let rows = client
            .execute(&stmt, converted.as_refs())
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        let rows = usize::try_from(rows).map_err(|e| {
            DbError::Execution(format!("postgres affected rows conversion error: {e}"))
        })?;
        Ok(ResultSet::affected(rows))
    } else {
        let rows = client
            .query(&stmt, converted.as_refs())
            .await
            .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
        build_result_set_from_statement(&stmt, &rows)
    }
}

/// Run SQL text through the simple query protocol.
///
/// # Errors
/// Returns `DbError::Execution` on failure.
pub(super) async fn execute_simple(client: &Client, query: &str, debug: bool) -> DbResult<ResultSet> {
    let messages = client
        .simple_query(query)
        .await
        .map_err(|e| DbError::native(DbError::Execution, describe(&e), debug))?;
    Ok(build_result_set_from_simple(messages))
}

/// # Errors
/// Returns `DbError::Transaction` on failure.
pub(super) async fn execute_control(client: &Client, statement: &str, debug: bool) -> DbResult<()> {
    client
        .batch_execute(statement)
        .await
        .map_err(|e| DbError::native(DbError::Transaction, describe(&e), debug))
}
