use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{SimpleQueryMessage, Statement};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::results::ResultSet;
use crate::types::RowValues;

type BoxError = Box<dyn Error + Sync + Send>;

/// Any other column: kept as text when it is valid UTF-8, otherwise as raw bytes.
struct RawCell(RowValues);

impl<'a> FromSql<'a> for RawCell {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(RawCell(match std::str::from_utf8(raw) {
            Ok(text) => RowValues::Text(text.to_string()),
            Err(_) => RowValues::Blob(raw.to_vec()),
        }))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn cell_error(e: &tokio_postgres::Error) -> DbError {
    DbError::Execution(format!("postgres column decode error: {e}"))
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `DbError::Execution` if the column cannot be decoded.
pub(super) fn postgres_extract_value(row: &tokio_postgres::Row, idx: usize) -> DbResult<RowValues> {
    let type_info = row.columns()[idx].type_();

    let value = match type_info.name() {
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map(|v| v.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v)))),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Int)),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v)))),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Float)),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)
            .map(|v| v.map_or(RowValues::Null, |d| RowValues::Text(d.to_string()))),
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Bool)),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Timestamp)),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| v.map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc()))),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Date)),
        "json" | "jsonb" => row
            .try_get::<_, Option<Value>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::JSON)),
        "uuid" => row
            .try_get::<_, Option<Uuid>>(idx)
            .map(|v| v.map_or(RowValues::Null, |u| RowValues::Text(u.to_string()))),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Blob)),
        "text" | "varchar" | "bpchar" | "name" | "citext" => row
            .try_get::<_, Option<String>>(idx)
            .map(|v| v.map_or(RowValues::Null, RowValues::Text)),
        _ => row
            .try_get::<_, Option<RawCell>>(idx)
            .map(|v| v.map_or(RowValues::Null, |c| c.0)),
    };
    value.map_err(|e| cell_error(&e))
}

/// Build a result set using statement metadata for column names.
///
/// # Errors
/// Returns errors from row value extraction.
pub(super) fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> DbResult<ResultSet> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Build a result set from the text-protocol messages of a simple query.
///
/// When several statements ran, rows of the last row-returning one win and the affected
/// count is taken from the last command.
pub(super) fn build_result_set_from_simple(messages: Vec<SimpleQueryMessage>) -> ResultSet {
    let mut result_set = ResultSet::default();
    let mut last_count = 0usize;
    let mut saw_rows = false;

    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if !saw_rows {
                    result_set = ResultSet::default();
                    let names: Vec<String> =
                        row.columns().iter().map(|c| c.name().to_string()).collect();
                    result_set.set_column_names(Arc::new(names));
                    saw_rows = true;
                }
                let values = (0..row.len())
                    .map(|i| row.get(i).map_or(RowValues::Null, |s| RowValues::Text(s.to_string())))
                    .collect();
                result_set.add_row_values(values);
            }
            SimpleQueryMessage::CommandComplete(count) => {
                last_count = usize::try_from(count).unwrap_or(usize::MAX);
            }
            _ => {}
        }
    }

    if !saw_rows {
        result_set.rows_affected = last_count;
    }
    result_set
}
