use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{DbError, DbResult};
use crate::results::ResultSet;
use crate::types::RowValues;

fn cell_error(column: &str, e: &sqlx::Error) -> DbError {
    DbError::Execution(format!("mysql column decode error on {column}: {e}"))
}

/// Extracts a `RowValues` from a MySQL row at the given index.
///
/// # Errors
/// Returns `DbError::Execution` if the column cannot be decoded.
pub(super) fn mysql_extract_value(row: &MySqlRow, idx: usize) -> DbResult<RowValues> {
    let column = &row.columns()[idx];
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| cell_error(column.name(), &e))?;
    if raw.is_null() {
        return Ok(RowValues::Null);
    }

    let type_name = column.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(RowValues::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(idx).map(RowValues::Int)
        }
        name if name.ends_with("UNSIGNED") => row
            .try_get_unchecked::<u64, _>(idx)
            .map(|v| i64::try_from(v).map_or_else(|_| RowValues::Text(v.to_string()), RowValues::Int)),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(|v| RowValues::Float(f64::from(v))),
        "DOUBLE" => row.try_get::<f64, _>(idx).map(RowValues::Float),
        "DATETIME" | "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(idx).map(RowValues::Timestamp),
        "DATE" => row.try_get::<NaiveDate, _>(idx).map(RowValues::Date),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|t| RowValues::Text(t.format("%H:%M:%S%.f").to_string())),
        "JSON" => row.try_get::<Value, _>(idx).map(RowValues::JSON),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => {
            row.try_get::<Vec<u8>, _>(idx).map(RowValues::Blob)
        }
        // DECIMAL, ENUM, SET and the text family arrive as text on the wire
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(RowValues::Text)
            .or_else(|_| row.try_get_unchecked::<Vec<u8>, _>(idx).map(RowValues::Blob)),
    };
    value.map_err(|e| cell_error(column.name(), &e))
}

/// # Errors
/// Returns errors from row value extraction.
pub(super) fn build_result_set(rows: &[MySqlRow]) -> DbResult<ResultSet> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    let Some(first) = rows.first() else {
        return Ok(result_set);
    };
    let names: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let column_count = names.len();
    result_set.set_column_names(Arc::new(names));

    for row in rows {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(mysql_extract_value(row, idx)?);
        }
        result_set.add_row_values(values);
    }
    Ok(result_set)
}
