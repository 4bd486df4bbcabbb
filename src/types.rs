use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::error::{DbError, DbResult};

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is used for both dialects so builders never branch on driver types:
/// ```rust
/// use querykit::prelude::*;
///
/// let params: Vec<RowValues> = vec![1.into(), "alice".into(), true.into(), None::<i64>.into()];
/// assert!(params[3].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Calendar date
    Date(NaiveDate),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Convert a JSON scalar into a value; objects and arrays stay JSON.
    #[must_use]
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => n.as_f64().map_or(RowValues::Null, RowValues::Float),
            },
            JsonValue::String(s) => RowValues::Text(s),
            other => RowValues::JSON(other),
        }
    }

    /// JSON rendering used when rows are handed to JSON-speaking collaborators.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(ts) => {
                JsonValue::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            RowValues::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }
}

macro_rules! row_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::$variant(value.into())
                }
            }
        )*
    };
}

row_value_from! {
    i64 => Int,
    i32 => Int,
    i16 => Int,
    u32 => Int,
    u16 => Int,
    u8 => Int,
    f64 => Float,
    f32 => Float,
    bool => Bool,
    String => Text,
    NaiveDateTime => Timestamp,
    NaiveDate => Date,
    Vec<u8> => Blob,
    JsonValue => JSON,
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<&String> for RowValues {
    fn from(value: &String) -> Self {
        RowValues::Text(value.clone())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// An insertion-ordered column → value map used for write payloads.
///
/// Column order is preserved so compiled statements list columns the way the caller
/// supplied them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, RowValues)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing the value in place when it already exists.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<RowValues>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        self
    }

    /// Consuming variant of [`Record::set`] for literal construction.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.set(column, value);
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&RowValues> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == column)
    }

    pub fn remove(&mut self, column: &str) -> Option<RowValues> {
        let idx = self.entries.iter().position(|(name, _)| name == column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|(name, _)| keep(name));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Build a record from a JSON object.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` when `value` is not an object.
    pub fn from_json(value: JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, RowValues::from_json(v)))
                .collect()),
            other => Err(DbError::InvalidInput(format!(
                "expected a JSON object for a row, got {other}"
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

impl<K: Into<String>, V: Into<RowValues>, const N: usize> From<[(K, V); N]> for Record {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Record {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A write payload: one row or a batch of rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Record),
    Batch(Vec<Record>),
}

impl Payload {
    /// Detect the payload shape of a JSON document: an object is one row, an array of
    /// objects is a batch.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` for scalars or arrays holding non-objects.
    pub fn from_json(value: JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Array(items) => items
                .into_iter()
                .map(Record::from_json)
                .collect::<DbResult<Vec<_>>>()
                .map(Payload::Batch),
            other => Record::from_json(other).map(Payload::Single),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Single(record) => record.is_empty(),
            Payload::Batch(rows) => rows.is_empty() || rows.iter().all(Record::is_empty),
        }
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self, Payload::Batch(_))
    }

    pub(crate) fn into_rows(self) -> Vec<Record> {
        match self {
            Payload::Single(record) => vec![record],
            Payload::Batch(rows) => rows,
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Payload::Single(record)
    }
}

impl From<Vec<Record>> for Payload {
    fn from(rows: Vec<Record>) -> Self {
        Payload::Batch(rows)
    }
}

/// A query and its parameters bundled together.
///
/// This is what builders compile to: SQL text in the target dialect plus the bound values
/// in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAndParams {
    /// The SQL query string
    pub query: String,
    /// The parameters to be bound to the query
    pub params: Vec<RowValues>,
}

impl QueryAndParams {
    pub fn new(query: impl Into<String>, params: Vec<RowValues>) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }
}
