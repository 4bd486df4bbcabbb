use chrono::{DateTime, Local, Timelike};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::types::RowValues;

/// How automatic timestamp fields are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    Date,
    /// Unix seconds
    Time,
    /// `YYYY-MM-DD HH:MM:SS`
    #[default]
    Datetime,
}

impl DateFormat {
    /// The value to store for `at` in this format.
    #[must_use]
    pub fn stamp(self, at: DateTime<Local>) -> RowValues {
        let wall = at.naive_local();
        match self {
            DateFormat::Date => RowValues::Date(wall.date()),
            DateFormat::Time => RowValues::Int(at.timestamp()),
            DateFormat::Datetime => RowValues::Timestamp(wall.with_nanosecond(0).unwrap_or(wall)),
        }
    }

    /// The current time in this format. Dates are local wall-clock values; `Time` is
    /// seconds since the epoch.
    #[must_use]
    pub fn now(self) -> RowValues {
        self.stamp(Local::now())
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_created_field() -> String {
    "created_at".to_string()
}

fn default_updated_field() -> String {
    "updated_at".to_string()
}

fn default_deleted_field() -> String {
    "deleted_at".to_string()
}

fn default_true() -> bool {
    true
}

/// Declaration of one model: the table it binds and the behaviors layered on it.
///
/// Deserializes from camelCase JSON; missing keys take the defaults of
/// [`ModelConfig::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub table: String,
    #[serde(default = "default_primary_key", alias = "primary_key")]
    pub primary_key: String,
    #[serde(default, alias = "allowed_fields")]
    pub allowed_fields: Vec<String>,
    /// When false every column passes the allow-list
    #[serde(default = "default_true", alias = "protect_fields")]
    pub protect_fields: bool,
    #[serde(default, alias = "use_timestamps")]
    pub use_timestamps: bool,
    #[serde(default, alias = "date_format")]
    pub date_format: DateFormat,
    #[serde(default = "default_created_field", alias = "created_field")]
    pub created_field: String,
    #[serde(default = "default_updated_field", alias = "updated_field")]
    pub updated_field: String,
    #[serde(default, alias = "use_soft_deletes", alias = "useSoftDelete")]
    pub use_soft_deletes: bool,
    #[serde(default = "default_deleted_field", alias = "deleted_field")]
    pub deleted_field: String,
    #[serde(default = "default_true", alias = "use_callbacks")]
    pub use_callbacks: bool,
}

impl ModelConfig {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: default_primary_key(),
            allowed_fields: Vec::new(),
            protect_fields: true,
            use_timestamps: false,
            date_format: DateFormat::default(),
            created_field: default_created_field(),
            updated_field: default_updated_field(),
            use_soft_deletes: false,
            deleted_field: default_deleted_field(),
            use_callbacks: true,
        }
    }

    #[must_use]
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    #[must_use]
    pub fn with_allowed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_protect_fields(mut self, protect: bool) -> Self {
        self.protect_fields = protect;
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.use_timestamps = enabled;
        self
    }

    #[must_use]
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_fields(
        mut self,
        created: impl Into<String>,
        updated: impl Into<String>,
    ) -> Self {
        self.created_field = created.into();
        self.updated_field = updated.into();
        self
    }

    #[must_use]
    pub fn with_soft_deletes(mut self, enabled: bool) -> Self {
        self.use_soft_deletes = enabled;
        self
    }

    #[must_use]
    pub fn with_deleted_field(mut self, column: impl Into<String>) -> Self {
        self.deleted_field = column.into();
        self
    }

    #[must_use]
    pub fn with_callbacks(mut self, enabled: bool) -> Self {
        self.use_callbacks = enabled;
        self
    }

    /// Parse a model declaration.
    ///
    /// # Errors
    /// Returns `DbError::Config` when the JSON does not match the expected shape.
    pub fn from_json_str(raw: &str) -> DbResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DbError::Config(format!("invalid model config: {e}")))
    }

    /// # Errors
    /// Returns `DbError::Config` when the table or primary key is blank.
    pub fn validate(&self) -> DbResult<()> {
        if self.table.trim().is_empty() {
            return Err(DbError::Config("model table is required".to_string()));
        }
        if self.primary_key.trim().is_empty() {
            return Err(DbError::Config(format!(
                "model for {} needs a primary key",
                self.table
            )));
        }
        Ok(())
    }

    pub(crate) fn allows(&self, column: &str) -> bool {
        !self.protect_fields || self.allowed_fields.iter().any(|f| f == column)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn json_declaration_fills_defaults() {
        let cfg = ModelConfig::from_json_str(
            r#"{"table":"users","allowedFields":["name","age"],"useSoftDeletes":true,"dateFormat":"time"}"#,
        )
        .unwrap();
        assert_eq!(cfg.primary_key, "id");
        assert_eq!(cfg.deleted_field, "deleted_at");
        assert!(cfg.use_soft_deletes);
        assert!(cfg.protect_fields);
        assert_eq!(cfg.date_format, DateFormat::Time);
        assert!(cfg.allows("age"));
        assert!(!cfg.allows("extra"));
    }

    #[test]
    fn stamps_follow_the_format() {
        let utc = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 500)
            .unwrap();
        let at = Utc.from_utc_datetime(&utc).with_timezone(&Local);
        let wall = at.naive_local();
        assert_eq!(DateFormat::Date.stamp(at), RowValues::Date(wall.date()));
        assert_eq!(DateFormat::Time.stamp(at), RowValues::Int(1_714_979_289));
        assert_eq!(
            DateFormat::Datetime.stamp(at),
            RowValues::Timestamp(wall.with_nanosecond(0).unwrap())
        );
    }

    #[test]
    fn unix_seconds_ignore_the_local_offset() {
        let before = Utc::now().timestamp();
        let stamp = DateFormat::Time.now();
        let after = Utc::now().timestamp();
        let secs = *stamp.as_int().unwrap();
        assert!((before..=after).contains(&secs), "{secs} outside {before}..={after}");
    }

    #[test]
    fn blank_table_is_rejected() {
        assert!(matches!(
            ModelConfig::new(" ").validate(),
            Err(DbError::Config(_))
        ));
    }
}
