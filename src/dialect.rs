use std::fmt::Write as _;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};
use crate::placeholders;
use crate::types::RowValues;

/// The SQL dialect a driver speaks.
///
/// Dialects own everything that differs textually between the engines: identifier
/// quoting, literal escaping, placeholder style and the handful of function names the
/// builders emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL and MariaDB
    #[value(name = "mysql", alias = "mariadb")]
    MySql,
    /// PostgreSQL
    #[value(name = "postgres", alias = "postgresql")]
    Postgres,
}

/// What an escaped value is going to be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    /// String body without surrounding quotes
    String,
    /// Quoted identifier
    Identifier,
    /// Complete literal, quoted when needed
    Literal,
    /// Binary literal
    Binary,
}

/// Join types understood by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// Parse a join type name; the empty string means a plain `JOIN`.
    ///
    /// # Errors
    /// Returns `DbError::UnsupportedJoinType` for anything else.
    pub fn parse(name: &str) -> DbResult<Self> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        match normalized.as_str() {
            "" | "inner" => Ok(JoinType::Inner),
            "left" | "left outer" => Ok(JoinType::Left),
            "right" | "right outer" => Ok(JoinType::Right),
            "outer" | "full" | "full outer" => Ok(JoinType::Full),
            "cross" => Ok(JoinType::Cross),
            _ => Err(DbError::UnsupportedJoinType(name.to_string())),
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

impl Dialect {
    /// Map a configured driver name onto a dialect.
    ///
    /// # Errors
    /// Returns `DbError::UnsupportedDriver` for unknown names.
    pub fn from_driver_name(name: &str) -> DbResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mysqli" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgre" | "postgresql" | "pgsql" => Ok(Dialect::Postgres),
            other => Err(DbError::UnsupportedDriver(other.to_string())),
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Dialect::MySql => 3306,
            Dialect::Postgres => 5432,
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_identifier(self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Escape the body of a string literal (no surrounding quotes).
    #[must_use]
    pub fn escape_string(self, text: &str) -> String {
        match self {
            Dialect::MySql => {
                let mut out = String::with_capacity(text.len());
                for ch in text.chars() {
                    match ch {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\x1a' => out.push_str("\\Z"),
                        _ => out.push(ch),
                    }
                }
                out
            }
            Dialect::Postgres => text.replace('\'', "''"),
        }
    }

    fn quoted_text(self, text: &str) -> String {
        match self {
            Dialect::MySql => format!("'{}'", self.escape_string(text)),
            Dialect::Postgres if text.contains('\\') => {
                format!("E'{}'", self.escape_string(text).replace('\\', "\\\\"))
            }
            Dialect::Postgres => format!("'{}'", self.escape_string(text)),
        }
    }

    fn binary_literal(self, bytes: &[u8]) -> String {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(hex, "{b:02x}");
        }
        match self {
            Dialect::MySql => format!("X'{hex}'"),
            Dialect::Postgres => format!("'\\x{hex}'::bytea"),
        }
    }

    /// Render a value as a complete SQL literal.
    #[must_use]
    pub fn literal(self, value: &RowValues) -> String {
        match value {
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) => f.to_string(),
            RowValues::Text(s) => self.quoted_text(s),
            RowValues::Bool(b) => match (self, b) {
                (Dialect::MySql, true) => "1".to_string(),
                (Dialect::MySql, false) => "0".to_string(),
                (Dialect::Postgres, true) => "TRUE".to_string(),
                (Dialect::Postgres, false) => "FALSE".to_string(),
            },
            RowValues::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            RowValues::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            RowValues::Null => "NULL".to_string(),
            RowValues::JSON(v) => self.quoted_text(&v.to_string()),
            RowValues::Blob(bytes) => self.binary_literal(bytes),
        }
    }

    /// Escape a value for the given use.
    ///
    /// ```rust
    /// use querykit::prelude::*;
    ///
    /// let d = Dialect::MySql;
    /// assert_eq!(d.escape(&"it's".into(), EscapeKind::Literal), r"'it\'s'");
    /// assert_eq!(Dialect::Postgres.escape(&"it's".into(), EscapeKind::Literal), "'it''s'");
    /// assert_eq!(d.escape(&"weird`col".into(), EscapeKind::Identifier), "`weird``col`");
    /// ```
    #[must_use]
    pub fn escape(self, value: &RowValues, kind: EscapeKind) -> String {
        match (kind, value) {
            (EscapeKind::Identifier, RowValues::Text(s)) => self.quote_identifier(s),
            (EscapeKind::Identifier, other) => self.quote_identifier(&plain_text(other)),
            (EscapeKind::String, RowValues::Text(s)) => self.escape_string(s),
            (EscapeKind::String, RowValues::Int(_) | RowValues::Float(_) | RowValues::Null) => {
                self.literal(value)
            }
            (EscapeKind::String, other) => self.escape_string(&plain_text(other)),
            (EscapeKind::Literal, v) => self.literal(v),
            (EscapeKind::Binary, RowValues::Blob(bytes)) => self.binary_literal(bytes),
            (EscapeKind::Binary, RowValues::Text(s)) => self.binary_literal(s.as_bytes()),
            (EscapeKind::Binary, other) => self.literal(other),
        }
    }

    /// Placeholder pushed into fragments at accumulation time.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Dialect::MySql => "?",
            Dialect::Postgres => placeholders::SENTINEL,
        }
    }

    /// Turn accumulated placeholders into the final wire form.
    #[must_use]
    pub fn seed_placeholders(self, sql: &str) -> String {
        match self {
            Dialect::MySql => sql.to_string(),
            Dialect::Postgres => placeholders::seed_numbered(sql),
        }
    }

    /// Rewrite `?` tokens in caller-written SQL to this dialect's accumulation placeholder.
    #[must_use]
    pub fn adopt_raw(self, sql: &str) -> String {
        match self {
            Dialect::MySql => sql.to_string(),
            Dialect::Postgres => {
                placeholders::rewrite_question_marks(sql, placeholders::SENTINEL).into_owned()
            }
        }
    }

    #[must_use]
    pub fn random_fn(self) -> &'static str {
        match self {
            Dialect::MySql => "RAND()",
            Dialect::Postgres => "RANDOM()",
        }
    }

    #[must_use]
    pub fn supports_join(self, join: JoinType) -> bool {
        !(join == JoinType::Full && self == Dialect::MySql)
    }

    /// Normalize and validate a comparison operator.
    ///
    /// # Errors
    /// Returns `DbError::UnsupportedOperator` for operators outside the allow-list.
    pub fn comparison_operator(self, op: &str) -> DbResult<String> {
        let normalized = op
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let allowed = match normalized.as_str() {
            "=" | "!=" | "<>" | "<" | ">" | "<=" | ">=" | "LIKE" | "NOT LIKE" => true,
            "ILIKE" | "NOT ILIKE" => self == Dialect::Postgres,
            _ => false,
        };
        if allowed {
            Ok(normalized)
        } else {
            Err(DbError::UnsupportedOperator(op.to_string()))
        }
    }

    /// Largest LIMIT the engine accepts; used when only an offset is given.
    #[must_use]
    pub(crate) fn offset_only_limit(self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("18446744073709551615"),
            Dialect::Postgres => None,
        }
    }
}

fn plain_text(value: &RowValues) -> String {
    match value {
        RowValues::Text(s) => s.clone(),
        RowValues::JSON(v) => v.to_string(),
        RowValues::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        RowValues::Date(d) => d.format("%Y-%m-%d").to_string(),
        RowValues::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => b.to_string(),
        RowValues::Null => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn driver_names() {
        assert_eq!(Dialect::from_driver_name("MySQLi").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_driver_name("mariadb").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_driver_name("pgsql").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::from_driver_name("postgre").unwrap(), Dialect::Postgres);
        assert!(matches!(
            Dialect::from_driver_name("sqlite"),
            Err(DbError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn mysql_escaping() {
        let d = Dialect::MySql;
        assert_eq!(d.escape_string("a\nb\\c\0\x1a\"'"), "a\\nb\\\\c\\0\\Z\\\"\\'");
        assert_eq!(d.literal(&RowValues::Bool(true)), "1");
        assert_eq!(d.literal(&RowValues::Blob(vec![0xde, 0xad])), "X'dead'");
        assert_eq!(d.literal(&RowValues::Int(-4)), "-4");
        assert_eq!(d.literal(&RowValues::Null), "NULL");
    }

    #[test]
    fn postgres_escaping() {
        let d = Dialect::Postgres;
        assert_eq!(d.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(d.literal(&"C:\\tmp".into()), "E'C:\\\\tmp'");
        assert_eq!(d.literal(&RowValues::Bool(false)), "FALSE");
        assert_eq!(d.literal(&RowValues::Blob(vec![1, 255])), "'\\x01ff'::bytea");
        assert_eq!(
            d.literal(&NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().into()),
            "'2024-02-29'"
        );
    }

    #[test]
    fn operators() {
        assert_eq!(Dialect::MySql.comparison_operator("not  like").unwrap(), "NOT LIKE");
        assert!(Dialect::MySql.comparison_operator("ILIKE").is_err());
        assert_eq!(Dialect::Postgres.comparison_operator("ilike").unwrap(), "ILIKE");
        assert!(matches!(
            Dialect::Postgres.comparison_operator("; DROP"),
            Err(DbError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn join_types() {
        assert_eq!(JoinType::parse("").unwrap(), JoinType::Inner);
        assert_eq!(JoinType::parse("FULL OUTER").unwrap(), JoinType::Full);
        assert!(!Dialect::MySql.supports_join(JoinType::Full));
        assert!(Dialect::Postgres.supports_join(JoinType::Full));
        assert!(JoinType::parse("sideways").is_err());
    }
}
