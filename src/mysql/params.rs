use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;

use crate::types::RowValues;

/// Bind every value onto a prepared `sqlx` query, in placeholder order.
pub(super) fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [RowValues],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.as_str()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(ts) => query.bind(*ts),
            RowValues::Date(d) => query.bind(*d),
            RowValues::Null => query.bind(None::<String>),
            // JSON columns accept their text form
            RowValues::JSON(v) => query.bind(v.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}

/// First keyword decides whether the engine answers with a row set.
pub(super) fn statement_returns_rows(sql: &str) -> bool {
    let mut rest = sql.trim_start();
    // skip leading comments and parentheses, e.g. `(SELECT ...) UNION (...)`
    loop {
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else if rest.starts_with("--") || rest.starts_with('#') {
            rest = rest.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix('(') {
            rest = after.trim_start();
        } else {
            break;
        }
    }
    let keyword: String = rest
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH" | "VALUES" | "TABLE" | "CALL"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_returning_statements() {
        assert!(statement_returns_rows("  select 1"));
        assert!(statement_returns_rows("/* hint */ SHOW COLUMNS FROM `t`"));
        assert!(statement_returns_rows("(SELECT 1) UNION (SELECT 2)"));
        assert!(statement_returns_rows("-- note\nWITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!statement_returns_rows("INSERT INTO `t` (`a`) VALUES (?)"));
        assert!(!statement_returns_rows("UPDATE `t` SET `a` = ?"));
        assert!(!statement_returns_rows("CREATE TEMPORARY TABLE `s` (`id` int)"));
    }
}
