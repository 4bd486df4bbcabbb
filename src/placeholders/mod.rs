//! Placeholder handling for the two parameter styles.
//!
//! MySQL binds positional `?` markers; PostgreSQL binds numbered `$n` markers. Builders
//! accumulate fragments out of order (SET values, then joins, then WHERE, then HAVING),
//! so PostgreSQL fragments carry an internal [`SENTINEL`] that is numbered exactly once
//! after the statement is assembled.
//!
//! Warning: scanning skips quoted strings, comments and dollar-quoted blocks with a
//! lightweight state machine; unusual SQL (PL/pgSQL bodies, jsonb `?` operators) should be
//! written with explicit `$n` markers and sent through the driver directly.

use std::borrow::Cow;

mod parsers;
mod scanner;

use crate::dialect::Dialect;
use crate::types::RowValues;
use parsers::scan_digits;
use scanner::{Flavor, rewrite};

/// Marker standing in for a PostgreSQL placeholder until numbering.
pub(crate) const SENTINEL: &str = "\u{1}qk\u{1}";

/// Replace bare `?` tokens outside literals and comments with `replacement`.
///
/// `?|` and `?&` are left alone so jsonb operators survive.
#[must_use]
pub fn rewrite_question_marks<'a>(sql: &'a str, replacement: &str) -> Cow<'a, str> {
    rewrite(sql, Flavor::of(Dialect::Postgres), |bytes, idx| {
        if bytes[idx] != b'?' {
            return None;
        }
        match bytes.get(idx + 1) {
            Some(b'|' | b'&') => None,
            _ => Some((idx + 1, replacement.to_string())),
        }
    })
}

/// Number every sentinel left to right as `$1, $2, …`.
#[must_use]
pub fn seed_numbered(sql: &str) -> String {
    let mut parts = sql.split(SENTINEL);
    let mut out = String::with_capacity(sql.len());
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for (n, part) in parts.enumerate() {
        out.push('$');
        out.push_str(&(n + 1).to_string());
        out.push_str(part);
    }
    out
}

/// Count the parameters a compiled statement expects.
///
/// For PostgreSQL this is the highest `$n` referenced.
#[must_use]
pub fn count(sql: &str, dialect: Dialect) -> usize {
    let mut total = 0usize;
    let _ = rewrite(sql, Flavor::of(dialect), |bytes, idx| {
        match (dialect, bytes[idx]) {
            (Dialect::MySql, b'?') => total += 1,
            (Dialect::Postgres, b'$') => {
                if let Some((_, n)) = scan_digits(bytes, idx + 1) {
                    total = total.max(n);
                }
            }
            _ => {}
        }
        None
    });
    total
}

/// Substitute every placeholder with the dialect's escaped literal.
///
/// Only for logs and `get_compiled_*`; the result is never executed. Placeholders with no
/// matching parameter are left as written.
///
/// ```rust
/// use querykit::prelude::*;
/// use querykit::placeholders::interpolate;
///
/// let sql = interpolate("SELECT * FROM \"t\" WHERE \"a\" = $1 AND \"b\" = '$2'", &["x'y".into()], Dialect::Postgres);
/// assert_eq!(sql, "SELECT * FROM \"t\" WHERE \"a\" = 'x''y' AND \"b\" = '$2'");
/// ```
#[must_use]
pub fn interpolate(sql: &str, params: &[RowValues], dialect: Dialect) -> String {
    let mut position = 0usize;
    rewrite(sql, Flavor::of(dialect), |bytes, idx| match (dialect, bytes[idx]) {
        (Dialect::MySql, b'?') => {
            let value = params.get(position)?;
            position += 1;
            Some((idx + 1, dialect.literal(value)))
        }
        (Dialect::Postgres, b'$') => {
            let (end, n) = scan_digits(bytes, idx + 1)?;
            let value = params.get(n.checked_sub(1)?)?;
            Some((end, dialect.literal(value)))
        }
        _ => None,
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_marks_become_sentinels_outside_literals() {
        let sql = "a = ? AND b = '?' -- ?\n AND c ?| array['x'] AND d = ?";
        let out = rewrite_question_marks(sql, SENTINEL);
        assert_eq!(
            seed_numbered(&out),
            "a = $1 AND b = '?' -- ?\n AND c ?| array['x'] AND d = $2"
        );
    }

    #[test]
    fn borrowed_when_untouched() {
        let out = rewrite_question_marks("select 1", SENTINEL);
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn seeding_numbers_left_to_right() {
        let sql = format!("UPDATE t SET a = {SENTINEL} WHERE b = {SENTINEL} AND c = {SENTINEL}");
        assert_eq!(seed_numbered(&sql), "UPDATE t SET a = $1 WHERE b = $2 AND c = $3");
    }

    #[test]
    fn counting_respects_quotes() {
        assert_eq!(count("a = ? AND b = '?' AND c = ?", Dialect::MySql), 2);
        assert_eq!(count(r"a = ? AND b = 'it\'s ?' AND c = ?", Dialect::MySql), 2);
        assert_eq!(count("a = $2 AND b = $$ $9 $$ AND c = $1", Dialect::Postgres), 2);
    }

    #[test]
    fn mysql_interpolation() {
        let sql = interpolate(
            "SELECT * FROM `t` WHERE `a` = ? AND `b` = ? # ?",
            &[RowValues::Int(1), "it's".into()],
            Dialect::MySql,
        );
        assert_eq!(sql, r"SELECT * FROM `t` WHERE `a` = 1 AND `b` = 'it\'s' # ?");
    }

    #[test]
    fn non_ascii_text_survives() {
        let sql = interpolate("SELECT 'é', ? AS ü", &["ø".into()], Dialect::MySql);
        assert_eq!(sql, "SELECT 'é', 'ø' AS ü");
    }
}
