use std::borrow::Cow;

use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};
use crate::dialect::Dialect;

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Lexical rules that decide what counts as quoted text or a comment.
#[derive(Debug, Clone, Copy)]
pub(super) struct Flavor {
    backslash_escapes: bool,
    dollar_quotes: bool,
    hash_comments: bool,
    backticks: bool,
}

impl Flavor {
    pub(super) fn of(dialect: Dialect) -> Self {
        match dialect {
            Dialect::MySql => Flavor {
                backslash_escapes: true,
                dollar_quotes: false,
                hash_comments: true,
                backticks: true,
            },
            Dialect::Postgres => Flavor {
                backslash_escapes: false,
                dollar_quotes: true,
                hash_comments: false,
                backticks: false,
            },
        }
    }
}

/// Walk `sql` and offer every byte of unquoted, uncommented text to `visit`.
///
/// `visit` returns `Some((end, replacement))` to replace `idx..end` with `replacement`.
/// Replacements must start and end on ASCII bytes. Returns a borrowed `Cow` when nothing
/// was replaced.
pub(super) fn rewrite<'a>(
    sql: &'a str,
    flavor: Flavor,
    mut visit: impl FnMut(&[u8], usize) -> Option<(usize, String)>,
) -> Cow<'a, str> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' if flavor.backticks => state = State::Backtick,
                _ if is_line_comment_start(bytes, idx, flavor.hash_comments) => {
                    state = State::LineComment;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                _ => {
                    if b == b'$'
                        && flavor.dollar_quotes
                        && let Some((tag, advance)) = try_start_dollar_quote(bytes, idx)
                    {
                        state = State::DollarQuoted(tag);
                        idx = advance + 1;
                        continue;
                    }
                    if let Some((end, replacement)) = visit(bytes, idx) {
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                        buf.push_str(&sql[copied_to..idx]);
                        buf.push_str(&replacement);
                        copied_to = end;
                        idx = end;
                        continue;
                    }
                }
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backtick => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if b == b'\\' && flavor.backslash_escapes && quote != b'`' {
                    idx += 1; // skip the escaped byte
                } else if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // doubled quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    }
}
