pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize, hash_comments: bool) -> bool {
    match bytes.get(idx) {
        Some(b'#') => hash_comments,
        Some(b'-') => bytes.get(idx + 1) == Some(&b'-'),
        _ => false,
    }
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// `$tag$` opener at `start`; returns the tag and the index of its closing `$`.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let mut idx = start + 1;
    if bytes.get(idx).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() {
        let tag = std::str::from_utf8(&bytes[start + 1..idx]).ok()?.to_string();
        Some((tag, idx))
    } else {
        None
    }
}

pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx) == Some(&b'$')
        && bytes.get(idx + 1..end) == Some(tag.as_bytes())
        && bytes.get(end) == Some(&b'$')
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        return None;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .and_then(|digits| digits.parse().ok())
        .map(|n| (idx, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_quote_tags() {
        assert_eq!(try_start_dollar_quote(b"$fn$ body", 0), Some(("fn".into(), 3)));
        assert_eq!(try_start_dollar_quote(b"$$", 0), Some((String::new(), 1)));
        assert_eq!(try_start_dollar_quote(b"$1", 0), None);
        assert!(matches_tag(b"x $fn$", 2, "fn"));
    }
}
