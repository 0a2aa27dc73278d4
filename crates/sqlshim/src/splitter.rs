//! Statement boundary detection for multi-statement SQL buffers.
//!
//! The scanner knows three states: outside any token, inside a bare token,
//! and inside a quoted string. Quotes only open a string when they start a
//! token, so `a'b;` ends at the `;` while `'a;b';` does not. There is no escape
//! handling: an unterminated string runs to the end of the buffer.

/// Statement terminator.
pub const SEPARATOR: u8 = b';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InToken,
    InQuoted(u8),
}

fn is_space(b: u8) -> bool {
    // C isspace() also counts vertical tab
    b.is_ascii_whitespace() || b == 0x0B
}

/// Byte length of the first statement in `sql`, including its separator.
///
/// Scanning stops at the end of the buffer, after `max_len` bytes, or at the
/// first separator outside a quoted string, whichever comes first. Returns
/// `None` when there is nothing to scan.
pub fn statement_length(sql: &[u8], max_len: Option<usize>) -> Option<usize> {
    let end = max_len.map_or(sql.len(), |max| max.min(sql.len()));
    if end == 0 {
        return None;
    }

    let mut state = ScanState::Outside;
    for (i, &b) in sql[..end].iter().enumerate() {
        match state {
            ScanState::Outside => {
                if is_space(b) {
                    continue;
                }
                if b == SEPARATOR {
                    return Some(i + 1);
                }
                state = if b == b'\'' || b == b'"' {
                    ScanState::InQuoted(b)
                } else {
                    ScanState::InToken
                };
            }
            ScanState::InQuoted(quote) => {
                if b == quote {
                    state = ScanState::Outside;
                }
            }
            ScanState::InToken => {
                if is_space(b) {
                    state = ScanState::Outside;
                } else if b == SEPARATOR {
                    return Some(i + 1);
                }
            }
        }
    }
    Some(end)
}

/// Cut the first statement off a raw byte buffer.
///
/// Returns the statement bytes (one trailing separator removed, untrimmed)
/// and the bytes after it, skipping one separator. A `max_len` that lands
/// inside a UTF-8 sequence backs off to the sequence start. The remainder is
/// `None` once nothing is left.
pub fn split_first_bytes(sql: &[u8], max_len: Option<usize>) -> (&[u8], Option<&[u8]>) {
    let mut len = statement_length(sql, max_len).unwrap_or(0);
    while len > 0 && len < sql.len() && (sql[len] & 0xC0) == 0x80 {
        len -= 1;
    }

    let head = &sql[..len];
    let stmt = head.strip_suffix(b";").unwrap_or(head);
    let rest = &sql[stmt.len()..];
    let rest = rest.strip_prefix(b";").unwrap_or(rest);
    (stmt, (!rest.is_empty()).then_some(rest))
}

/// Cut the first statement off `sql`.
///
/// Returns the statement text (one trailing separator removed, surrounding
/// whitespace trimmed) and the remaining text after skipping one separator.
/// The remainder is `None` once nothing is left.
pub fn split_first(sql: &str, max_len: Option<usize>) -> (&str, Option<&str>) {
    let (stmt, rest) = split_first_bytes(sql.as_bytes(), max_len);
    let stmt = &sql[..stmt.len()];
    let rest = rest.map(|rest| &sql[sql.len() - rest.len()..]);
    (stmt.trim(), rest)
}

/// Iterate over the non-empty statements of a buffer.
pub fn split_statements(sql: &str) -> Statements<'_> {
    Statements { rest: Some(sql) }
}

/// Iterator returned by [`split_statements`].
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for Statements<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let (stmt, rest) = split_first(self.rest?, None);
            self.rest = rest;
            if !stmt.is_empty() {
                return Some(stmt);
            }
        }
    }
}
