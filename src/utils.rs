//! Buffer helpers for the control protocol.

use bytes::BytesMut;

use crate::error::{OfflineError, OfflineResult};

/// Decode a request buffer into a trimmed line, consuming the buffer.
///
/// Returns an error if the buffer is not UTF-8 or holds only whitespace.
pub fn buffer_to_line(buf: &mut BytesMut) -> OfflineResult<String> {
    let bytes = buf.split();
    let line = std::str::from_utf8(&bytes)
        .map_err(|e| OfflineError::ParseError(format!("request is not UTF-8: {}", e)))?
        .trim();

    if line.is_empty() {
        return Err(OfflineError::ParseError("empty command".to_string()));
    }
    Ok(line.to_string())
}

/// Split off the first whitespace-delimited word.
///
/// Returns the word and the remainder with leading whitespace removed.
pub fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}
