//! Small stateless helpers: range parsing, conditional-header predicates,
//! pagination token codecs, and cooperative cancellation.
//!
//! Adapted from the corpus's `utils.rs`. ID/hash generation lives in
//! [`crate::id`] instead, and copy-source/XML helpers are dropped since the
//! engine takes structured arguments rather than HTTP header strings.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::error::{EngineError, EngineResult};

/// Cooperative cancellation signal accepted by every Request Surface
/// operation (§5 of the engine's design: "every operation accepts a
/// cancellation signal").
///
/// The engine has no long-running I/O of its own to interrupt mid-flight —
/// every mutation commits in one fast, lock-held step — so a token is only
/// ever observed at the single safe checkpoint before that step starts.
/// Cloning shares the same underlying flag; cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::cancel`] has been called on this token or a clone of it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return [`EngineError::Cancelled`] if cancellation was requested,
    /// otherwise `Ok(())`. Called at the one safe checkpoint before a
    /// mutation commits.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Cancelled`] if [`Self::cancel`] was called.
    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Parse a `Range: bytes=...` value against a known content length, returning
/// an inclusive `(start, end)` byte range.
///
/// Supports `bytes=N-M`, `bytes=N-` (N to end), and `bytes=-N` (last N bytes).
///
/// # Errors
///
/// Returns [`EngineError::InvalidRange`] if the value is malformed or
/// unsatisfiable against `content_length`.
///
/// # Examples
///
/// ```
/// use s3lite::utils::parse_range_header;
///
/// assert_eq!(parse_range_header("bytes=0-99", 200).unwrap(), (0, 99));
/// assert_eq!(parse_range_header("bytes=-10", 200).unwrap(), (190, 199));
/// ```
pub fn parse_range_header(range: &str, content_length: u64) -> EngineResult<(u64, u64)> {
    let range = range.strip_prefix("bytes=").ok_or(EngineError::InvalidRange)?;

    if content_length == 0 {
        return Err(EngineError::InvalidRange);
    }

    if let Some(suffix) = range.strip_prefix('-') {
        let n: u64 = suffix.parse().map_err(|_| EngineError::InvalidRange)?;
        if n == 0 || n > content_length {
            return Err(EngineError::InvalidRange);
        }
        let start = content_length - n;
        Ok((start, content_length - 1))
    } else if let Some(prefix) = range.strip_suffix('-') {
        let start: u64 = prefix.parse().map_err(|_| EngineError::InvalidRange)?;
        if start >= content_length {
            return Err(EngineError::InvalidRange);
        }
        Ok((start, content_length - 1))
    } else {
        let mut parts = range.splitn(2, '-');
        let start: u64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(EngineError::InvalidRange)?;
        let end: u64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(EngineError::InvalidRange)?;
        if start > end || end >= content_length {
            return Err(EngineError::InvalidRange);
        }
        Ok((start, end))
    }
}

/// Check whether an ETag satisfies an `If-Match` condition.
///
/// # Examples
///
/// ```
/// use s3lite::utils::is_valid_if_match;
///
/// assert!(is_valid_if_match("\"abc\"", "*"));
/// assert!(is_valid_if_match("\"abc\"", "\"abc\""));
/// assert!(!is_valid_if_match("\"abc\"", "\"xyz\""));
/// ```
#[must_use]
pub fn is_valid_if_match(etag: &str, if_match: &str) -> bool {
    if if_match == "*" {
        return true;
    }
    normalize_etag(etag) == normalize_etag(if_match)
}

/// Check whether an ETag satisfies an `If-None-Match` condition.
///
/// Returns `true` if the object should be returned (the ETag does *not*
/// match); `false` means the predicate failed (`NotModified`/`PreconditionFailed`
/// territory, depending on the calling operation).
///
/// # Examples
///
/// ```
/// use s3lite::utils::is_valid_if_none_match;
///
/// assert!(!is_valid_if_none_match("\"abc\"", "*"));
/// assert!(!is_valid_if_none_match("\"abc\"", "\"abc\""));
/// assert!(is_valid_if_none_match("\"abc\"", "\"xyz\""));
/// ```
#[must_use]
pub fn is_valid_if_none_match(etag: &str, if_none_match: &str) -> bool {
    if if_none_match == "*" {
        return false;
    }
    normalize_etag(etag) != normalize_etag(if_none_match)
}

/// Strip surrounding double quotes from an ETag, if present.
fn normalize_etag(etag: &str) -> &str {
    etag.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(etag)
}

/// Encode an object key as a base64 pagination (continuation/marker) token.
///
/// # Examples
///
/// ```
/// use s3lite::utils::{encode_continuation_token, decode_continuation_token};
///
/// let token = encode_continuation_token("photos/2024/img.jpg");
/// assert_eq!(decode_continuation_token(&token).unwrap(), "photos/2024/img.jpg");
/// ```
#[must_use]
pub fn encode_continuation_token(key: &str) -> String {
    BASE64_STANDARD.encode(key.as_bytes())
}

/// Decode a base64 pagination token back to an object key.
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if the token is not valid base64
/// or does not decode to valid UTF-8.
pub fn decode_continuation_token(token: &str) -> EngineResult<String> {
    let bytes = BASE64_STANDARD
        .decode(token)
        .map_err(|_| EngineError::InvalidArgument {
            message: "invalid continuation token".to_owned(),
        })?;
    String::from_utf8(bytes).map_err(|_| EngineError::InvalidArgument {
        message: "continuation token contains invalid UTF-8".to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_explicit_byte_range() {
        assert_eq!(parse_range_header("bytes=0-99", 200).unwrap(), (0, 99));
    }

    #[test]
    fn test_should_parse_suffix_range() {
        assert_eq!(parse_range_header("bytes=-10", 200).unwrap(), (190, 199));
    }

    #[test]
    fn test_should_parse_open_ended_range() {
        assert_eq!(parse_range_header("bytes=100-", 200).unwrap(), (100, 199));
    }

    #[test]
    fn test_should_reject_range_against_empty_content() {
        assert!(parse_range_header("bytes=0-0", 0).is_err());
    }

    #[test]
    fn test_should_reject_out_of_bounds_range() {
        assert!(parse_range_header("bytes=500-600", 200).is_err());
    }

    #[test]
    fn test_should_match_wildcard_if_match() {
        assert!(is_valid_if_match("\"abc\"", "*"));
    }

    #[test]
    fn test_should_match_equal_etags_ignoring_quotes() {
        assert!(is_valid_if_match("abc", "\"abc\""));
    }

    #[test]
    fn test_should_fail_if_none_match_wildcard() {
        assert!(!is_valid_if_none_match("\"abc\"", "*"));
    }

    #[test]
    fn test_should_pass_if_none_match_on_different_etag() {
        assert!(is_valid_if_none_match("\"abc\"", "\"xyz\""));
    }

    #[test]
    fn test_should_roundtrip_continuation_token() {
        let token = encode_continuation_token("photos/2024/img.jpg");
        assert_eq!(decode_continuation_token(&token).unwrap(), "photos/2024/img.jpg");
    }

    #[test]
    fn test_should_reject_malformed_continuation_token() {
        assert!(decode_continuation_token("not-base64-!!").is_err());
    }

    #[test]
    fn test_should_pass_check_on_fresh_token() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_should_fail_check_after_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(token.check(), Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_should_share_cancellation_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
