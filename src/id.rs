//! ID & Hash Services.
//!
//! Stable content-hash ETags and opaque VersionId generation.

use md5::{Digest, Md5};
use uuid::Uuid;

/// The literal version id used for entries written while a bucket is
/// Unversioned, or for the "null" slot while Suspended.
pub const NULL_VERSION_ID: &str = "null";

/// ETag of the zero-length payload (MD5 of the empty string).
pub const EMPTY_ETAG: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Generate a fresh version id: a 32-character lowercase hex string.
///
/// # Examples
///
/// ```
/// use s3lite::id::new_version_id;
///
/// let id = new_version_id();
/// assert_eq!(id.len(), 32);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn new_version_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Compute the ETag (lowercase hex MD5) of a byte payload.
///
/// # Examples
///
/// ```
/// use s3lite::id::hash_bytes;
///
/// assert_eq!(hash_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_generate_32_char_hex_version_ids() {
        let id = new_version_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_should_generate_unique_version_ids() {
        assert_ne!(new_version_id(), new_version_id());
    }

    #[test]
    fn test_should_hash_empty_payload_to_fixed_etag() {
        assert_eq!(hash_bytes(b""), EMPTY_ETAG);
    }

    #[test]
    fn test_should_produce_same_hash_for_same_bytes() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
    }

    #[test]
    fn test_should_produce_different_hash_for_different_bytes() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }
}
