//! Validation for bucket names and object keys.
//!
//! Rules follow the [Amazon S3 documentation](https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html).
//! Tag/ACL/user-metadata-size validation from the corpus is not carried
//! forward: tagging and ACLs are outside the engine's scope.

use std::net::Ipv4Addr;

use crate::error::{EngineError, EngineResult};

/// Maximum object key length in bytes.
const MAX_KEY_BYTES: usize = 1024;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Validate a bucket name.
///
/// Rules:
/// - 3-63 characters long
/// - Only lowercase letters, numbers, hyphens, and dots
/// - Must start and end with a letter or number
/// - No consecutive dots (`..`)
/// - Not formatted as an IPv4 address (e.g. `192.168.0.1`)
/// - Must not start with `xn--`
/// - Must not end with `-s3alias`
/// - Must not start with `sthree-`
///
/// # Errors
///
/// Returns [`EngineError::InvalidBucketName`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use s3lite::validation::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-valid-bucket").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> EngineResult<()> {
    let len = name.len();

    let invalid = |reason: &str| EngineError::InvalidBucketName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(invalid(&format!(
            "bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
        )));
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(invalid(
            "bucket name must only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return Err(invalid("bucket name must start and end with a letter or number"));
    }

    if name.contains("..") {
        return Err(invalid("bucket name must not contain consecutive dots"));
    }

    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid("bucket name must not be formatted as an IP address"));
    }

    if name.starts_with("xn--") {
        return Err(invalid("bucket name must not start with 'xn--'"));
    }

    if name.ends_with("-s3alias") {
        return Err(invalid("bucket name must not end with '-s3alias'"));
    }

    if name.starts_with("sthree-") {
        return Err(invalid("bucket name must not start with 'sthree-'"));
    }

    Ok(())
}

/// Validate an object key.
///
/// Rules:
/// - 1-1024 bytes in length
/// - Must be valid UTF-8 (enforced by the `&str` type)
///
/// # Errors
///
/// Returns [`EngineError::InvalidArgument`] if the key is empty, or
/// [`EngineError::KeyTooLong`] if it exceeds 1024 bytes.
///
/// # Examples
///
/// ```
/// use s3lite::validation::validate_object_key;
///
/// assert!(validate_object_key("photos/2024/image.jpg").is_ok());
/// assert!(validate_object_key("").is_err());
/// ```
pub fn validate_object_key(key: &str) -> EngineResult<()> {
    if key.is_empty() {
        return Err(EngineError::InvalidArgument {
            message: "object key must not be empty".to_owned(),
        });
    }

    if key.len() > MAX_KEY_BYTES {
        return Err(EngineError::KeyTooLong);
    }

    Ok(())
}
