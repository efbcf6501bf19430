//! Closed error taxonomy for the object store engine.
//!
//! Every fallible engine operation returns [`EngineError`]. Storage-layer
//! failures (SQLite errors, I/O errors) are mapped to [`EngineError::Internal`]
//! rather than leaked, per the engine's error-surface design.

use thiserror::Error;

/// The closed set of errors the engine can return.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The named bucket does not exist.
    #[error("bucket does not exist: {name}")]
    NoSuchBucket {
        /// Bucket name.
        name: String,
    },

    /// A bucket with this name already exists.
    #[error("bucket already exists: {name}")]
    BucketAlreadyExists {
        /// Bucket name.
        name: String,
    },

    /// Bucket deletion was attempted while entries remain.
    #[error("bucket is not empty: {name}")]
    BucketNotEmpty {
        /// Bucket name.
        name: String,
    },

    /// The key has no current data version.
    #[error("no such key: {key}")]
    NoSuchKey {
        /// Object key.
        key: String,
    },

    /// The given version id was not found on the key.
    #[error("no such version: {key} ({version_id})")]
    NoSuchVersion {
        /// Object key.
        key: String,
        /// Version id that was not found.
        version_id: String,
    },

    /// GET/HEAD was attempted against a delete marker version.
    #[error("method not allowed on delete marker: {key} ({version_id})")]
    MethodNotAllowed {
        /// Object key.
        key: String,
        /// Version id of the delete marker.
        version_id: String,
    },

    /// A conditional read matched an unchanged state.
    #[error("not modified")]
    NotModified,

    /// A conditional write/read predicate failed.
    #[error("precondition failed")]
    PreconditionFailed,

    /// Retention or legal hold blocks a permanent delete.
    #[error("access denied: {reason}")]
    AccessDenied {
        /// Human-readable reason (lock state that blocked the operation).
        reason: String,
    },

    /// A disallowed versioning state transition was requested.
    #[error("invalid versioning transition: {from} -> {to}")]
    InvalidTransition {
        /// Originating state, as a label.
        from: String,
        /// Requested state, as a label.
        to: String,
    },

    /// An invalid retention change was requested (e.g. shortening Compliance).
    #[error("invalid retention change: {reason}")]
    InvalidRetention {
        /// Human-readable reason.
        reason: String,
    },

    /// Object Lock configuration was requested on a bucket that never had one.
    #[error("object lock configuration not found for bucket: {name}")]
    ObjectLockConfigurationNotFound {
        /// Bucket name.
        name: String,
    },

    /// An invalid bucket name was supplied.
    #[error("invalid bucket name {name}: {reason}")]
    InvalidBucketName {
        /// Bucket name.
        name: String,
        /// Reason the name is invalid.
        reason: String,
    },

    /// An object key exceeded the maximum allowed length.
    #[error("key too long")]
    KeyTooLong,

    /// A malformed or unsatisfiable Range header was supplied.
    #[error("invalid range")]
    InvalidRange,

    /// A malformed argument was supplied.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the malformed argument.
        message: String,
    },

    /// The caller cancelled the operation before it committed.
    #[error("operation cancelled")]
    Cancelled,

    /// A storage or persistence failure not otherwise enumerated above.
    ///
    /// Internal storage errors (SQLite, filesystem) are mapped here rather
    /// than surfaced directly, so callers never depend on a backing-store
    /// detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_no_such_bucket() {
        let err = EngineError::NoSuchBucket {
            name: "foo".to_owned(),
        };
        assert_eq!(err.to_string(), "bucket does not exist: foo");
    }

    #[test]
    fn test_should_map_sqlite_error_to_internal() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: EngineError = sqlite_err.into();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn test_should_map_io_error_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn test_should_format_invalid_transition() {
        let err = EngineError::InvalidTransition {
            from: "Suspended".to_owned(),
            to: "Unversioned".to_owned(),
        };
        assert!(err.to_string().contains("Suspended -> Unversioned"));
    }
}
