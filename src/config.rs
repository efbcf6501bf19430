//! Engine configuration.
//!
//! Provides [`EngineConfig`] for configuring the object store engine. Unlike
//! a wire-facing service, the engine has exactly one mandatory setting (the
//! data directory); everything else defaults to a sensible value and may be
//! overridden from the environment for operability.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default in-memory spill threshold for blob writes: 512 KiB.
pub const DEFAULT_MAX_MEMORY_OBJECT_SIZE: usize = 524_288;

/// Engine configuration.
///
/// # Examples
///
/// ```
/// use s3lite::config::EngineConfig;
///
/// let config = EngineConfig::new("/tmp/s3lite-data");
/// assert_eq!(config.data_dir, "/tmp/s3lite-data");
/// assert_eq!(config.max_memory_object_size, 524_288);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory holding the durable database file and content-addressed blobs.
    pub data_dir: String,

    /// Maximum object size (in bytes) buffered entirely in memory before
    /// streaming the write to a temp file.
    #[builder(default = DEFAULT_MAX_MEMORY_OBJECT_SIZE)]
    pub max_memory_object_size: usize,

    /// Default region label attached to bucket metadata for API compatibility.
    #[builder(default = String::from("us-east-1"))]
    pub default_region: String,
}

impl EngineConfig {
    /// Create a configuration with the given data directory and all other
    /// fields at their default.
    #[must_use]
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_memory_object_size: DEFAULT_MAX_MEMORY_OBJECT_SIZE,
            default_region: String::from("us-east-1"),
        }
    }

    /// Build a configuration from environment variables, falling back to
    /// `data_dir` when `S3LITE_DATA_DIR` is unset.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3LITE_DATA_DIR` | (required argument) |
    /// | `S3LITE_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `S3LITE_DEFAULT_REGION` | `us-east-1` |
    #[must_use]
    pub fn from_env(data_dir: impl Into<String>) -> Self {
        let mut config = Self::new(data_dir);

        if let Ok(v) = std::env::var("S3LITE_DATA_DIR") {
            config.data_dir = v;
        }
        if let Ok(v) = std::env::var("S3LITE_MAX_MEMORY_OBJECT_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_memory_object_size = n;
            }
        }
        if let Ok(v) = std::env::var("S3LITE_DEFAULT_REGION") {
            config.default_region = v;
        }

        config
    }
}
