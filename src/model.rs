//! Core data model: buckets, versioning state, entries, and lock state.
//!
//! Grounded on the corpus's bucket/object state types, generalized to the
//! engine's three-state versioning model and its lock-state fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::NULL_VERSION_ID;

/// Per-bucket versioning state machine.
///
/// Transitions: `Unversioned -> Enabled`, `Enabled <-> Suspended`. Once a
/// bucket leaves `Unversioned` it can never return; see [`crate::registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningState {
    /// No versioning has ever been enabled on this bucket.
    Unversioned,
    /// Versioning is enabled; writes append new versions.
    Enabled,
    /// Versioning was enabled and is now suspended.
    Suspended,
}

impl VersioningState {
    /// Label used in error messages and persisted rows.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unversioned => "Unversioned",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }
}

impl Default for VersioningState {
    fn default() -> Self {
        Self::Unversioned
    }
}

/// Retention mode on a [`LockState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionMode {
    /// Bypassable by a caller asserting the bypass-governance capability.
    Governance,
    /// Absolute: cannot be shortened or bypassed once set.
    Compliance,
}

/// A time-bounded retention period on a [`DataVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Retention mode.
    pub mode: RetentionMode,
    /// Timestamp after which the protected version may be permanently deleted.
    pub retain_until: DateTime<Utc>,
}

/// Per-version lock state: retention plus legal hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// Active retention, if any.
    pub retention: Option<Retention>,
    /// Legal hold flag; independent of retention.
    pub legal_hold: bool,
}

/// Bucket-level default retention, stamped onto new versions at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRetention {
    /// Mode to stamp on new versions.
    pub mode: RetentionMode,
    /// Duration in days (mutually exclusive with `years` at the API layer;
    /// the engine only needs the resolved duration).
    pub days: Option<i64>,
    /// Duration in years.
    pub years: Option<i64>,
}

impl DefaultRetention {
    /// Resolve the configured duration into a retain-until timestamp
    /// computed from `now`.
    #[must_use]
    pub fn retain_until_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(days) = self.days {
            now + chrono::Duration::days(days)
        } else if let Some(years) = self.years {
            now + chrono::Duration::days(years * 365)
        } else {
            now
        }
    }
}

/// Bucket-level Object Lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLockConfiguration {
    /// Object Lock is enabled for the bucket. Once `true`, never reverts.
    pub enabled: bool,
    /// Default retention applied to new versions, if configured.
    pub default_retention: Option<DefaultRetention>,
}

/// User-supplied object metadata carried on a [`DataVersion`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// MIME content type, if supplied by the caller.
    pub content_type: Option<String>,
    /// Caller-supplied key/value metadata (the `x-amz-meta-*` analogue).
    pub user_metadata: Vec<(String, String)>,
}

/// A stored object body with metadata: one of possibly many versions for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVersion {
    /// Object key.
    pub key: String,
    /// Version id: 32-char hex under Enabled, `"null"` under Unversioned/Suspended.
    pub version_id: String,
    /// Content ETag.
    pub etag: String,
    /// Body size in bytes.
    pub size: u64,
    /// Creation timestamp.
    pub last_modified: DateTime<Utc>,
    /// Caller-supplied metadata.
    pub metadata: ObjectMetadata,
    /// Retention / legal hold state.
    pub lock_state: LockState,
}

/// A tombstone entry hiding a key from current-view reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteMarker {
    /// Object key.
    pub key: String,
    /// Version id: 32-char hex under Enabled, `"null"` under Suspended.
    pub version_id: String,
    /// Creation timestamp.
    pub last_modified: DateTime<Utc>,
}

/// A tagged variant: either a stored body or a delete tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entry {
    /// A stored object body.
    Data(Box<DataVersion>),
    /// A delete tombstone.
    Marker(DeleteMarker),
}

impl Entry {
    /// The key this entry belongs to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Data(d) => &d.key,
            Self::Marker(m) => &m.key,
        }
    }

    /// The version id of this entry.
    #[must_use]
    pub fn version_id(&self) -> &str {
        match self {
            Self::Data(d) => &d.version_id,
            Self::Marker(m) => &m.version_id,
        }
    }

    /// Creation timestamp, used for `(created_at, sequence)` ordering.
    #[must_use]
    pub fn last_modified(&self) -> DateTime<Utc> {
        match self {
            Self::Data(d) => d.last_modified,
            Self::Marker(m) => m.last_modified,
        }
    }

    /// Whether this entry is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::Marker(_))
    }

    /// Whether this entry's `version_id` is the literal `"null"` slot.
    #[must_use]
    pub fn is_null_version(&self) -> bool {
        self.version_id() == NULL_VERSION_ID
    }

    /// Borrow the inner [`DataVersion`], if this entry is a data version.
    #[must_use]
    pub fn as_data(&self) -> Option<&DataVersion> {
        match self {
            Self::Data(d) => Some(d),
            Self::Marker(_) => None,
        }
    }

    /// Mutably borrow the inner [`DataVersion`], if this entry is a data version.
    pub fn as_data_mut(&mut self) -> Option<&mut DataVersion> {
        match self {
            Self::Data(d) => Some(d),
            Self::Marker(_) => None,
        }
    }
}

/// Durable bucket metadata (everything except the entry index, which lives
/// in the persistence adapter / object index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketMeta {
    /// Bucket name, globally unique and immutable.
    pub name: String,
    /// Current versioning state.
    pub versioning_state: VersioningState,
    /// MFA-Delete flag; persists independently of versioning transitions.
    pub mfa_delete_enabled: bool,
    /// Object Lock configuration, if ever enabled.
    pub object_lock_config: Option<ObjectLockConfiguration>,
    /// Creation timestamp.
    pub creation_time: DateTime<Utc>,
    /// Region label attached for API compatibility.
    pub region: String,
}

impl BucketMeta {
    /// Construct metadata for a newly created bucket.
    #[must_use]
    pub fn new(name: impl Into<String>, region: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            versioning_state: VersioningState::Unversioned,
            mfa_delete_enabled: false,
            object_lock_config: None,
            creation_time: now,
            region: region.into(),
        }
    }
}
