//! Versioning Controller: the PUT/DELETE/COPY state machine across the
//! three bucket versioning states.
//!
//! Grounded on the corpus's object CRUD handlers (`ops/object.rs`),
//! generalized from HTTP request/response DTOs to the engine's own `Entry`
//! model, and collapsed into one state machine shared by all three
//! versioning states instead of branching scattered across separate
//! handlers.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, EngineResult};
use crate::id::{self, NULL_VERSION_ID};
use crate::lock;
use crate::model::{DataVersion, DeleteMarker, Entry, LockState, ObjectMetadata, VersioningState};
use crate::persistence::Persistence;
use crate::registry::BucketHandle;
use crate::utils::{is_valid_if_match, is_valid_if_none_match};

/// Result of a successful `PutObject` or `CopyObject`.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// Version id assigned to the new version (`"null"` outside Enabled).
    pub version_id: String,
    /// ETag of the stored body.
    pub etag: String,
    /// Body size in bytes.
    pub size: u64,
}

/// Result of a successful `DeleteObject`.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    /// The version id affected: a fresh delete marker id, `"null"`, or the
    /// permanently-removed version's id.
    pub version_id: String,
    /// Whether this delete created (or targeted) a delete marker.
    pub delete_marker: bool,
}

/// Conditional-header predicates, honored unconditionally rather than
/// staged behind a feature flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preconditions<'a> {
    /// `If-Match` value, if supplied.
    pub if_match: Option<&'a str>,
    /// `If-None-Match` value, if supplied.
    pub if_none_match: Option<&'a str>,
    /// `If-Modified-Since` value, if supplied.
    pub if_modified_since: Option<DateTime<Utc>>,
    /// `If-Unmodified-Since` value, if supplied.
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

/// Write a new body to `key`, following the versioning state's PUT semantics.
///
/// # Errors
///
/// Returns [`EngineError::PreconditionFailed`] if a supplied precondition
/// does not hold.
pub fn put_object(
    handle: &BucketHandle,
    persistence: &Persistence,
    key: &str,
    body: Vec<u8>,
    content_type: Option<String>,
    user_metadata: Vec<(String, String)>,
    preconditions: Preconditions<'_>,
) -> EngineResult<PutOutcome> {
    let meta = handle.meta();
    let history = handle.index().history(key);
    let now = Utc::now();
    let etag = id::hash_bytes(&body);
    let size = u64::try_from(body.len()).unwrap_or(u64::MAX);

    check_write_preconditions(&history, preconditions)?;

    let mut data = DataVersion {
        key: key.to_owned(),
        version_id: NULL_VERSION_ID.to_owned(),
        etag,
        size,
        last_modified: now,
        metadata: ObjectMetadata {
            content_type,
            user_metadata,
        },
        lock_state: LockState::default(),
    };

    match meta.versioning_state {
        VersioningState::Unversioned => {
            history.mutate(|entries| {
                entries.clear();
                entries.push(Entry::Data(Box::new(data.clone())));
            });
            let seq = persistence.next_seq(&meta.name)?;
            persistence.put_entry(&meta.name, &Entry::Data(Box::new(data.clone())), seq, Some(&body))?;
        }
        VersioningState::Enabled => {
            data.version_id = id::new_version_id();
            if let Some(config) = &meta.object_lock_config {
                lock::stamp_default_retention(&mut data, Some(config), now);
            }
            history.mutate(|entries| entries.push(Entry::Data(Box::new(data.clone()))));
            let seq = persistence.next_seq(&meta.name)?;
            persistence.put_entry(&meta.name, &Entry::Data(Box::new(data.clone())), seq, Some(&body))?;
        }
        VersioningState::Suspended => {
            let removed = history.mutate(|entries| {
                let pos = entries.iter().position(|e| e.version_id() == NULL_VERSION_ID);
                let removed = pos.map(|i| entries.remove(i));
                entries.push(Entry::Data(Box::new(data.clone())));
                removed
            });
            let seq = persistence.next_seq(&meta.name)?;
            persistence.replace_entry(
                &meta.name,
                removed.as_ref().map(|_| NULL_VERSION_ID),
                &Entry::Data(Box::new(data.clone())),
                seq,
                Some(&body),
            )?;
        }
    }

    Ok(PutOutcome {
        version_id: data.version_id,
        etag: data.etag,
        size: data.size,
    })
}

fn check_write_preconditions(
    history: &crate::index::KeyHistory,
    preconditions: Preconditions<'_>,
) -> EngineResult<()> {
    let current_entry = history.current();
    let current_data = current_entry.as_ref().and_then(Entry::as_data);

    if let Some(if_match) = preconditions.if_match {
        match current_data {
            Some(d) if is_valid_if_match(&d.etag, if_match) => {}
            _ => return Err(EngineError::PreconditionFailed),
        }
    }

    if let Some(if_none_match) = preconditions.if_none_match {
        if if_none_match == "*" {
            if current_data.is_some() {
                return Err(EngineError::PreconditionFailed);
            }
        } else if let Some(d) = current_data {
            if !is_valid_if_none_match(&d.etag, if_none_match) {
                return Err(EngineError::PreconditionFailed);
            }
        }
    }

    Ok(())
}

/// Resolve a read target (for GET/HEAD) and apply any conditional-read
/// predicates.
///
/// # Errors
///
/// - [`EngineError::NoSuchKey`] if the key has no entries, or its latest
///   entry is a delete marker and no explicit `version_id` was given.
/// - [`EngineError::NoSuchVersion`] if an explicit `version_id` was given
///   and not found.
/// - [`EngineError::MethodNotAllowed`] if an explicit `version_id` resolves
///   to a delete marker.
/// - [`EngineError::NotModified`] / [`EngineError::PreconditionFailed`] per
///   the supplied preconditions.
pub fn get_object(
    handle: &BucketHandle,
    key: &str,
    version_id: Option<&str>,
    preconditions: Preconditions<'_>,
) -> EngineResult<DataVersion> {
    let history = handle.index().get(key);

    let entry = match version_id {
        Some(vid) => history
            .and_then(|h| h.find(vid))
            .ok_or_else(|| EngineError::NoSuchVersion {
                key: key.to_owned(),
                version_id: vid.to_owned(),
            })?,
        None => {
            let history = history.ok_or_else(|| EngineError::NoSuchKey {
                key: key.to_owned(),
            })?;
            let entry = history.current().ok_or_else(|| EngineError::NoSuchKey {
                key: key.to_owned(),
            })?;
            if entry.is_delete_marker() {
                return Err(EngineError::NoSuchKey {
                    key: key.to_owned(),
                });
            }
            entry
        }
    };

    if entry.is_delete_marker() {
        return Err(EngineError::MethodNotAllowed {
            key: key.to_owned(),
            version_id: entry.version_id().to_owned(),
        });
    }

    let data = entry.as_data().expect("checked not a delete marker above").clone();
    check_read_preconditions(&data, preconditions)?;
    Ok(data)
}

fn check_read_preconditions(data: &DataVersion, preconditions: Preconditions<'_>) -> EngineResult<()> {
    if let Some(if_none_match) = preconditions.if_none_match {
        if !is_valid_if_none_match(&data.etag, if_none_match) {
            return Err(EngineError::NotModified);
        }
    }
    if let Some(if_match) = preconditions.if_match {
        if !is_valid_if_match(&data.etag, if_match) {
            return Err(EngineError::PreconditionFailed);
        }
    }
    if let Some(since) = preconditions.if_modified_since {
        if data.last_modified <= since {
            return Err(EngineError::NotModified);
        }
    }
    if let Some(since) = preconditions.if_unmodified_since {
        if data.last_modified > since {
            return Err(EngineError::PreconditionFailed);
        }
    }
    Ok(())
}

/// Simple delete: no `version_id` given.
///
/// # Errors
///
/// This operation is infallible given a valid bucket handle; the `Result`
/// exists for symmetry with the rest of the controller and to surface
/// persistence failures.
pub fn delete_object_simple(
    handle: &BucketHandle,
    persistence: &Persistence,
    key: &str,
) -> EngineResult<DeleteOutcome> {
    let meta = handle.meta();
    let history = handle.index().history(key);
    let now = Utc::now();

    match meta.versioning_state {
        VersioningState::Unversioned => {
            let existed = history.mutate(|entries| {
                let existed = !entries.is_empty();
                entries.clear();
                existed
            });
            if existed {
                persistence.delete_entry(&meta.name, key, NULL_VERSION_ID)?;
            }
            Ok(DeleteOutcome {
                version_id: NULL_VERSION_ID.to_owned(),
                delete_marker: false,
            })
        }
        VersioningState::Enabled => {
            let marker = DeleteMarker {
                key: key.to_owned(),
                version_id: id::new_version_id(),
                last_modified: now,
            };
            history.mutate(|entries| entries.push(Entry::Marker(marker.clone())));
            let seq = persistence.next_seq(&meta.name)?;
            persistence.put_entry(&meta.name, &Entry::Marker(marker.clone()), seq, None)?;
            Ok(DeleteOutcome {
                version_id: marker.version_id,
                delete_marker: true,
            })
        }
        VersioningState::Suspended => {
            let marker = DeleteMarker {
                key: key.to_owned(),
                version_id: NULL_VERSION_ID.to_owned(),
                last_modified: now,
            };
            let removed = history.mutate(|entries| {
                let pos = entries.iter().position(|e| e.version_id() == NULL_VERSION_ID);
                let removed = pos.map(|i| entries.remove(i));
                entries.push(Entry::Marker(marker.clone()));
                removed
            });
            let seq = persistence.next_seq(&meta.name)?;
            persistence.replace_entry(
                &meta.name,
                removed.as_ref().map(|_| NULL_VERSION_ID),
                &Entry::Marker(marker.clone()),
                seq,
                None,
            )?;
            Ok(DeleteOutcome {
                version_id: NULL_VERSION_ID.to_owned(),
                delete_marker: true,
            })
        }
    }
}

/// Permanent delete: a specific `version_id` is removed outright.
///
/// Idempotent: succeeds with no state change if the version id is absent.
///
/// # Errors
///
/// Returns [`EngineError::AccessDenied`] if the target version is under
/// legal hold or active retention (see [`crate::lock`]).
pub fn delete_object_version(
    handle: &BucketHandle,
    persistence: &Persistence,
    key: &str,
    version_id: &str,
    bypass_governance: bool,
) -> EngineResult<DeleteOutcome> {
    let meta = handle.meta();
    let Some(history) = handle.index().get(key) else {
        return Ok(DeleteOutcome {
            version_id: version_id.to_owned(),
            delete_marker: false,
        });
    };

    let now = Utc::now();
    let removed_was_marker: Option<bool> = history.mutate(|entries| -> EngineResult<Option<bool>> {
        let Some(pos) = entries.iter().position(|e| e.version_id() == version_id) else {
            return Ok(None);
        };
        if let Some(data) = entries[pos].as_data() {
            lock::check_permanent_delete_allowed(data, now, bypass_governance)?;
        }
        let removed = entries.remove(pos);
        Ok(Some(removed.is_delete_marker()))
    })?;

    let Some(was_marker) = removed_was_marker else {
        return Ok(DeleteOutcome {
            version_id: version_id.to_owned(),
            delete_marker: false,
        });
    };

    persistence.delete_entry(&meta.name, key, version_id)?;
    if history.is_empty() {
        handle.index().remove_key(key);
    }

    Ok(DeleteOutcome {
        version_id: version_id.to_owned(),
        delete_marker: was_marker,
    })
}

/// Copy the current (or a specific) version of `src_key` to `dst_key`,
/// across buckets served by the same persistence adapter.
///
/// # Errors
///
/// Returns [`EngineError::NoSuchKey`] / [`EngineError::NoSuchVersion`] if
/// the source cannot be resolved.
pub fn copy_object(
    src_handle: &BucketHandle,
    dst_handle: &BucketHandle,
    persistence: &Persistence,
    src_key: &str,
    src_version_id: Option<&str>,
    dst_key: &str,
    content_type_override: Option<String>,
) -> EngineResult<PutOutcome> {
    let src_data = resolve_copy_source(src_handle, src_key, src_version_id)?;
    let body = persistence.read_blob(&src_data.etag)?;
    let content_type = content_type_override.or_else(|| src_data.metadata.content_type.clone());

    put_object(
        dst_handle,
        persistence,
        dst_key,
        body,
        content_type,
        src_data.metadata.user_metadata.clone(),
        Preconditions::default(),
    )
}

fn resolve_copy_source(
    handle: &BucketHandle,
    key: &str,
    version_id: Option<&str>,
) -> EngineResult<DataVersion> {
    let history = handle.index().get(key);
    let entry = match version_id {
        Some(vid) => history
            .and_then(|h| h.find(vid))
            .ok_or_else(|| EngineError::NoSuchVersion {
                key: key.to_owned(),
                version_id: vid.to_owned(),
            })?,
        None => {
            let history = history.ok_or_else(|| EngineError::NoSuchKey {
                key: key.to_owned(),
            })?;
            history.current().ok_or_else(|| EngineError::NoSuchKey {
                key: key.to_owned(),
            })?
        }
    };
    if entry.is_delete_marker() {
        return Err(EngineError::NoSuchKey {
            key: key.to_owned(),
        });
    }
    Ok(entry.as_data().expect("checked not a delete marker above").clone())
}
