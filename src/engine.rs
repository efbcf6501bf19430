//! Request Surface: the engine's single external entry point.
//!
//! Grounded on the corpus's `RustStackS3` provider (`provider.rs`): one
//! struct wrapping the lower layers, with `pub async fn` handler methods
//! mirroring the shape of `handle_*` there, even though every body here is
//! synchronous — kept `async` so the engine composes directly into any async
//! facade built on top, per the Request Surface contract.
//!
//! Every method accepts an optional [`CancellationToken`]: the engine has no
//! long-running I/O to interrupt mid-flight, so the token is checked once,
//! at the single safe point before any mutation is committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::lock;
use crate::model::{DataVersion, ObjectLockConfiguration, Retention, VersioningState};
use crate::persistence::Persistence;
use crate::query::{self, ListObjectsPage, ListVersionsPage};
use crate::registry::Registry;
use crate::utils::CancellationToken;
use crate::validation::{validate_bucket_name, validate_object_key};
use crate::versioning::{self, Preconditions, PutOutcome};

/// Check a caller-supplied cancellation token, if any, before a mutation
/// commits. Read-only operations check too, for uniformity with §5's
/// "every operation accepts a cancellation signal".
fn check_cancel(cancel: Option<&CancellationToken>) -> EngineResult<()> {
    cancel.map_or(Ok(()), CancellationToken::check)
}

/// A single result of [`Engine::get_object`] / [`Engine::head_object`].
#[derive(Debug, Clone)]
pub struct ObjectOutput {
    /// Object body. Empty for [`Engine::head_object`].
    pub body: Vec<u8>,
    /// Content ETag.
    pub etag: String,
    /// Body size in bytes.
    pub size: u64,
    /// MIME content type, if one was supplied at write time.
    pub content_type: Option<String>,
    /// Version id of the returned data version.
    pub version_id: String,
    /// Creation timestamp of the returned data version.
    pub last_modified: DateTime<Utc>,
    /// Always `false`: delete-marker reads fail with [`EngineError::MethodNotAllowed`]
    /// rather than resolving to a result, so a successful output is never one.
    pub is_delete_marker: bool,
}

impl ObjectOutput {
    fn from_data(data: DataVersion, include_body: bool, body: Vec<u8>) -> Self {
        Self {
            body: if include_body { body } else { Vec::new() },
            etag: data.etag,
            size: data.size,
            content_type: data.metadata.content_type,
            version_id: data.version_id,
            last_modified: data.last_modified,
            is_delete_marker: false,
        }
    }
}

/// One requested item in a [`Engine::delete_objects`] batch.
#[derive(Debug, Clone)]
pub struct DeleteRequestItem {
    /// Object key.
    pub key: String,
    /// Specific version to permanently delete; `None` means a simple delete.
    pub version_id: Option<String>,
}

/// One successfully deleted item in a [`DeleteObjectsOutcome`].
#[derive(Debug, Clone)]
pub struct DeletedItem {
    /// Object key.
    pub key: String,
    /// The version id affected (fresh marker id, `"null"`, or the removed version).
    pub version_id: String,
    /// Whether this item created or targeted a delete marker.
    pub delete_marker: bool,
}

/// One failed item in a [`DeleteObjectsOutcome`].
#[derive(Debug, Clone)]
pub struct DeleteErrorItem {
    /// Object key.
    pub key: String,
    /// Version id that was requested, if any.
    pub version_id: Option<String>,
    /// Stable error code (the [`EngineError`] variant name).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Result of [`Engine::delete_objects`]. Every requested item yields exactly
/// one of `deleted` or `errors`; the call never aborts partway.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectsOutcome {
    /// Successfully deleted (or marked) items. Empty when `quiet` was set.
    pub deleted: Vec<DeletedItem>,
    /// Failed items, always populated regardless of `quiet`.
    pub errors: Vec<DeleteErrorItem>,
}

/// The engine's external entry point: one handle wrapping the Bucket
/// Registry and Persistence Adapter, exposing the Request Surface as plain
/// async methods.
#[derive(Debug)]
pub struct Engine {
    registry: Registry,
    persistence: Arc<Persistence>,
    config: Arc<EngineConfig>,
}

#[allow(clippy::unused_async)]
impl Engine {
    /// Open (or create) the durable store at `config.data_dir` and rebuild
    /// the in-memory registry from it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Internal`] on a storage failure while opening
    /// the database or rebuilding the registry.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        let persistence = Arc::new(Persistence::open(&config.data_dir)?);
        let registry = Registry::load(persistence.clone())?;
        info!(data_dir = %config.data_dir, "engine opened");
        Ok(Self {
            registry,
            persistence,
            config: Arc::new(config),
        })
    }

    /// The configuration this engine was opened with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------

    /// Create a new, empty bucket.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidBucketName`], [`EngineError::BucketAlreadyExists`],
    /// [`EngineError::Cancelled`].
    pub async fn create_bucket(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        validate_bucket_name(name)?;
        self.registry.create_bucket(name, &self.config.default_region)?;
        debug!(bucket = %name, "create_bucket completed");
        Ok(())
    }

    /// Delete a bucket. Fails unless it is empty (no entries, no delete markers).
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::BucketNotEmpty`],
    /// [`EngineError::Cancelled`].
    pub async fn delete_bucket(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        self.registry.delete_bucket(name)?;
        debug!(bucket = %name, "delete_bucket completed");
        Ok(())
    }

    /// Check that a bucket exists and is accessible.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::Cancelled`].
    pub async fn head_bucket(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        self.registry.get_handle(name)?;
        Ok(())
    }

    /// Transition a bucket's versioning state, optionally updating its
    /// MFA-Delete flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::InvalidTransition`],
    /// [`EngineError::Cancelled`].
    pub async fn put_bucket_versioning(
        &self,
        name: &str,
        state: VersioningState,
        mfa_delete: Option<bool>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        self.registry.set_versioning(name, state, mfa_delete)?;
        debug!(bucket = %name, state = state.as_str(), "put_bucket_versioning completed");
        Ok(())
    }

    /// Fetch a bucket's versioning state and MFA-Delete flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::Cancelled`].
    pub async fn get_bucket_versioning(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<(VersioningState, bool)> {
        check_cancel(cancel)?;
        let meta = self.registry.get_handle(name)?.meta();
        Ok((meta.versioning_state, meta.mfa_delete_enabled))
    }

    /// Set (or replace) a bucket's Object Lock configuration. Requires the
    /// bucket to already be versioning-Enabled.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::InvalidArgument`],
    /// [`EngineError::Cancelled`].
    pub async fn put_object_lock_configuration(
        &self,
        name: &str,
        config: ObjectLockConfiguration,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        self.registry.set_object_lock_config(name, config)?;
        debug!(bucket = %name, "put_object_lock_configuration completed");
        Ok(())
    }

    /// Fetch a bucket's Object Lock configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::ObjectLockConfigurationNotFound`],
    /// [`EngineError::Cancelled`].
    pub async fn get_object_lock_configuration(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ObjectLockConfiguration> {
        check_cancel(cancel)?;
        self.registry.get_object_lock_config(name)
    }

    // -----------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------

    /// Write a new body to `key`.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::InvalidArgument`] (bad key),
    /// [`EngineError::PreconditionFailed`], [`EngineError::Cancelled`].
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<String>,
        user_metadata: Vec<(String, String)>,
        preconditions: Preconditions<'_>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<PutOutcome> {
        check_cancel(cancel)?;
        validate_object_key(key)?;
        let handle = self.registry.get_handle(bucket)?;
        let outcome = versioning::put_object(
            &handle,
            &self.persistence,
            key,
            body,
            content_type,
            user_metadata,
            preconditions,
        )?;
        info!(bucket, key, version_id = %outcome.version_id, "put_object completed");
        Ok(outcome)
    }

    /// Fetch an object's body and metadata.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::MethodNotAllowed`],
    /// [`EngineError::NotModified`], [`EngineError::PreconditionFailed`],
    /// [`EngineError::Cancelled`].
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        preconditions: Preconditions<'_>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ObjectOutput> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let data = versioning::get_object(&handle, key, version_id, preconditions)?;
        let body = self.persistence.read_blob(&data.etag)?;
        Ok(ObjectOutput::from_data(data, true, body))
    }

    /// Fetch an object's metadata without its body.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::get_object`].
    pub async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        preconditions: Preconditions<'_>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ObjectOutput> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let data = versioning::get_object(&handle, key, version_id, preconditions)?;
        Ok(ObjectOutput::from_data(data, false, Vec::new()))
    }

    /// Delete an object: a simple delete when `version_id` is absent, a
    /// permanent delete of that exact version otherwise.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::AccessDenied`] (lock-protected),
    /// [`EngineError::Cancelled`].
    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        bypass_governance: bool,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<versioning::DeleteOutcome> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let outcome = match version_id {
            Some(vid) => versioning::delete_object_version(
                &handle,
                &self.persistence,
                key,
                vid,
                bypass_governance,
            )?,
            None => versioning::delete_object_simple(&handle, &self.persistence, key)?,
        };
        info!(bucket, key, version_id = %outcome.version_id, "delete_object completed");
        Ok(outcome)
    }

    /// Batch delete. Every requested item yields exactly one of a `deleted`
    /// or an `errors` record; the call never aborts partway. When `quiet` is
    /// set, successful deletions are omitted from `deleted` but errors are
    /// always reported.
    ///
    /// A cancellation request is honored only before the batch starts: once
    /// underway, every item still yields an outcome, since a half-applied
    /// batch would violate "every requested item yields exactly one of the
    /// two outcomes" (§7).
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`] for the bucket as a whole;
    /// [`EngineError::Cancelled`] if cancelled before starting. Per-item
    /// failures are reported in the returned `errors` list, not as an `Err`.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        items: Vec<DeleteRequestItem>,
        quiet: bool,
        bypass_governance: bool,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<DeleteObjectsOutcome> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let mut outcome = DeleteObjectsOutcome::default();

        for item in items {
            let result = match &item.version_id {
                Some(vid) => versioning::delete_object_version(
                    &handle,
                    &self.persistence,
                    &item.key,
                    vid,
                    bypass_governance,
                ),
                None => versioning::delete_object_simple(&handle, &self.persistence, &item.key),
            };
            match result {
                Ok(deleted) => {
                    if !quiet {
                        outcome.deleted.push(DeletedItem {
                            key: item.key,
                            version_id: deleted.version_id,
                            delete_marker: deleted.delete_marker,
                        });
                    }
                }
                Err(err) => outcome.errors.push(DeleteErrorItem {
                    key: item.key,
                    version_id: item.version_id,
                    code: error_code(&err),
                    message: err.to_string(),
                }),
            }
        }

        info!(
            bucket,
            deleted = outcome.deleted.len(),
            errors = outcome.errors.len(),
            "delete_objects completed"
        );
        Ok(outcome)
    }

    /// Copy the current (or a specific) version of `src_key` to `dst_key`,
    /// possibly across buckets.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::Cancelled`].
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        src_version_id: Option<&str>,
        dst_bucket: &str,
        dst_key: &str,
        content_type_override: Option<String>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<PutOutcome> {
        check_cancel(cancel)?;
        validate_object_key(dst_key)?;
        let src_handle = self.registry.get_handle(src_bucket)?;
        let dst_handle = self.registry.get_handle(dst_bucket)?;
        let outcome = versioning::copy_object(
            &src_handle,
            &dst_handle,
            &self.persistence,
            src_key,
            src_version_id,
            dst_key,
            content_type_override,
        )?;
        info!(
            src_bucket, src_key, dst_bucket, dst_key,
            version_id = %outcome.version_id,
            "copy_object completed"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------

    /// List the current view of a bucket's keys.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::Cancelled`].
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ListObjectsPage> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let page = query::list_objects(&handle, prefix, delimiter, marker, max_keys);
        debug!(bucket, returned = page.objects.len(), "list_objects completed");
        Ok(page)
    }

    /// List every entry (data versions and delete markers) across a bucket's keys.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::Cancelled`].
    pub async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
        max_keys: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<ListVersionsPage> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let page = query::list_object_versions(
            &handle,
            prefix,
            delimiter,
            key_marker,
            version_id_marker,
            max_keys,
        );
        debug!(bucket, returned = page.versions.len(), "list_object_versions completed");
        Ok(page)
    }

    // -----------------------------------------------------------------
    // Retention / legal hold
    // -----------------------------------------------------------------

    /// Apply (or clear) retention on one data version.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::InvalidRetention`],
    /// [`EngineError::InvalidArgument`] (target is a delete marker),
    /// [`EngineError::Cancelled`].
    pub async fn put_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        retention: Option<Retention>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let history = handle
            .index()
            .get(key)
            .ok_or_else(|| EngineError::NoSuchKey { key: key.to_owned() })?;
        let resolved_version_id = resolve_target_version_id(&history, key, version_id)?;

        let lock_state = history.mutate(|entries| -> EngineResult<_> {
            let entry = entries
                .iter_mut()
                .find(|e| e.version_id() == resolved_version_id)
                .expect("resolved version id exists in this history");
            let data = entry.as_data_mut().ok_or_else(|| EngineError::InvalidArgument {
                message: "delete markers have no retention state".to_owned(),
            })?;
            lock::set_retention(data, retention.clone())?;
            Ok(data.lock_state.clone())
        })?;

        self.persistence
            .update_lock_state(bucket, key, &resolved_version_id, &lock_state)?;
        debug!(bucket, key, version_id = %resolved_version_id, "put_object_retention completed");
        Ok(())
    }

    /// Fetch one data version's retention, if any.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::Cancelled`].
    pub async fn get_object_retention(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<Option<Retention>> {
        check_cancel(cancel)?;
        let data = self.locate_data_version(bucket, key, version_id)?;
        Ok(data.lock_state.retention)
    }

    /// Toggle legal hold on one data version.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::InvalidArgument`] (target
    /// is a delete marker), [`EngineError::Cancelled`].
    pub async fn put_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        hold: bool,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<()> {
        check_cancel(cancel)?;
        let handle = self.registry.get_handle(bucket)?;
        let history = handle
            .index()
            .get(key)
            .ok_or_else(|| EngineError::NoSuchKey { key: key.to_owned() })?;
        let resolved_version_id = resolve_target_version_id(&history, key, version_id)?;

        let lock_state = history.mutate(|entries| -> EngineResult<_> {
            let entry = entries
                .iter_mut()
                .find(|e| e.version_id() == resolved_version_id)
                .expect("resolved version id exists in this history");
            let data = entry.as_data_mut().ok_or_else(|| EngineError::InvalidArgument {
                message: "delete markers have no legal hold state".to_owned(),
            })?;
            lock::set_legal_hold(data, hold);
            Ok(data.lock_state.clone())
        })?;

        self.persistence
            .update_lock_state(bucket, key, &resolved_version_id, &lock_state)?;
        debug!(bucket, key, version_id = %resolved_version_id, hold, "put_object_legal_hold completed");
        Ok(())
    }

    /// Fetch one data version's legal hold flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::NoSuchBucket`], [`EngineError::NoSuchKey`],
    /// [`EngineError::NoSuchVersion`], [`EngineError::Cancelled`].
    pub async fn get_object_legal_hold(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> EngineResult<bool> {
        check_cancel(cancel)?;
        let data = self.locate_data_version(bucket, key, version_id)?;
        Ok(data.lock_state.legal_hold)
    }

    fn locate_data_version(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> EngineResult<DataVersion> {
        let handle = self.registry.get_handle(bucket)?;
        let history = handle
            .index()
            .get(key)
            .ok_or_else(|| EngineError::NoSuchKey { key: key.to_owned() })?;
        let resolved_version_id = resolve_target_version_id(&history, key, version_id)?;
        let entry = history
            .find(&resolved_version_id)
            .expect("resolved version id exists in this history");
        entry.as_data().cloned().ok_or_else(|| EngineError::InvalidArgument {
            message: "delete markers have no lock state".to_owned(),
        })
    }
}

/// Resolve an optional `version_id` against a key's history: the explicit
/// version if given, otherwise the current (latest) entry. Missing target
/// fails `NoSuchKey`/`NoSuchVersion`, per §4.G.
fn resolve_target_version_id(
    history: &crate::index::KeyHistory,
    key: &str,
    version_id: Option<&str>,
) -> EngineResult<String> {
    match version_id {
        Some(vid) => {
            if history.find(vid).is_some() {
                Ok(vid.to_owned())
            } else {
                Err(EngineError::NoSuchVersion {
                    key: key.to_owned(),
                    version_id: vid.to_owned(),
                })
            }
        }
        None => history
            .current()
            .map(|e| e.version_id().to_owned())
            .ok_or_else(|| EngineError::NoSuchKey { key: key.to_owned() }),
    }
}

/// Stable error code for a `DeleteObjects` per-item error record: the
/// variant's name, matching the closed taxonomy in [`crate::error`].
fn error_code(err: &EngineError) -> String {
    match err {
        EngineError::NoSuchBucket { .. } => "NoSuchBucket",
        EngineError::BucketAlreadyExists { .. } => "BucketAlreadyExists",
        EngineError::BucketNotEmpty { .. } => "BucketNotEmpty",
        EngineError::NoSuchKey { .. } => "NoSuchKey",
        EngineError::NoSuchVersion { .. } => "NoSuchVersion",
        EngineError::MethodNotAllowed { .. } => "MethodNotAllowed",
        EngineError::NotModified => "NotModified",
        EngineError::PreconditionFailed => "PreconditionFailed",
        EngineError::AccessDenied { .. } => "AccessDenied",
        EngineError::InvalidTransition { .. } => "InvalidTransition",
        EngineError::InvalidRetention { .. } => "InvalidRetention",
        EngineError::ObjectLockConfigurationNotFound { .. } => "ObjectLockConfigurationNotFound",
        EngineError::InvalidBucketName { .. } => "InvalidBucketName",
        EngineError::KeyTooLong => "KeyTooLong",
        EngineError::InvalidRange => "InvalidRange",
        EngineError::InvalidArgument { .. } => "InvalidArgument",
        EngineError::Cancelled => "Cancelled",
        EngineError::Internal(_) => "Internal",
    }
    .to_owned()
}
