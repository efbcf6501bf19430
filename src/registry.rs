//! Bucket Registry: bucket lifecycle and versioning/lock-configuration state.
//!
//! Grounded on the corpus's top-level service state (global `DashMap` of
//! buckets guarded by existence/emptiness checks before mutation), simplified
//! since the engine has a single trusted caller and so drops the corpus's
//! cross-account bucket-ownership uniqueness tracking.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::index::KeyIndex;
use crate::model::{BucketMeta, ObjectLockConfiguration, VersioningState};
use crate::persistence::Persistence;

/// One bucket's live state: durable metadata plus its in-memory object index.
#[derive(Debug)]
pub struct BucketHandle {
    meta: parking_lot::RwLock<BucketMeta>,
    index: KeyIndex,
}

impl BucketHandle {
    fn new(meta: BucketMeta, index: KeyIndex) -> Self {
        Self {
            meta: parking_lot::RwLock::new(meta),
            index,
        }
    }

    /// Snapshot the bucket's current metadata.
    #[must_use]
    pub fn meta(&self) -> BucketMeta {
        self.meta.read().clone()
    }

    /// The bucket's object index.
    #[must_use]
    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    fn set_meta(&self, meta: BucketMeta) {
        *self.meta.write() = meta;
    }
}

/// Registry of all buckets known to the engine.
#[derive(Debug)]
pub struct Registry {
    buckets: DashMap<String, Arc<BucketHandle>>,
    persistence: Arc<Persistence>,
}

impl Registry {
    /// Rebuild the registry from durable storage.
    pub fn load(persistence: Arc<Persistence>) -> EngineResult<Self> {
        let registry = Self {
            buckets: DashMap::new(),
            persistence,
        };
        for meta in registry.persistence.list_buckets()? {
            let grouped = registry.persistence.load_all_entries(&meta.name)?;
            let index = KeyIndex::from_loaded(grouped);
            registry
                .buckets
                .insert(meta.name.clone(), Arc::new(BucketHandle::new(meta, index)));
        }
        debug!(bucket_count = registry.buckets.len(), "registry loaded");
        Ok(registry)
    }

    /// Create a new, empty bucket.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BucketAlreadyExists`] if the name is taken.
    pub fn create_bucket(&self, name: &str, region: &str) -> EngineResult<BucketMeta> {
        if self.buckets.contains_key(name) {
            return Err(EngineError::BucketAlreadyExists {
                name: name.to_owned(),
            });
        }
        let meta = BucketMeta::new(name, region, Utc::now());
        self.persistence.put_bucket(&meta)?;
        self.buckets.insert(
            name.to_owned(),
            Arc::new(BucketHandle::new(meta.clone(), KeyIndex::new())),
        );
        info!(bucket = %name, "bucket created");
        Ok(meta)
    }

    /// Delete a bucket. The caller must already have verified it's empty.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoSuchBucket`] if the bucket does not exist.
    /// - [`EngineError::BucketNotEmpty`] if the bucket still has entries.
    pub fn delete_bucket(&self, name: &str) -> EngineResult<()> {
        let handle = self.get_handle(name)?;
        if !handle.index().is_empty() {
            return Err(EngineError::BucketNotEmpty {
                name: name.to_owned(),
            });
        }
        self.persistence.delete_bucket(name)?;
        self.buckets.remove(name);
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// Fetch a bucket's handle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoSuchBucket`] if the bucket does not exist.
    pub fn get_handle(&self, name: &str) -> EngineResult<Arc<BucketHandle>> {
        self.buckets
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| EngineError::NoSuchBucket {
                name: name.to_owned(),
            })
    }

    /// Borrow a bucket handle without cloning the `Arc`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoSuchBucket`] if the bucket does not exist.
    pub fn peek(&self, name: &str) -> EngineResult<Ref<'_, String, Arc<BucketHandle>>> {
        self.buckets
            .get(name)
            .ok_or_else(|| EngineError::NoSuchBucket {
                name: name.to_owned(),
            })
    }

    /// Whether a bucket exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// List all buckets sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<BucketMeta> {
        let mut metas: Vec<BucketMeta> = self.buckets.iter().map(|r| r.meta()).collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        metas
    }

    /// Transition a bucket's versioning state, optionally updating its
    /// MFA-Delete flag in the same call.
    ///
    /// Once a bucket leaves `Unversioned` it can never return: only a bucket
    /// already `Unversioned` may target `Unversioned`. Every other forward or
    /// lateral transition (`Unversioned -> Enabled`, `Enabled <-> Suspended`)
    /// is permitted. MFA-Delete persists independently of the versioning
    /// state transition; passing `None` leaves it unchanged.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoSuchBucket`] if the bucket does not exist.
    /// - [`EngineError::InvalidTransition`] if the target is `Unversioned` and
    ///   the bucket is not already `Unversioned`.
    pub fn set_versioning(
        &self,
        name: &str,
        target: VersioningState,
        mfa_delete: Option<bool>,
    ) -> EngineResult<()> {
        let handle = self.get_handle(name)?;
        let mut meta = handle.meta();
        if target == VersioningState::Unversioned
            && meta.versioning_state != VersioningState::Unversioned
        {
            return Err(EngineError::InvalidTransition {
                from: meta.versioning_state.as_str().to_owned(),
                to: target.as_str().to_owned(),
            });
        }
        meta.versioning_state = target;
        if let Some(mfa) = mfa_delete {
            meta.mfa_delete_enabled = mfa;
        }
        self.persistence.put_bucket_meta(&meta)?;
        handle.set_meta(meta);
        info!(bucket = %name, state = target.as_str(), "versioning state changed");
        Ok(())
    }

    /// Set (or replace) a bucket's Object Lock configuration.
    ///
    /// Unlike the corpus's handler, this never auto-enables versioning as a
    /// side effect: Object Lock configuration is only meaningful on a bucket
    /// already in the `Enabled` versioning state, so the caller must put the
    /// bucket there first.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoSuchBucket`] if the bucket does not exist.
    /// - [`EngineError::InvalidArgument`] if the bucket's versioning state is
    ///   not `Enabled`.
    pub fn set_object_lock_config(
        &self,
        name: &str,
        config: ObjectLockConfiguration,
    ) -> EngineResult<()> {
        let handle = self.get_handle(name)?;
        let mut meta = handle.meta();
        if meta.versioning_state != VersioningState::Enabled {
            return Err(EngineError::InvalidArgument {
                message: "Object Lock configuration requires versioning to be Enabled".to_owned(),
            });
        }
        meta.object_lock_config = Some(config);
        self.persistence.put_bucket_meta(&meta)?;
        handle.set_meta(meta);
        Ok(())
    }

    /// Fetch a bucket's Object Lock configuration.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoSuchBucket`] if the bucket does not exist.
    /// - [`EngineError::ObjectLockConfigurationNotFound`] if one was never set.
    pub fn get_object_lock_config(&self, name: &str) -> EngineResult<ObjectLockConfiguration> {
        let handle = self.get_handle(name)?;
        handle
            .meta()
            .object_lock_config
            .ok_or_else(|| EngineError::ObjectLockConfigurationNotFound {
                name: name.to_owned(),
            })
    }
}
