//! Persistence Adapter: durable bucket/entry metadata plus a content-addressed
//! blob store on disk.
//!
//! Grounded on the corpus's `rusqlite`-backed metadata store (bucket/object
//! rows in a SQL database) combined with the corpus's content-addressed blob
//! pattern (bodies hashed and written under a data directory). A single
//! SQLite transaction covers the metadata row and its companion blob
//! reference, giving the indivisible commit the engine's atomicity
//! requirement calls for. Blobs are written to a temp file and renamed into
//! place before the transaction referencing them commits, and are only
//! unlinked once no entry row references their hash, so a crash at any point
//! never leaves an orphaned blob or an entry without one.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{EngineError, EngineResult};
use crate::model::{
    BucketMeta, DataVersion, DeleteMarker, Entry, LockState, ObjectMetadata, VersioningState,
};

/// Durable store backing the engine: one SQLite database file plus a
/// content-addressed blob directory, both under the configured data
/// directory.
#[derive(Debug)]
pub struct Persistence {
    conn: Mutex<Connection>,
    blob_dir: PathBuf,
}

impl Persistence {
    /// Open (creating if absent) the durable store rooted at `data_dir`.
    pub fn open(data_dir: &str) -> EngineResult<Self> {
        let root = PathBuf::from(data_dir);
        fs::create_dir_all(&root)?;
        let blob_dir = root.join("blobs");
        fs::create_dir_all(&blob_dir)?;

        let conn = Connection::open(root.join("s3lite.sqlite3"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS buckets (
                 name TEXT PRIMARY KEY,
                 versioning_state TEXT NOT NULL,
                 mfa_delete_enabled INTEGER NOT NULL,
                 object_lock_config TEXT,
                 creation_time TEXT NOT NULL,
                 region TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS entries (
                 bucket TEXT NOT NULL,
                 key TEXT NOT NULL,
                 version_id TEXT NOT NULL,
                 seq INTEGER NOT NULL,
                 kind TEXT NOT NULL,
                 etag TEXT,
                 size INTEGER,
                 content_type TEXT,
                 user_metadata TEXT,
                 lock_state TEXT,
                 last_modified TEXT NOT NULL,
                 blob_hash TEXT,
                 PRIMARY KEY (bucket, key, version_id)
             );
             CREATE INDEX IF NOT EXISTS idx_entries_bucket_key_seq
                 ON entries (bucket, key, seq);
             CREATE TABLE IF NOT EXISTS seq_counters (
                 bucket TEXT PRIMARY KEY,
                 next_seq INTEGER NOT NULL
             );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            blob_dir,
        })
    }

    /// Open an ephemeral store for tests: a temp directory that is not
    /// cleaned up automatically (tests own their own `tempfile::TempDir`).
    #[cfg(test)]
    pub fn open_for_test(dir: &Path) -> EngineResult<Self> {
        Self::open(dir.to_str().expect("test path is valid utf-8"))
    }

    // -----------------------------------------------------------------
    // Buckets
    // -----------------------------------------------------------------

    /// Insert a brand-new bucket row. Fails with a unique-constraint error
    /// mapped to [`EngineError::Internal`] by the caller's existence check
    /// (the registry checks existence before calling this).
    pub fn put_bucket(&self, meta: &BucketMeta) -> EngineResult<()> {
        let conn = self.conn.lock();
        let lock_json = meta
            .object_lock_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT INTO buckets (name, versioning_state, mfa_delete_enabled, object_lock_config, creation_time, region)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meta.name,
                meta.versioning_state.as_str(),
                meta.mfa_delete_enabled,
                lock_json,
                meta.creation_time.to_rfc3339(),
                meta.region,
            ],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO seq_counters (bucket, next_seq) VALUES (?1, 0)",
            params![meta.name],
        )?;
        Ok(())
    }

    /// Overwrite an existing bucket's mutable metadata fields.
    pub fn put_bucket_meta(&self, meta: &BucketMeta) -> EngineResult<()> {
        let conn = self.conn.lock();
        let lock_json = meta
            .object_lock_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        conn.execute(
            "UPDATE buckets SET versioning_state = ?1, mfa_delete_enabled = ?2, object_lock_config = ?3
             WHERE name = ?4",
            params![
                meta.versioning_state.as_str(),
                meta.mfa_delete_enabled,
                lock_json,
                meta.name,
            ],
        )?;
        Ok(())
    }

    /// Fetch a single bucket's metadata.
    pub fn get_bucket_meta(&self, name: &str) -> EngineResult<Option<BucketMeta>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT name, versioning_state, mfa_delete_enabled, object_lock_config, creation_time, region
             FROM buckets WHERE name = ?1",
            params![name],
            Self::row_to_bucket_meta,
        )
        .optional()
        .map_err(EngineError::from)
    }

    /// List all buckets, sorted by name.
    pub fn list_buckets(&self) -> EngineResult<Vec<BucketMeta>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, versioning_state, mfa_delete_enabled, object_lock_config, creation_time, region
             FROM buckets ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_bucket_meta)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove a bucket row. Caller is responsible for verifying emptiness.
    pub fn delete_bucket(&self, name: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
        conn.execute("DELETE FROM seq_counters WHERE bucket = ?1", params![name])?;
        Ok(())
    }

    fn row_to_bucket_meta(row: &rusqlite::Row<'_>) -> rusqlite::Result<BucketMeta> {
        let state_str: String = row.get(1)?;
        let versioning_state = match state_str.as_str() {
            "Enabled" => VersioningState::Enabled,
            "Suspended" => VersioningState::Suspended,
            _ => VersioningState::Unversioned,
        };
        let lock_json: Option<String> = row.get(3)?;
        let object_lock_config = lock_json.and_then(|s| serde_json::from_str(&s).ok());
        let creation_str: String = row.get(4)?;
        let creation_time = DateTime::parse_from_rfc3339(&creation_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap());
        Ok(BucketMeta {
            name: row.get(0)?,
            versioning_state,
            mfa_delete_enabled: row.get(2)?,
            object_lock_config,
            creation_time,
            region: row.get(5)?,
        })
    }

    // -----------------------------------------------------------------
    // Sequence counters
    // -----------------------------------------------------------------

    /// Allocate the next monotonic sequence number for `bucket`.
    pub fn next_seq(&self, bucket: &str) -> EngineResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE seq_counters SET next_seq = next_seq + 1 WHERE bucket = ?1",
            params![bucket],
        )?;
        let seq: i64 = conn.query_row(
            "SELECT next_seq FROM seq_counters WHERE bucket = ?1",
            params![bucket],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    // -----------------------------------------------------------------
    // Entries + blobs
    // -----------------------------------------------------------------

    /// Durably write a blob's bytes, content-addressed by its hash, and
    /// return the hash. A no-op (besides the rename) if the blob already
    /// exists under that hash, since identical content shares storage.
    pub fn write_blob(&self, hash: &str, data: &[u8]) -> EngineResult<()> {
        let path = self.blob_path(hash);
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.blob_dir)?;
        use std::io::Write;
        tmp.write_all(data)?;
        tmp.persist(&path)
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Read a blob's full bytes by hash.
    pub fn read_blob(&self, hash: &str) -> EngineResult<Vec<u8>> {
        Ok(fs::read(self.blob_path(hash))?)
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        let (prefix, rest) = hash.split_at(2.min(hash.len()));
        self.blob_dir.join(prefix).join(rest)
    }

    /// Insert or replace an entry row, writing its blob first (if a
    /// [`Entry::Data`] with a body). The sequence number is allocated by the
    /// caller via [`Self::next_seq`] so it can be recorded on the in-memory
    /// cache entry too.
    pub fn put_entry(
        &self,
        bucket: &str,
        entry: &Entry,
        seq: i64,
        body: Option<&[u8]>,
    ) -> EngineResult<()> {
        if let (Entry::Data(data), Some(bytes)) = (entry, body) {
            self.write_blob(&data.etag, bytes)?;
        }
        let conn = self.conn.lock();
        Self::insert_entry_row(&conn, bucket, entry, seq)
    }

    /// Atomically replace one entry with another: old row deleted and new
    /// row inserted in a single transaction, so a crash never leaves both a
    /// `"null"` slot's old and new rows visible at once. Blob sweep of the
    /// old entry's body happens after commit, best-effort.
    pub fn replace_entry(
        &self,
        bucket: &str,
        old_version_id: Option<&str>,
        new_entry: &Entry,
        seq: i64,
        body: Option<&[u8]>,
    ) -> EngineResult<()> {
        if let (Entry::Data(data), Some(bytes)) = (new_entry, body) {
            self.write_blob(&data.etag, bytes)?;
        }

        let mut conn = self.conn.lock();
        let old_blob_hash = if let Some(old_version_id) = old_version_id {
            let hash: Option<String> = conn
                .query_row(
                    "SELECT blob_hash FROM entries WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
                    params![bucket, new_entry.key(), old_version_id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            hash
        } else {
            None
        };

        let tx = conn.transaction()?;
        if let Some(old_version_id) = old_version_id {
            tx.execute(
                "DELETE FROM entries WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
                params![bucket, new_entry.key(), old_version_id],
            )?;
        }
        Self::insert_entry_row(&tx, bucket, new_entry, seq)?;
        tx.commit()?;
        drop(conn);

        if let Some(hash) = old_blob_hash {
            self.sweep_blob_if_unreferenced(&hash)?;
        }
        Ok(())
    }

    /// Update just the `lock_state` column of an existing data-version row,
    /// leaving its sequence number, blob reference, and every other column
    /// untouched. Used by retention/legal-hold changes, which mutate an
    /// existing version in place rather than writing a new one.
    pub fn update_lock_state(
        &self,
        bucket: &str,
        key: &str,
        version_id: &str,
        lock_state: &LockState,
    ) -> EngineResult<()> {
        let lock_json =
            serde_json::to_string(lock_state).map_err(|e| EngineError::Internal(e.to_string()))?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE entries SET lock_state = ?1 WHERE bucket = ?2 AND key = ?3 AND version_id = ?4",
            params![lock_json, bucket, key, version_id],
        )?;
        Ok(())
    }

    fn insert_entry_row(conn: &Connection, bucket: &str, entry: &Entry, seq: i64) -> EngineResult<()> {
        match entry {
            Entry::Data(d) => {
                let metadata_json = serde_json::to_string(&d.metadata)
                    .map_err(|e| EngineError::Internal(e.to_string()))?;
                let lock_json = serde_json::to_string(&d.lock_state)
                    .map_err(|e| EngineError::Internal(e.to_string()))?;
                conn.execute(
                    "INSERT OR REPLACE INTO entries
                     (bucket, key, version_id, seq, kind, etag, size, content_type, user_metadata, lock_state, last_modified, blob_hash)
                     VALUES (?1, ?2, ?3, ?4, 'data', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        bucket,
                        d.key,
                        d.version_id,
                        seq,
                        d.etag,
                        i64::try_from(d.size).unwrap_or(i64::MAX),
                        d.metadata.content_type,
                        metadata_json,
                        lock_json,
                        d.last_modified.to_rfc3339(),
                        d.etag,
                    ],
                )?;
            }
            Entry::Marker(m) => {
                conn.execute(
                    "INSERT OR REPLACE INTO entries
                     (bucket, key, version_id, seq, kind, etag, size, content_type, user_metadata, lock_state, last_modified, blob_hash)
                     VALUES (?1, ?2, ?3, ?4, 'marker', NULL, NULL, NULL, NULL, NULL, ?5, NULL)",
                    params![bucket, m.key, m.version_id, seq, m.last_modified.to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }

    fn sweep_blob_if_unreferenced(&self, hash: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        let still_referenced: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE blob_hash = ?1",
            params![hash],
            |row| row.get(0),
        )?;
        drop(conn);
        if still_referenced == 0 {
            let _ = fs::remove_file(self.blob_path(hash));
            tracing::trace!(hash, "swept unreferenced blob");
        }
        Ok(())
    }

    /// Remove one entry row, then sweep its blob if no other entry
    /// references the same hash.
    pub fn delete_entry(&self, bucket: &str, key: &str, version_id: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        let blob_hash: Option<String> = conn
            .query_row(
                "SELECT blob_hash FROM entries WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
                params![bucket, key, version_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        conn.execute(
            "DELETE FROM entries WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
            params![bucket, key, version_id],
        )?;
        drop(conn);

        if let Some(hash) = blob_hash {
            self.sweep_blob_if_unreferenced(&hash)?;
        }
        Ok(())
    }

    /// Fetch all entries for a key, ordered `(seq asc)`.
    pub fn get_entries(&self, bucket: &str, key: &str) -> EngineResult<Vec<Entry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, version_id, etag, size, content_type, user_metadata, lock_state, last_modified
             FROM entries WHERE bucket = ?1 AND key = ?2 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![bucket, key], |row| Self::row_to_entry(key, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fetch every key and its ordered entry list for a bucket, in key
    /// lexicographic order. Used to rebuild the in-memory index on open.
    pub fn load_all_entries(&self, bucket: &str) -> EngineResult<Vec<(String, Vec<Entry>)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, kind, version_id, etag, size, content_type, user_metadata, lock_state, last_modified
             FROM entries WHERE bucket = ?1 ORDER BY key ASC, seq ASC",
        )?;
        let mut grouped: Vec<(String, Vec<Entry>)> = Vec::new();
        let mut rows = stmt.query(params![bucket])?;
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let entry = Self::row_to_entry_from_offset(&key, row, 1)?;
            match grouped.last_mut() {
                Some((k, entries)) if *k == key => entries.push(entry),
                _ => grouped.push((key, vec![entry])),
            }
        }
        Ok(grouped)
    }

    fn row_to_entry(key: &str, row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
        Self::row_to_entry_from_offset(key, row, 0)
    }

    fn row_to_entry_from_offset(
        key: &str,
        row: &rusqlite::Row<'_>,
        off: usize,
    ) -> rusqlite::Result<Entry> {
        let kind: String = row.get(off)?;
        let version_id: String = row.get(off + 1)?;
        let last_modified_str: String = row.get(off + 7)?;
        let last_modified = DateTime::parse_from_rfc3339(&last_modified_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap());

        if kind == "marker" {
            return Ok(Entry::Marker(DeleteMarker {
                key: key.to_owned(),
                version_id,
                last_modified,
            }));
        }

        let etag: String = row.get(off + 2)?;
        let size: i64 = row.get(off + 3)?;
        let metadata_json: String = row.get(off + 5)?;
        let lock_json: String = row.get(off + 6)?;
        let metadata: ObjectMetadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        let lock_state: LockState = serde_json::from_str(&lock_json).unwrap_or_default();

        Ok(Entry::Data(Box::new(DataVersion {
            key: key.to_owned(),
            version_id,
            etag,
            size: u64::try_from(size).unwrap_or_default(),
            last_modified,
            metadata,
            lock_state,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, Persistence) {
        let dir = tempdir().expect("test tempdir");
        let store = Persistence::open_for_test(dir.path()).expect("test open");
        (dir, store)
    }

    #[test]
    fn test_should_roundtrip_bucket_metadata() {
        let (_dir, store) = open_store();
        let meta = BucketMeta::new("b", "us-east-1", Utc::now());
        store.put_bucket(&meta).expect("test put_bucket");
        let fetched = store
            .get_bucket_meta("b")
            .expect("test get")
            .expect("bucket present");
        assert_eq!(fetched.name, "b");
        assert_eq!(fetched.versioning_state, VersioningState::Unversioned);
    }

    #[test]
    fn test_should_list_buckets_sorted_by_name() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("zebra", "us-east-1", Utc::now()))
            .expect("test put");
        store
            .put_bucket(&BucketMeta::new("apple", "us-east-1", Utc::now()))
            .expect("test put");
        let names: Vec<String> = store
            .list_buckets()
            .expect("test list")
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["apple".to_owned(), "zebra".to_owned()]);
    }

    #[test]
    fn test_should_delete_bucket_row() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        store.delete_bucket("b").expect("test delete");
        assert!(store.get_bucket_meta("b").expect("test get").is_none());
    }

    #[test]
    fn test_should_allocate_monotonic_sequence_numbers() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let s1 = store.next_seq("b").expect("test seq");
        let s2 = store.next_seq("b").expect("test seq");
        assert!(s2 > s1);
    }

    #[test]
    fn test_should_roundtrip_data_entry_with_blob() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let entry = Entry::Data(Box::new(DataVersion {
            key: "f".to_owned(),
            version_id: "null".to_owned(),
            etag: "abc123".to_owned(),
            size: 5,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }));
        store
            .put_entry("b", &entry, 1, Some(b"hello"))
            .expect("test put_entry");
        let fetched = store.get_entries("b", "f").expect("test get_entries");
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].version_id(), "null");
        let body = store.read_blob("abc123").expect("test read_blob");
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_should_sweep_blob_when_last_reference_deleted() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let entry = Entry::Data(Box::new(DataVersion {
            key: "f".to_owned(),
            version_id: "v1".to_owned(),
            etag: "hash1".to_owned(),
            size: 3,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }));
        store
            .put_entry("b", &entry, 1, Some(b"abc"))
            .expect("test put_entry");
        store.delete_entry("b", "f", "v1").expect("test delete");
        assert!(store.read_blob("hash1").is_err());
    }

    #[test]
    fn test_should_replace_entry_atomically_and_sweep_old_blob() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let old = Entry::Data(Box::new(DataVersion {
            key: "f".to_owned(),
            version_id: "null".to_owned(),
            etag: "old-hash".to_owned(),
            size: 1,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }));
        store.put_entry("b", &old, 1, Some(b"a")).expect("test put_entry");

        let new = Entry::Data(Box::new(DataVersion {
            key: "f".to_owned(),
            version_id: "null".to_owned(),
            etag: "new-hash".to_owned(),
            size: 1,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }));
        store
            .replace_entry("b", Some("null"), &new, 2, Some(b"b"))
            .expect("test replace_entry");

        let entries = store.get_entries("b", "f").expect("test get_entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_data().unwrap().etag, "new-hash");
        assert!(store.read_blob("old-hash").is_err());
        assert_eq!(store.read_blob("new-hash").expect("test read_blob"), b"b");
    }

    #[test]
    fn test_should_keep_blob_while_another_entry_references_it() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let make = |key: &str, version_id: &str| {
            Entry::Data(Box::new(DataVersion {
                key: key.to_owned(),
                version_id: version_id.to_owned(),
                etag: "shared".to_owned(),
                size: 3,
                last_modified: Utc::now(),
                metadata: ObjectMetadata::default(),
                lock_state: LockState::default(),
            }))
        };
        store
            .put_entry("b", &make("f1", "v1"), 1, Some(b"abc"))
            .expect("test put_entry");
        store
            .put_entry("b", &make("f2", "v1"), 2, None)
            .expect("test put_entry");
        store.delete_entry("b", "f1", "v1").expect("test delete");
        assert_eq!(store.read_blob("shared").expect("test read_blob"), b"abc");
    }

    #[test]
    fn test_should_load_all_entries_grouped_by_key() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let mk = |key: &str, vid: &str, seq: i64| {
            let entry = Entry::Data(Box::new(DataVersion {
                key: key.to_owned(),
                version_id: vid.to_owned(),
                etag: format!("e{seq}"),
                size: 1,
                last_modified: Utc::now(),
                metadata: ObjectMetadata::default(),
                lock_state: LockState::default(),
            }));
            store.put_entry("b", &entry, seq, Some(b"x")).expect("test put_entry");
        };
        mk("a", "v1", 1);
        mk("a", "v2", 2);
        mk("b-key", "v1", 3);
        let grouped = store.load_all_entries("b").expect("test load_all");
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "a");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "b-key");
    }

    #[test]
    fn test_should_update_lock_state_without_touching_blob_or_seq() {
        let (_dir, store) = open_store();
        store
            .put_bucket(&BucketMeta::new("b", "us-east-1", Utc::now()))
            .expect("test put");
        let entry = Entry::Data(Box::new(DataVersion {
            key: "f".to_owned(),
            version_id: "v1".to_owned(),
            etag: "hash1".to_owned(),
            size: 3,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }));
        store
            .put_entry("b", &entry, 7, Some(b"abc"))
            .expect("test put_entry");

        let held = LockState {
            retention: None,
            legal_hold: true,
        };
        store
            .update_lock_state("b", "f", "v1", &held)
            .expect("test update_lock_state");

        let entries = store.get_entries("b", "f").expect("test get_entries");
        let data = entries[0].as_data().expect("data version");
        assert!(data.lock_state.legal_hold);
        assert_eq!(data.etag, "hash1");
        assert_eq!(store.read_blob("hash1").expect("test read_blob"), b"abc");
    }
}
