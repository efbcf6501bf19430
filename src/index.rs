//! In-memory per-bucket key index.
//!
//! Mirrors the corpus's key-store cache shape (a concurrent map from key to
//! its ordered version list) but unified across all three versioning states:
//! every state keeps the same `Vec<Entry>` per key, ordered oldest-to-newest,
//! since Unversioned/Suspended buckets simply never grow that vector past
//! one live entry. The durable store is the source of truth; this index is
//! rebuilt from it on open and kept in lockstep by the versioning controller
//! on every write.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::Entry;

/// Ordered version history for one object key, newest entry last.
#[derive(Debug, Default)]
pub struct KeyHistory {
    entries: RwLock<Vec<Entry>>,
}

impl KeyHistory {
    fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// The current (most recently written) entry, if any.
    #[must_use]
    pub fn current(&self) -> Option<Entry> {
        self.entries.read().last().cloned()
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<Entry> {
        self.entries.read().clone()
    }

    /// Look up one version by id.
    #[must_use]
    pub fn find(&self, version_id: &str) -> Option<Entry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.version_id() == version_id)
            .cloned()
    }

    /// Append a newly written entry.
    pub fn push(&self, entry: Entry) {
        self.entries.write().push(entry);
    }

    /// Run a read-modify-write step under the key's single write lock.
    ///
    /// This is the per-(bucket, key) serialization point: every versioning
    /// or lock-state mutation runs its whole decide-then-commit step inside
    /// one `mutate` call so concurrent writers on the same key never
    /// interleave.
    pub fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Vec<Entry>) -> R,
    {
        let mut guard = self.entries.write();
        f(&mut guard)
    }

    /// Replace the entire history, e.g. after a version is permanently deleted.
    pub fn set_all(&self, entries: Vec<Entry>) {
        *self.entries.write() = entries;
    }

    /// Remove one version by id. Returns `true` if a version was removed.
    pub fn remove(&self, version_id: &str) -> bool {
        let mut guard = self.entries.write();
        let before = guard.len();
        guard.retain(|e| e.version_id() != version_id);
        guard.len() != before
    }

    /// Whether this key has no remaining versions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Concurrent per-bucket object index: key -> ordered version history.
#[derive(Debug, Default)]
pub struct KeyIndex {
    keys: DashMap<String, Arc<KeyHistory>>,
}

impl KeyIndex {
    /// An empty index, for a freshly created bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from the durable store's grouped entry lists.
    #[must_use]
    pub fn from_loaded(grouped: Vec<(String, Vec<Entry>)>) -> Self {
        let keys = DashMap::new();
        for (key, entries) in grouped {
            keys.insert(key, Arc::new(KeyHistory::new(entries)));
        }
        Self { keys }
    }

    /// Fetch (creating if absent) the history for a key.
    pub fn history(&self, key: &str) -> Arc<KeyHistory> {
        self.keys
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(KeyHistory::new(Vec::new())))
            .clone()
    }

    /// Fetch a key's history only if it already exists.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<KeyHistory>> {
        self.keys.get(key).map(|r| r.clone())
    }

    /// Drop a key entirely from the index (all versions gone).
    pub fn remove_key(&self, key: &str) {
        self.keys.remove(key);
    }

    /// All keys currently tracked, lexicographically sorted.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keys.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Whether the index holds no live version history (bucket is empty).
    ///
    /// Checks actual entry content rather than key count: `history()` lazily
    /// creates an empty history on first access, and a key can be drained to
    /// zero entries without being dropped from the map, so key presence alone
    /// would overcount.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.iter().all(|r| r.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataVersion, DeleteMarker, LockState, ObjectMetadata};
    use chrono::Utc;

    fn data_entry(key: &str, version_id: &str) -> Entry {
        Entry::Data(Box::new(DataVersion {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
            etag: "e".to_owned(),
            size: 1,
            last_modified: Utc::now(),
            metadata: ObjectMetadata::default(),
            lock_state: LockState::default(),
        }))
    }

    #[test]
    fn test_should_create_key_on_first_access() {
        let index = KeyIndex::new();
        let history = index.history("f");
        assert!(history.is_empty());
        assert_eq!(index.sorted_keys(), vec!["f".to_owned()]);
    }

    #[test]
    fn test_should_track_current_as_latest_pushed_entry() {
        let index = KeyIndex::new();
        let history = index.history("f");
        history.push(data_entry("f", "v1"));
        history.push(data_entry("f", "v2"));
        assert_eq!(history.current().unwrap().version_id(), "v2");
    }

    #[test]
    fn test_should_find_specific_version() {
        let index = KeyIndex::new();
        let history = index.history("f");
        history.push(data_entry("f", "v1"));
        history.push(data_entry("f", "v2"));
        assert!(history.find("v1").is_some());
        assert!(history.find("missing").is_none());
    }

    #[test]
    fn test_should_remove_version_and_report_change() {
        let index = KeyIndex::new();
        let history = index.history("f");
        history.push(data_entry("f", "v1"));
        assert!(history.remove("v1"));
        assert!(!history.remove("v1"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_should_rebuild_index_from_loaded_entries() {
        let marker = Entry::Marker(DeleteMarker {
            key: "g".to_owned(),
            version_id: "v3".to_owned(),
            last_modified: Utc::now(),
        });
        let grouped = vec![
            ("f".to_owned(), vec![data_entry("f", "v1")]),
            ("g".to_owned(), vec![marker]),
        ];
        let index = KeyIndex::from_loaded(grouped);
        assert_eq!(index.sorted_keys(), vec!["f".to_owned(), "g".to_owned()]);
        assert!(index.get("f").unwrap().current().unwrap().as_data().is_some());
        assert!(index.get("g").unwrap().current().unwrap().is_delete_marker());
    }

    #[test]
    fn test_should_remove_key_entirely() {
        let index = KeyIndex::new();
        index.history("f").push(data_entry("f", "v1"));
        index.remove_key("f");
        assert!(index.get("f").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_should_report_empty_when_keys_are_drained_not_removed() {
        let index = KeyIndex::new();
        let history = index.history("f");
        history.push(data_entry("f", "v1"));
        history.remove("v1");
        assert!(index.get("f").is_some(), "key is still tracked");
        assert!(index.is_empty(), "but holds no live entries");
    }
}
