//! Query Engine: `ListObjects` (current view) and `ListObjectVersions`
//! (full history), with prefix/delimiter grouping and marker-based
//! pagination.
//!
//! Grounded on the corpus's `ops/list.rs`, generalized away from AWS XML
//! DTOs to plain summary structs, and from continuation-token-only
//! pagination to the spec's opaque-key / key+version marker scheme.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::Entry;
use crate::registry::BucketHandle;

/// Default page size when the caller does not request one.
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// One current-view object entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
    /// ETag of the current body.
    pub etag: String,
    /// Body size in bytes.
    pub size: u64,
    /// Creation timestamp of the current version.
    pub last_modified: DateTime<Utc>,
}

/// A page of [`list_objects`] results.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsPage {
    /// Current-view objects in this page, key-ascending.
    pub objects: Vec<ObjectSummary>,
    /// Grouped common prefixes in this page.
    pub common_prefixes: Vec<String>,
    /// Whether more results follow.
    pub is_truncated: bool,
    /// Opaque marker to resume from, if truncated.
    pub next_marker: Option<String>,
}

/// List current-view objects: keys whose latest entry is a data version.
/// Delete-marker-latest keys are hidden.
#[must_use]
pub fn list_objects(
    handle: &BucketHandle,
    prefix: Option<&str>,
    delimiter: Option<&str>,
    marker: Option<&str>,
    max_keys: Option<usize>,
) -> ListObjectsPage {
    let max_keys = max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1);
    let prefix = prefix.unwrap_or("");

    let mut keys = handle.index().sorted_keys();
    keys.retain(|k| k.starts_with(prefix));
    if let Some(marker) = marker {
        keys.retain(|k| k.as_str() > marker);
    }

    let mut objects = Vec::new();
    let mut common_prefixes = Vec::new();
    let mut seen_prefixes = HashSet::new();
    let mut is_truncated = false;
    let mut next_marker = None;
    let mut last_key: Option<String> = None;

    for key in keys {
        if objects.len() + common_prefixes.len() >= max_keys {
            is_truncated = true;
            next_marker = last_key.clone();
            break;
        }

        if let Some(grouped) = common_prefix_of(&key, prefix, delimiter) {
            if seen_prefixes.insert(grouped.clone()) {
                common_prefixes.push(grouped);
            }
            last_key = Some(key);
            continue;
        }

        let Some(history) = handle.index().get(&key) else {
            continue;
        };
        let Some(current) = history.current() else {
            continue;
        };
        if let Some(data) = current.as_data() {
            objects.push(ObjectSummary {
                key: key.clone(),
                etag: data.etag.clone(),
                size: data.size,
                last_modified: data.last_modified,
            });
        }
        last_key = Some(key);
    }

    common_prefixes.sort();
    ListObjectsPage {
        objects,
        common_prefixes,
        is_truncated,
        next_marker,
    }
}

/// One entry in a [`list_object_versions`] page: either a data version or a
/// delete marker, tagged by `is_delete_marker`.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSummary {
    /// Object key.
    pub key: String,
    /// Version id of this entry.
    pub version_id: String,
    /// Whether this is the most recent entry for its key.
    pub is_latest: bool,
    /// Creation timestamp.
    pub last_modified: DateTime<Utc>,
    /// ETag, present only for data versions.
    pub etag: Option<String>,
    /// Size in bytes, present only for data versions.
    pub size: Option<u64>,
    /// Whether this entry is a delete marker.
    pub is_delete_marker: bool,
}

/// A page of [`list_object_versions`] results.
#[derive(Debug, Clone, Default)]
pub struct ListVersionsPage {
    /// Versions in this page, ordered `(key asc, created_at desc)`.
    pub versions: Vec<VersionSummary>,
    /// Grouped common prefixes in this page.
    pub common_prefixes: Vec<String>,
    /// Whether more results follow.
    pub is_truncated: bool,
    /// Key to resume from, if truncated.
    pub next_key_marker: Option<String>,
    /// Version id to resume from (paired with `next_key_marker`).
    pub next_version_id_marker: Option<String>,
}

/// List every entry (data versions and delete markers) across all keys,
/// newest-first per key.
#[must_use]
pub fn list_object_versions(
    handle: &BucketHandle,
    prefix: Option<&str>,
    delimiter: Option<&str>,
    key_marker: Option<&str>,
    version_id_marker: Option<&str>,
    max_keys: Option<usize>,
) -> ListVersionsPage {
    let max_keys = max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1);
    let prefix = prefix.unwrap_or("");

    let mut keys = handle.index().sorted_keys();
    keys.retain(|k| k.starts_with(prefix));
    if let Some(km) = key_marker {
        keys.retain(|k| k.as_str() >= km);
    }

    let mut versions = Vec::new();
    let mut common_prefixes = Vec::new();
    let mut seen_prefixes = HashSet::new();
    let mut is_truncated = false;
    let mut next_key_marker = None;
    let mut next_version_id_marker = None;
    let mut last_key_marker: Option<String> = None;
    let mut last_version_marker: Option<String> = None;

    'outer: for key in keys {
        if let Some(grouped) = common_prefix_of(&key, prefix, delimiter) {
            if seen_prefixes.insert(grouped.clone()) {
                common_prefixes.push(grouped);
            }
            continue;
        }

        let Some(history) = handle.index().get(&key) else {
            continue;
        };
        let mut entries = history.all();
        entries.reverse();
        let latest_version_id = entries.first().map(|e| e.version_id().to_owned());

        if let (Some(km), Some(vm)) = (key_marker, version_id_marker) {
            if key == km {
                if let Some(pos) = entries.iter().position(|e| e.version_id() == vm) {
                    entries = entries.split_off(pos + 1);
                }
            }
        }

        for entry in entries {
            if versions.len() >= max_keys {
                is_truncated = true;
                next_key_marker = last_key_marker.clone();
                next_version_id_marker = last_version_marker.clone();
                break 'outer;
            }
            let is_latest = Some(entry.version_id()) == latest_version_id.as_deref();
            last_key_marker = Some(key.clone());
            last_version_marker = Some(entry.version_id().to_owned());
            versions.push(to_version_summary(&key, entry, is_latest));
        }
    }

    common_prefixes.sort();
    ListVersionsPage {
        versions,
        common_prefixes,
        is_truncated,
        next_key_marker,
        next_version_id_marker,
    }
}

fn to_version_summary(key: &str, entry: Entry, is_latest: bool) -> VersionSummary {
    match entry {
        Entry::Data(d) => VersionSummary {
            key: key.to_owned(),
            version_id: d.version_id,
            is_latest,
            last_modified: d.last_modified,
            etag: Some(d.etag),
            size: Some(d.size),
            is_delete_marker: false,
        },
        Entry::Marker(m) => VersionSummary {
            key: key.to_owned(),
            version_id: m.version_id,
            is_latest,
            last_modified: m.last_modified,
            etag: None,
            size: None,
            is_delete_marker: true,
        },
    }
}

/// If `key` (relative to `prefix`) contains `delimiter` past the prefix,
/// return the grouped common-prefix string; otherwise `None`.
fn common_prefix_of(key: &str, prefix: &str, delimiter: Option<&str>) -> Option<String> {
    let delim = delimiter?;
    if delim.is_empty() {
        return None;
    }
    let rel = key.strip_prefix(prefix)?;
    let idx = rel.find(delim)?;
    Some(format!("{prefix}{}", &rel[..idx + delim.len()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::versioning::{self, Preconditions};
    use crate::model::VersioningState;
    use crate::persistence::Persistence;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Arc<Persistence>, Registry) {
        let dir = tempdir().expect("test tempdir");
        let persistence =
            Arc::new(Persistence::open(dir.path().to_str().unwrap()).expect("test open"));
        let registry = Registry::load(persistence.clone()).expect("test load");
        (dir, persistence, registry)
    }

    #[test]
    fn test_should_hide_delete_marker_latest_keys_from_list_objects() {
        let (_dir, persistence, registry) = setup();
        registry.create_bucket("b", "us-east-1").expect("test create");
        registry
            .set_versioning("b", VersioningState::Enabled, None)
            .expect("test enable");
        let handle = registry.get_handle("b").expect("test get");

        versioning::put_object(&handle, &persistence, "x", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::put_object(&handle, &persistence, "y", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::put_object(&handle, &persistence, "z", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::delete_object_simple(&handle, &persistence, "y").expect("test delete");

        let page = list_objects(&handle, None, None, None, None);
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "z"]);
    }

    #[test]
    fn test_should_list_all_versions_including_delete_markers() {
        let (_dir, persistence, registry) = setup();
        registry.create_bucket("b", "us-east-1").expect("test create");
        registry
            .set_versioning("b", VersioningState::Enabled, None)
            .expect("test enable");
        let handle = registry.get_handle("b").expect("test get");

        versioning::put_object(&handle, &persistence, "x", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::put_object(&handle, &persistence, "y", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::delete_object_simple(&handle, &persistence, "y").expect("test delete");

        let page = list_object_versions(&handle, None, None, None, None, None);
        let y_entries: Vec<&VersionSummary> = page.versions.iter().filter(|v| v.key == "y").collect();
        assert_eq!(y_entries.len(), 2);
        assert!(y_entries[0].is_delete_marker);
        assert!(y_entries[0].is_latest);
        assert!(!y_entries[1].is_delete_marker);
        assert!(!y_entries[1].is_latest, "only one entry per key may be latest");
    }

    #[test]
    fn test_should_group_keys_sharing_delimiter_prefix() {
        let (_dir, persistence, registry) = setup();
        registry.create_bucket("b", "us-east-1").expect("test create");
        let handle = registry.get_handle("b").expect("test get");
        for key in ["photos/a.jpg", "photos/b.jpg", "readme.txt"] {
            versioning::put_object(&handle, &persistence, key, b"1".to_vec(), None, vec![], Preconditions::default())
                .expect("test put");
        }

        let page = list_objects(&handle, None, Some("/"), None, None);
        assert_eq!(page.common_prefixes, vec!["photos/".to_owned()]);
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["readme.txt"]);
    }

    #[test]
    fn test_should_truncate_and_resume_via_marker() {
        let (_dir, persistence, registry) = setup();
        registry.create_bucket("b", "us-east-1").expect("test create");
        let handle = registry.get_handle("b").expect("test get");
        for key in ["a", "b", "c"] {
            versioning::put_object(&handle, &persistence, key, b"1".to_vec(), None, vec![], Preconditions::default())
                .expect("test put");
        }

        let first_page = list_objects(&handle, None, None, None, Some(2));
        assert!(first_page.is_truncated);
        assert_eq!(first_page.objects.len(), 2);

        let second_page = list_objects(&handle, None, None, first_page.next_marker.as_deref(), Some(2));
        assert!(!second_page.is_truncated);
        assert_eq!(second_page.objects.len(), 1);
    }

    #[test]
    fn test_should_round_trip_all_versions_across_pages() {
        let (_dir, persistence, registry) = setup();
        registry.create_bucket("b", "us-east-1").expect("test create");
        registry
            .set_versioning("b", VersioningState::Enabled, None)
            .expect("test enable");
        let handle = registry.get_handle("b").expect("test get");
        versioning::put_object(&handle, &persistence, "f", b"1".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::put_object(&handle, &persistence, "f", b"2".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");
        versioning::put_object(&handle, &persistence, "f", b"3".to_vec(), None, vec![], Preconditions::default())
            .expect("test put");

        let mut all = Vec::new();
        let mut key_marker = None;
        let mut version_marker = None;
        loop {
            let page = list_object_versions(
                &handle,
                None,
                None,
                key_marker.as_deref(),
                version_marker.as_deref(),
                Some(2),
            );
            all.extend(page.versions.clone());
            if !page.is_truncated {
                break;
            }
            key_marker = page.next_key_marker;
            version_marker = page.next_version_id_marker;
        }

        assert_eq!(all.len(), 3);
        assert!(all[0].is_latest);
    }
}
