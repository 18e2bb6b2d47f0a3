//! Snapshot data model and durable state store.
//!
//! A `Snapshot` is the full last-known state for one monitored source: a map
//! from stable item identity (file path, feed entry id) to its tracked
//! metadata. The store persists one snapshot per source as a JSON document and
//! always rewrites it whole; there is no incremental patching.
//!
//! Loading is fail-soft by contract: a missing or corrupt snapshot file yields
//! an empty snapshot so change detection can still proceed. Saving is an atomic
//! full overwrite (temp file in the target directory, then rename).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

/// Metadata tracked for one monitored file or feed entry.
///
/// Identity and `content_fingerprint` drive change classification; `size` is
/// reporting-only. Timestamps are stored as ISO-8601 strings so that a single
/// malformed date degrades that item's age computation rather than poisoning
/// the whole snapshot on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub identity: String,
    pub content_fingerprint: String,
    pub size: u64,
    /// Assigned the run the item is first observed; never updated afterward.
    pub first_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl TrackedItem {
    /// A bare repository-file item: identity, raw-content fingerprint, size.
    pub fn file(identity: impl Into<String>, fingerprint: String, size: u64, now: DateTime<Utc>) -> Self {
        TrackedItem {
            identity: identity.into(),
            content_fingerprint: fingerprint,
            size,
            first_seen: now.to_rfc3339(),
            title: None,
            link: None,
            published: None,
            content: None,
        }
    }
}

/// Full current-state mapping of identity to item metadata for one source.
/// Keys are unique by construction; iteration order is deterministic.
pub type Snapshot = BTreeMap<String, TrackedItem>;

/// SHA-256 hex digest over raw content bytes (repository files).
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hex digest for a feed entry: title, link and normalized body
/// concatenated in that fixed order, so title or link corrections register as
/// content changes.
pub fn fingerprint_entry(title: &str, link: &str, normalized_body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(link.as_bytes());
    hasher.update(normalized_body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Merge a freshly fetched snapshot with the previous one, preserving each
/// surviving identity's original `first_seen`. The returned snapshot is the
/// one to persist.
pub fn carry_forward(previous: &Snapshot, mut current: Snapshot) -> Snapshot {
    for (identity, item) in current.iter_mut() {
        if let Some(prior) = previous.get(identity) {
            item.first_seen = prior.first_seen.clone();
        }
    }
    current
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Serialize(e) => write!(f, "store serialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialize(e)
    }
}

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const CHANGES_FILE: &str = "latest_changes.json";
pub const FEED_METADATA_FILE: &str = "feed_metadata.json";

/// Durable JSON store: one subdirectory per monitored source under a common
/// content root, holding the snapshot, the latest change set, and (for feed
/// sources) feed metadata. Repository-file content saved for commit lives in a
/// `files/` subtree beside the metadata.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SnapshotStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self, source_key: &str) -> PathBuf {
        self.root.join(source_key)
    }

    /// Directory of backing content artifacts for a source (repository files).
    pub fn files_dir(&self, source_key: &str) -> PathBuf {
        self.source_dir(source_key).join("files")
    }

    /// Load the last persisted snapshot for a source. Missing or corrupt state
    /// yields an empty snapshot: change detection must proceed even when
    /// historical state is unreadable.
    pub fn load(&self, source_key: &str) -> Snapshot {
        let path = self.source_dir(source_key).join(SNAPSHOT_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = ?e, "No previous snapshot, starting empty");
                return Snapshot::new();
            }
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => {
                debug!(path = %path.display(), items = snapshot.len(), "Loaded previous snapshot");
                snapshot
            }
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Could not parse previous snapshot, treating as empty");
                Snapshot::new()
            }
        }
    }

    /// Atomically overwrite the snapshot for a source with the full new state.
    pub fn save(&self, source_key: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.write_json(source_key, SNAPSHOT_FILE, snapshot)
    }

    /// Atomically write any serializable document beside the snapshot.
    pub fn write_json<T: Serialize>(
        &self,
        source_key: &str,
        file_name: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let dir = self.source_dir(source_key);
        fs::create_dir_all(&dir)?;
        let payload = serde_json::to_vec_pretty(value)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&payload)?;
        let target = dir.join(file_name);
        tmp.persist(&target).map_err(|e| {
            error!(path = %target.display(), error = ?e.error, "Failed to persist document");
            StoreError::Io(e.error)
        })?;
        debug!(path = %target.display(), bytes = payload.len(), "Persisted document");
        Ok(())
    }

    /// Read an arbitrary JSON document for a source, if present and parseable.
    pub fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        source_key: &str,
        file_name: &str,
    ) -> Option<T> {
        let path = self.source_dir(source_key).join(file_name);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "Could not parse stored document");
                None
            }
        }
    }

    /// Source keys with persisted snapshots, in deterministic order. Used by
    /// the sweeper to walk every monitored source without knowing the run
    /// configuration that produced it.
    pub fn list_source_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return keys,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && path.join(SNAPSHOT_FILE).exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        keys
    }
}
