//! Persisted status snapshots between report cycles

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::status::ChannelStatus;

/// Per-client status map, one entry per channel.
pub type ClientSnapshot = BTreeMap<Channel, ChannelStatus>;

/// Fleet-wide status map, keyed by client name. The sole durable state.
pub type GlobalSnapshot = BTreeMap<String, ClientSnapshot>;

/// Stores the latest [`GlobalSnapshot`] on disk so the next cycle has a
/// diff baseline. Overwritten wholesale every cycle; a crash mid-cycle
/// just means the next cycle diffs against the last completed snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the previous snapshot.
    ///
    /// A missing file or unparseable content yields an empty baseline;
    /// any other disk error is propagated.
    pub fn load(&self) -> crate::Result<GlobalSnapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No snapshot at {:?}, starting from empty baseline", self.path);
                return Ok(GlobalSnapshot::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                tracing::warn!(
                    "Snapshot at {:?} is unreadable ({}), starting from empty baseline",
                    self.path,
                    e
                );
                Ok(GlobalSnapshot::new())
            }
        }
    }

    /// Persist a snapshot, replacing whatever was there.
    ///
    /// The whole serialized document goes down in a single write, so a
    /// concurrent reader never sees a half-written file. `BTreeMap` keys
    /// keep the serialization deterministic.
    pub fn save(&self, snapshot: &GlobalSnapshot) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, serialized)?;
        tracing::debug!(
            "Saved snapshot for {} clients to {:?}",
            snapshot.len(),
            self.path
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> GlobalSnapshot {
        let mut clients = GlobalSnapshot::new();
        let mut acme = ClientSnapshot::new();
        acme.insert(Channel::Telegram, ChannelStatus::Up);
        acme.insert(Channel::Waha, ChannelStatus::Absent);
        clients.insert("Acme".to_string(), acme);
        let mut zenith = ClientSnapshot::new();
        zenith.insert(Channel::Instagram, ChannelStatus::Error);
        clients.insert("Zenith".to_string(), zenith);
        clients
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("last_snapshot.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_snapshot.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SnapshotStore::new(path);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("last_snapshot.json"));
        let snapshot = sample_snapshot();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("reports").join("last_snapshot.json"));
        store.save(&sample_snapshot()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn serialization_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("last_snapshot.json"));
        store.save(&sample_snapshot()).unwrap();
        let first = std::fs::read(store.path()).unwrap();
        let reloaded = store.load().unwrap();
        store.save(&reloaded).unwrap();
        let second = std::fs::read(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn persisted_form_uses_stable_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("last_snapshot.json"));
        store.save(&sample_snapshot()).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"Acme\""));
        assert!(raw.contains("\"telegram\""));
        assert!(raw.contains("\"up\""));
        assert!(raw.contains("\"absent\""));
    }
}
