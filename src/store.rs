//! Tab-order persistence
//!
//! Round-trips the user-visible tab order, record fields, the active tab id,
//! and the id allocator state. The on-disk format is versioned pretty JSON
//! written atomically (temp file + rename).

use crate::error::{StorageError, StorageResult};
use crate::tab::{TabId, TabRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Version of the tab-order file format
const TAB_ORDER_VERSION: u32 = 1;

/// Serialized snapshot of the tab collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTabs {
    /// File format version
    pub version: u32,
    /// Timestamp when the snapshot was saved
    #[serde(with = "systemtime_serde")]
    pub saved_at: SystemTime,
    /// Tab records in user-visible order
    pub tabs: Vec<TabRecord>,
    /// Active tab id at save time, if any
    pub active_id: Option<TabId>,
    /// Id allocator state so restored tabs never collide with new ones
    pub next_tab_id: u32,
}

impl PersistedTabs {
    /// Create a snapshot from live state
    pub fn new(tabs: Vec<TabRecord>, active_id: Option<TabId>, next_tab_id: u32) -> Self {
        Self {
            version: TAB_ORDER_VERSION,
            saved_at: SystemTime::now(),
            tabs,
            active_id,
            next_tab_id,
        }
    }

    /// Validate snapshot integrity
    pub fn validate(&self) -> StorageResult<()> {
        if self.version != TAB_ORDER_VERSION {
            return Err(StorageError::VersionMismatch {
                expected: TAB_ORDER_VERSION,
                actual: self.version,
            });
        }

        let mut seen = HashSet::new();
        for tab in &self.tabs {
            if !seen.insert(tab.id) {
                return Err(StorageError::Corrupted {
                    reason: format!("duplicate tab id {}", tab.id),
                });
            }
            if tab.id.as_u32() >= self.next_tab_id {
                return Err(StorageError::Corrupted {
                    reason: format!("tab id {} outruns allocator {}", tab.id, self.next_tab_id),
                });
            }
        }

        if let Some(active) = self.active_id {
            if !seen.contains(&active) {
                return Err(StorageError::Corrupted {
                    reason: format!("active id {active} not in tab list"),
                });
            }
        }

        Ok(())
    }
}

/// Persistence collaborator for the tab model
pub trait TabStore {
    /// Load the persisted tab order
    fn load_tab_order(&mut self) -> StorageResult<PersistedTabs>;

    /// Save the tab order snapshot
    fn save_tab_order(&mut self, tabs: &PersistedTabs) -> StorageResult<()>;
}

/// File-backed store using pretty JSON
#[derive(Debug, Clone)]
pub struct JsonTabStore {
    path: PathBuf,
}

impl JsonTabStore {
    /// Create a store reading and writing the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the default per-user location
    pub fn at_default_path() -> Self {
        Self::new(Self::default_path())
    }

    /// Default tab-order file location
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webtabs")
            .join("tabs.json")
    }

    /// Path this store reads and writes
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TabStore for JsonTabStore {
    fn load_tab_order(&mut self) -> StorageResult<PersistedTabs> {
        if !self.path.exists() {
            return Err(StorageError::NotFound {
                path: self.path.clone(),
            });
        }

        let json = std::fs::read_to_string(&self.path)?;
        let persisted: PersistedTabs = serde_json::from_str(&json)?;
        persisted.validate()?;

        tracing::info!("Tab order loaded from {:?}", self.path);
        Ok(persisted)
    }

    fn save_tab_order(&mut self, tabs: &PersistedTabs) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(tabs)?;

        // Write to a temporary file first, then rename (atomic operation)
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;

        tracing::info!("Tab order saved to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store for tests and embedders without a disk profile
#[derive(Debug, Clone, Default)]
pub struct MemoryTabStore {
    persisted: Option<PersistedTabs>,
    /// Number of saves performed, useful for asserting persistence fan-out
    pub save_count: usize,
}

impl MemoryTabStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a snapshot
    pub fn with_snapshot(snapshot: PersistedTabs) -> Self {
        Self {
            persisted: Some(snapshot),
            save_count: 0,
        }
    }

    /// The last saved snapshot, if any
    pub fn snapshot(&self) -> Option<&PersistedTabs> {
        self.persisted.as_ref()
    }
}

impl TabStore for MemoryTabStore {
    fn load_tab_order(&mut self) -> StorageResult<PersistedTabs> {
        match &self.persisted {
            Some(snapshot) => {
                snapshot.validate()?;
                Ok(snapshot.clone())
            }
            None => Err(StorageError::NotFound {
                path: PathBuf::from("<memory>"),
            }),
        }
    }

    fn save_tab_order(&mut self, tabs: &PersistedTabs) -> StorageResult<()> {
        self.persisted = Some(tabs.clone());
        self.save_count += 1;
        Ok(())
    }
}

// Custom serialization for SystemTime
mod systemtime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tabs() -> Vec<TabRecord> {
        let mut parented = TabRecord::new(TabId::new(2), "https://b.com", "B")
            .with_parent(Some(TabId::new(1)));
        parented.set_thumbnail_path(Some("/thumbs/2.png".to_string()));
        vec![TabRecord::new(TabId::new(1), "https://a.com", "A"), parented]
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonTabStore::new(temp_dir.path().join("tabs.json"));

        let snapshot = PersistedTabs::new(sample_tabs(), Some(TabId::new(2)), 3);
        store.save_tab_order(&snapshot).unwrap();

        let loaded = store.load_tab_order().unwrap();
        assert_eq!(loaded.version, TAB_ORDER_VERSION);
        assert_eq!(loaded.tabs, snapshot.tabs);
        assert_eq!(loaded.active_id, Some(TabId::new(2)));
        assert_eq!(loaded.next_tab_id, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = JsonTabStore::new(temp_dir.path().join("absent.json"));
        assert!(matches!(
            store.load_tab_order(),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let tabs = vec![
            TabRecord::new(TabId::new(1), "https://a.com", "A"),
            TabRecord::new(TabId::new(1), "https://b.com", "B"),
        ];
        let snapshot = PersistedTabs::new(tabs, None, 2);
        assert!(matches!(
            snapshot.validate(),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_stale_active_id() {
        let snapshot = PersistedTabs::new(sample_tabs(), Some(TabId::new(9)), 3);
        assert!(matches!(
            snapshot.validate(),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_allocator_behind_ids() {
        let snapshot = PersistedTabs::new(sample_tabs(), None, 2);
        assert!(matches!(
            snapshot.validate(),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_version_mismatch() {
        let mut snapshot = PersistedTabs::new(sample_tabs(), None, 3);
        snapshot.version = 99;
        assert!(matches!(
            snapshot.validate(),
            Err(StorageError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryTabStore::new();
        assert!(store.load_tab_order().is_err());

        let snapshot = PersistedTabs::new(sample_tabs(), None, 3);
        store.save_tab_order(&snapshot).unwrap();
        assert_eq!(store.save_count, 1);

        let loaded = store.load_tab_order().unwrap();
        assert_eq!(loaded.tabs, snapshot.tabs);
    }
}
