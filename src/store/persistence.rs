//! Durable storage for the stats sub-object.
//!
//! Only [`Stats`] outlives a process. The file layout is a JSON object
//! mapping storage keys to `{"state": {"stats": ...}, "version": 0}`
//! entries; a storage instance only reads and writes its own key.

use crate::models::Stats;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Default storage key.
pub const DEFAULT_STORAGE_KEY: &str = "medsai-store";

const STATE_VERSION: u32 = 0;

/// Somewhere to keep stats between runs.
pub trait StatsStorage {
    /// Load previously saved stats, `Ok(None)` when nothing was saved.
    fn load(&self) -> Result<Option<Stats>>;

    /// Save the current stats.
    fn save(&self, stats: &Stats) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    stats: Stats,
}

/// JSON file shared by any number of storage keys.
#[derive(Debug, Clone)]
pub struct FileStatsStorage {
    path: PathBuf,
    key: String,
}

impl FileStatsStorage {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }
}

impl StatsStorage for FileStatsStorage {
    fn load(&self) -> Result<Option<Stats>> {
        let mut entries = self.read_entries()?;

        match entries.remove(&self.key) {
            Some(value) => {
                let entry: PersistedEntry = serde_json::from_value(value)
                    .with_context(|| format!("Malformed state entry '{}'", self.key))?;
                Ok(Some(entry.state.stats))
            }
            None => Ok(None),
        }
    }

    fn save(&self, stats: &Stats) -> Result<()> {
        // An unreadable file must not block every later save.
        let mut entries = self.read_entries().unwrap_or_else(|e| {
            warn!("Discarding unreadable state file: {:#}", e);
            Map::new()
        });

        let entry = PersistedEntry {
            state: PersistedState {
                stats: stats.clone(),
            },
            version: STATE_VERSION,
        };
        entries.insert(self.key.clone(), serde_json::to_value(entry)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(&entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write state file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))
    }
}

/// In-memory storage. Clones share the same slot, so a test can reopen a
/// store on the same storage to simulate a reload.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStatsStorage {
    slot: Arc<Mutex<Option<Stats>>>,
}

#[cfg(test)]
impl MemoryStatsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl StatsStorage for MemoryStatsStorage {
    fn load(&self) -> Result<Option<Stats>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("stats slot poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, stats: &Stats) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("stats slot poisoned"))?;
        *slot = Some(stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStatsStorage::new(temp_dir.path().join("state.json"), "k");
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_and_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.json");
        let storage = FileStatsStorage::new(&path, DEFAULT_STORAGE_KEY);

        let stats = Stats {
            cases_analyzed: 4,
            ..Stats::default()
        };
        storage.save(&stats).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[DEFAULT_STORAGE_KEY]["state"]["stats"]["casesAnalyzed"], 4);
        assert_eq!(raw[DEFAULT_STORAGE_KEY]["version"], 0);

        assert_eq!(storage.load().unwrap(), Some(stats));
    }

    #[test]
    fn test_other_keys_are_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, r#"{"theme": {"state": {"dark": true}, "version": 1}}"#).unwrap();

        let storage = FileStatsStorage::new(&path, DEFAULT_STORAGE_KEY);
        storage.save(&Stats::default()).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"]["state"]["dark"], true);
        assert!(raw.get(DEFAULT_STORAGE_KEY).is_some());
    }

    #[test]
    fn test_corrupt_file_is_replaced_on_save() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let storage = FileStatsStorage::new(&path, DEFAULT_STORAGE_KEY);
        assert!(storage.load().is_err());

        let stats = Stats {
            cases_analyzed: 2,
            ..Stats::default()
        };
        storage.save(&stats).unwrap();

        assert_eq!(storage.load().unwrap(), Some(stats));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_memory_storage_is_shared_between_clones() {
        let storage = MemoryStatsStorage::new();
        let other = storage.clone();

        storage
            .save(&Stats {
                completed_cases: 7,
                ..Stats::default()
            })
            .unwrap();

        assert_eq!(other.load().unwrap().unwrap().completed_cases, 7);
    }
}
