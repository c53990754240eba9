//! JSON-file backed store
//!
//! Used by the terminal front end so that a "remount" can be a brand-new
//! process. The whole map is rewritten on every mutation; the data set is a
//! handful of small keys.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::{AssistantError, AssistantResult};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// An unreadable file is treated as empty rather than failing the mount.
    pub fn open(path: impl AsRef<Path>) -> AssistantResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), "Ignoring corrupt store file: {}", e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "Opened file store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> AssistantResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

fn poisoned() -> AssistantError {
    AssistantError::storage("file store lock poisoned")
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> AssistantResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    // Mutations are written to disk first; memory only changes once the
    // file holds the new map.
    fn set(&self, key: &str, value: &str) -> AssistantResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> AssistantResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}
