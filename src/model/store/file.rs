use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use super::{Change, KeyValueStore, StoreError};

/// A store persisted as a single JSON object on disk.
///
/// The whole file is rewritten on every change, via a temporary file and a
/// rename so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, creating it lazily on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened store at {} with {} entries", path.display(), items.len());
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(items)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let items = self.items.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.apply(vec![(key.to_string(), Some(value))])
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.apply(vec![(key.to_string(), None)])
    }

    fn apply(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        let mut items = self.items.lock().map_err(|_| StoreError::Poisoned)?;
        let mut changed = false;
        let mut undo: Vec<Change> = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            let previous = match value {
                Some(value) => {
                    changed = true;
                    items.insert(key.clone(), value)
                }
                None => items.remove(&key),
            };
            changed |= previous.is_some();
            undo.push((key, previous));
        }
        if !changed {
            return Ok(());
        }
        if let Err(e) = self.flush(&items) {
            // Keep memory consistent with disk.
            for (key, previous) in undo.into_iter().rev() {
                match previous {
                    Some(previous) => items.insert(key, previous),
                    None => items.remove(&key),
                };
            }
            return Err(e);
        }
        Ok(())
    }
}
