use std::collections::HashMap;
use std::sync::Mutex;

use super::{Change, KeyValueStore, StoreError};

/// An in-memory store, optionally capped at a total number of bytes
/// (keys plus values) to mimic a browser storage quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota: Some(quota),
        }
    }
}

impl KeyValueStore for MemoryStore {
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
        if let Some(quota) = self.quota {
            // Size of every entry once the changes are in.
            let mut sizes: HashMap<&str, usize> = items
                .iter()
                .map(|(k, v)| (k.as_str(), k.len() + v.len()))
                .collect();
            for (key, value) in &changes {
                match value {
                    Some(value) => sizes.insert(key, key.len() + value.len()),
                    None => sizes.remove(key.as_str()),
                };
            }
            let attempted: usize = sizes.values().sum();
            if attempted > quota {
                return Err(StoreError::QuotaExceeded { attempted, quota });
            }
        }
        for (key, value) in changes {
            match value {
                Some(value) => items.insert(key, value),
                None => items.remove(&key),
            };
        }
        Ok(())
    }
}
