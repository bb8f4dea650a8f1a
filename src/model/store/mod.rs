use std::fmt::Display;
use std::sync::Arc;

use log::error;
use rocket::tokio::task::{self, JoinError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

mod file;
mod memory;

/// Key under which the signed-in user's public profile is kept.
pub const CURRENT_USER: &str = "currentUser";
/// Key under which a user's submitted selections are kept.
pub const USER_VOTES: &str = "userVotes";
/// Key under which the ISO-8601 submission time is kept.
pub const VOTE_TIMESTAMP: &str = "voteTimestamp";
/// Global flag recording that the demo credentials have been announced.
pub const DEMO_DATA_LOADED: &str = "demoDataLoaded";

/// Build the key for a per-user entry.
pub fn user_key(user: impl Display, key: &str) -> String {
    format!("user/{user}/{key}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on backing file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed store contents: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Quota exceeded: writing {attempted} bytes would exceed the {quota} byte limit")]
    QuotaExceeded { attempted: usize, quota: usize },
    #[error("Store lock poisoned by a panicked writer")]
    Poisoned,
    #[error("Store write did not complete: {0}")]
    Interrupted(#[from] JoinError),
}

/// A pending write: `Some` stores the value, `None` deletes the key.
pub type Change = (String, Option<String>);

/// A durable store of string values, in the manner of a browser's local storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing whatever was there.
    fn set_item(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// Apply every change or none of them.
    ///
    /// The default applies changes one at a time and puts back the earlier
    /// values when one fails part way through.
    fn apply(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        let mut undo: Vec<Change> = Vec::with_capacity(changes.len());
        for (key, value) in changes {
            let outcome = self.get_item(&key).and_then(|previous| {
                match value {
                    Some(value) => self.set_item(&key, value)?,
                    None => self.remove_item(&key)?,
                }
                Ok(previous)
            });
            match outcome {
                Ok(previous) => undo.push((key, previous)),
                Err(e) => {
                    for (key, previous) in undo.into_iter().rev() {
                        let restored = match previous {
                            Some(previous) => self.set_item(&key, previous),
                            None => self.remove_item(&key),
                        };
                        if let Err(e) = restored {
                            error!("Failed to restore `{key}` after a partial write: {e}");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Changes written together by [`Storage::commit`].
#[derive(Debug, Default)]
pub struct WriteBatch(Vec<Change>);

impl WriteBatch {
    /// Serialize `value` and queue it for `key`.
    pub fn save<T>(mut self, key: &str, value: &T) -> Result<Self, StoreError>
    where
        T: Serialize + ?Sized,
    {
        self.0.push((key.to_string(), Some(serde_json::to_string(value)?)));
        Ok(self)
    }

    /// Queue the deletion of `key`.
    pub fn remove(mut self, key: &str) -> Self {
        self.0.push((key.to_string(), None));
        self
    }
}

/// JSON persistence over a [`KeyValueStore`].
///
/// The plain methods are best-effort: failures are logged and swallowed, and
/// missing or unparseable values read back as `None`. [`Storage::try_save`]
/// is the one fallible entry point, for callers that must not report success
/// on a failed write.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A storage handle backed by a fresh, unbounded in-memory map.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Apply `batch` in full or not at all. The backend runs on the blocking
    /// thread pool, as a file-backed store writes to disk.
    pub async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let backend = self.backend.clone();
        task::spawn_blocking(move || backend.apply(batch.0)).await?
    }

    /// Serialize and write `value`, propagating any failure.
    pub fn try_save<T>(&self, key: &str, value: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_string(value)?;
        self.backend.set_item(key, json)
    }

    /// Serialize and write `value`. Returns whether the write happened.
    pub fn save<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_save(key, value) {
            Ok(()) => true,
            Err(e) => {
                error!("Error saving `{key}` to storage: {e}");
                false
            }
        }
    }

    /// Read and deserialize the value under `key`.
    pub fn load<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Error loading `{key}` from storage: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Error parsing `{key}` from storage: {e}");
                None
            }
        }
    }

    /// Delete the value under `key`. Returns whether the delete happened.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                error!("Error removing `{key}` from storage: {e}");
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
        scores: BTreeMap<String, u32>,
        admin: bool,
    }

    #[test]
    fn load_returns_what_was_saved() {
        let storage = Storage::in_memory();
        let profile = Profile {
            name: "John Doe".to_string(),
            tags: vec!["voter".to_string()],
            scores: BTreeMap::from([("president".to_string(), 3)]),
            admin: false,
        };

        assert!(storage.save("profile", &profile));
        assert_eq!(Some(profile), storage.load::<Profile>("profile"));

        assert!(storage.save(DEMO_DATA_LOADED, &true));
        assert_eq!(Some(true), storage.load::<bool>(DEMO_DATA_LOADED));
    }

    #[test]
    fn later_save_wins() {
        let storage = Storage::in_memory();
        storage.save("key", "first");
        storage.save("key", "second");
        assert_eq!(Some("second".to_string()), storage.load::<String>("key"));
    }

    #[test]
    fn absent_key_loads_as_none() {
        let storage = Storage::in_memory();
        assert_eq!(None, storage.load::<String>("missing"));
    }

    #[test]
    fn unparseable_value_loads_as_none() {
        let store = MemoryStore::new();
        store.set_item("broken", "{not json".to_string()).unwrap();
        let storage = Storage::new(store);
        assert_eq!(None, storage.load::<Profile>("broken"));
    }

    #[test]
    fn wrong_shape_loads_as_none() {
        let storage = Storage::in_memory();
        storage.save("number", &42);
        assert_eq!(None, storage.load::<Profile>("number"));
    }

    #[test]
    fn failed_save_is_swallowed() {
        let storage = Storage::new(MemoryStore::with_quota(8));
        assert!(!storage.save("key", "a value that does not fit"));
        assert_eq!(None, storage.load::<String>("key"));
        assert!(matches!(
            storage.try_save("key", "a value that does not fit"),
            Err(StoreError::QuotaExceeded { quota: 8, .. })
        ));
    }

    #[test]
    fn remove_deletes() {
        let storage = Storage::in_memory();
        storage.save("key", &1);
        assert!(storage.remove("key"));
        assert_eq!(None, storage.load::<u32>("key"));
        // Removing again is fine.
        assert!(storage.remove("key"));
    }

    #[tokio::test]
    async fn commit_writes_and_deletes_together() {
        let storage = Storage::in_memory();
        storage.save("stale", &1);
        let batch = WriteBatch::default()
            .save("a", "first")
            .unwrap()
            .save("b", &2)
            .unwrap()
            .remove("stale");
        storage.commit(batch).await.unwrap();

        assert_eq!(Some("first".to_string()), storage.load::<String>("a"));
        assert_eq!(Some(2), storage.load::<u32>("b"));
        assert_eq!(None, storage.load::<u32>("stale"));
    }

    #[tokio::test]
    async fn failed_commit_puts_back_earlier_values() {
        let store = testing::FlakyStore::default();
        let storage = Storage::new(store.clone());
        storage.save("a", "old");
        store.fail_writes_to("c");

        let batch = WriteBatch::default()
            .save("a", "new")
            .unwrap()
            .save("b", "new")
            .unwrap()
            .save("c", "new")
            .unwrap();
        assert!(matches!(
            storage.commit(batch).await,
            Err(StoreError::Io(_))
        ));

        assert_eq!(Some("old".to_string()), storage.load::<String>("a"));
        assert_eq!(None, storage.load::<String>("b"));
        assert_eq!(None, storage.load::<String>("c"));
    }

    #[test]
    fn user_keys_are_namespaced() {
        assert_eq!("user/7/userVotes", user_key(7, USER_VOTES));
        assert_ne!(user_key(1, CURRENT_USER), user_key(2, CURRENT_USER));
    }
}
