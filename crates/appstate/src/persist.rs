#![forbid(unsafe_code)]

//! Snapshot persistence for a [`Store`].
//!
//! Persistence sits outside the store: it reads snapshots through a
//! whole-state subscription and rehydrates through
//! [`Store::replace_state`]. The store itself never performs I/O.
//!
//! # Storage format
//!
//! One pretty-printed JSON document per key. [`FileStorage`] writes
//! `<dir>/<key>.json` by writing `<key>.json.tmp` first and renaming it into
//! place, so a crash mid-write leaves the previous snapshot intact.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Missing entry | First run | Store keeps its initial state |
//! | Malformed entry | Hand-edited or truncated file | `persist` returns `Deserialize` |
//! | Write failure | Disk full, permissions | Logged, counted in `failed_saves()` |

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::subscription::Subscription;

/// Key/value storage for serialized snapshots.
pub trait StorageBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Load the entry for `key`, or `None` if nothing was stored.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `data` under `key`, replacing any previous entry.
    fn save(&self, key: &str, data: &str) -> Result<()>;

    /// Delete the entry for `key`. Missing entries are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Rc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, data: &str) -> Result<()> {
        (**self).save(key, data)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-memory backend, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored entry, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, data: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), data.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Directory-backed storage with one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store snapshots under `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    ///
    /// Keys are plain file stems: empty keys, `.`/`..`, and keys containing a
    /// path separator are rejected with [`io::ErrorKind::InvalidInput`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if `key` would resolve outside the
    /// storage directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
            return Err(Self::io_error(
                key,
                io::Error::new(io::ErrorKind::InvalidInput, "storage key must be a plain file stem"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn io_error(key: &str, source: io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_owned(),
            source,
        }
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }

    fn save(&self, key: &str, data: &str) -> Result<()> {
        let target = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| Self::io_error(key, err))?;
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|err| Self::io_error(key, err))?;
        fs::rename(&tmp, &target).map_err(|err| Self::io_error(key, err))?;
        debug!(path = %target.display(), bytes = data.len(), "snapshot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }
}

/// Keeps a store synchronized with a storage backend.
///
/// Dropping the handle stops saving; [`PersistHandle::detach`] keeps saving
/// for the lifetime of the store.
pub struct PersistHandle<S> {
    store: Store<S>,
    backend: Rc<dyn StorageBackend>,
    key: String,
    failed_saves: Rc<Cell<u64>>,
    subscription: Subscription,
}

impl<S> fmt::Debug for PersistHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistHandle")
            .field("backend", &self.backend.name())
            .field("key", &self.key)
            .field("failed_saves", &self.failed_saves.get())
            .field("subscription", &self.subscription)
            .finish()
    }
}

impl<S> PersistHandle<S>
where
    S: Clone + PartialEq + Serialize + 'static,
{
    /// Storage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of automatic saves that failed since `persist`.
    #[must_use]
    pub fn failed_saves(&self) -> u64 {
        self.failed_saves.get()
    }

    /// Save the current state now.
    ///
    /// # Errors
    ///
    /// Returns the encode or backend error.
    pub fn flush(&self) -> Result<()> {
        let snapshot = self.store.get_state();
        save_snapshot(self.backend.as_ref(), &self.key, &snapshot)
    }

    /// Stop saving and delete the stored entry.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub fn clear(self) -> Result<()> {
        self.subscription.unsubscribe();
        self.backend.remove(&self.key)
    }

    /// Keep saving until the store is dropped.
    pub fn detach(self) {
        self.subscription.detach();
    }
}

/// Rehydrate `store` from `backend` and save every subsequent change.
///
/// If an entry exists under `key`, it replaces the store's state (and
/// notifies subscribers as any other update would). Later changes are
/// written on every notification pass; a failed write is logged and
/// counted but never interrupts the pass.
///
/// # Errors
///
/// Returns an error if the stored entry cannot be read or decoded.
pub fn persist<S, B>(store: &Store<S>, backend: B, key: impl Into<String>) -> Result<PersistHandle<S>>
where
    S: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
    B: StorageBackend + 'static,
{
    let backend: Rc<dyn StorageBackend> = Rc::new(backend);
    let key = key.into();

    if let Some(raw) = backend.load(&key)? {
        let restored: S = serde_json::from_str(&raw).map_err(|source| StoreError::Deserialize {
            key: key.clone(),
            source,
        })?;
        store.replace_state(restored);
        info!(key = %key, backend = backend.name(), "rehydrated state");
    } else {
        debug!(key = %key, backend = backend.name(), "no stored state");
    }

    let failed_saves = Rc::new(Cell::new(0u64));
    let subscription = {
        let backend = Rc::clone(&backend);
        let key = key.clone();
        let failed_saves = Rc::clone(&failed_saves);
        store.subscribe_all(move |state: &S| {
            if let Err(err) = save_snapshot(backend.as_ref(), &key, state) {
                failed_saves.set(failed_saves.get() + 1);
                warn!(key = %key, error = %err, "failed to persist state");
            }
        })
    };

    Ok(PersistHandle {
        store: store.clone(),
        backend,
        key,
        failed_saves,
        subscription,
    })
}

fn save_snapshot<S: Serialize>(backend: &dyn StorageBackend, key: &str, state: &S) -> Result<()> {
    let data = serde_json::to_string_pretty(state).map_err(|source| StoreError::Serialize {
        key: key.to_owned(),
        source,
    })?;
    backend.save(key, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    crate::define_state! {
        #[derive(Serialize, Deserialize)]
        struct Prefs patch PrefsPatch {
            is_loading: bool = false,
            volume: u8 = 50,
        }
    }

    /// Backend that rejects every write.
    struct ReadOnly;

    impl StorageBackend for ReadOnly {
        fn name(&self) -> &str {
            "read-only"
        }

        fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn save(&self, key: &str, _data: &str) -> Result<()> {
            Err(StoreError::Io {
                key: key.to_owned(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn saves_on_change() {
        let storage = Rc::new(MemoryStorage::new());
        let store = Store::new(Prefs::default());
        let handle = persist(&store, Rc::clone(&storage), "prefs").expect("persist");
        assert!(storage.is_empty());

        store.set_state(PrefsPatch::default().volume(80));
        let raw = storage.get("prefs").expect("saved");
        let saved: Prefs = serde_json::from_str(&raw).expect("json");
        assert_eq!(saved.volume, 80);
        assert_eq!(handle.failed_saves(), 0);
    }

    #[test]
    fn rehydrates_existing_entry() {
        let storage = Rc::new(MemoryStorage::new());
        storage
            .save("prefs", r#"{"is_loading":true,"volume":7}"#)
            .expect("seed");

        let store = Store::new(Prefs::default());
        let _handle = persist(&store, Rc::clone(&storage), "prefs").expect("persist");
        assert_eq!(
            store.get_state(),
            Prefs {
                is_loading: true,
                volume: 7
            }
        );
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let storage = Rc::new(MemoryStorage::new());
        storage.save("prefs", "{not json").expect("seed");
        let store = Store::new(Prefs::default());
        let err = persist(&store, storage, "prefs").expect_err("should fail");
        assert!(matches!(err, StoreError::Deserialize { ref key, .. } if key == "prefs"));
        assert_eq!(store.get_state(), Prefs::default());
    }

    #[test]
    fn failed_save_is_counted_not_raised() {
        let store = Store::new(Prefs::default());
        let handle = persist(&store, ReadOnly, "prefs").expect("persist");
        store.set_state(PrefsPatch::default().is_loading(true));
        store.set_state(PrefsPatch::default().is_loading(false));
        assert_eq!(handle.failed_saves(), 2);
        assert!(handle.flush().is_err());
    }

    #[test]
    fn dropping_handle_stops_saving() {
        let storage = Rc::new(MemoryStorage::new());
        let store = Store::new(Prefs::default());
        drop(persist(&store, Rc::clone(&storage), "prefs").expect("persist"));
        store.set_state(PrefsPatch::default().volume(1));
        assert!(storage.get("prefs").is_none());
    }

    #[test]
    fn clear_removes_entry() {
        let storage = Rc::new(MemoryStorage::new());
        let store = Store::new(Prefs::default());
        let handle = persist(&store, Rc::clone(&storage), "prefs").expect("persist");
        handle.flush().expect("flush");
        assert_eq!(storage.len(), 1);
        handle.clear().expect("clear");
        assert!(storage.is_empty());
    }

    #[test]
    fn file_storage_roundtrip_through_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = FileStorage::new(dir.path().join("state"));

        {
            let store = Store::new(Prefs::default());
            let handle = persist(&store, files.clone(), "prefs").expect("persist");
            store.set_state(PrefsPatch::default().volume(99));
            handle.detach();
        }
        let path = files.path_for("prefs").expect("plain key");
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let store = Store::new(Prefs::default());
        let _handle = persist(&store, files.clone(), "prefs").expect("persist");
        assert_eq!(store.get_state().volume, 99);
    }

    #[test]
    fn file_storage_missing_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = FileStorage::new(dir.path());
        assert_eq!(files.load("absent").expect("load"), None);
        files.remove("absent").expect("remove missing");
        files.save("k", "{}").expect("save");
        assert_eq!(files.load("k").expect("load").as_deref(), Some("{}"));
    }

    #[test]
    fn file_storage_rejects_keys_outside_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = FileStorage::new(dir.path().join("state"));

        for key in ["../escape", "nested/key", "..", "", "a\\b"] {
            let err = files.save(key, "{}").expect_err("key should be rejected");
            assert!(
                matches!(&err, StoreError::Io { source, .. } if source.kind() == io::ErrorKind::InvalidInput),
                "key={key:?} err={err:?}"
            );
            assert!(files.load(key).is_err(), "key={key:?}");
            assert!(files.remove(key).is_err(), "key={key:?}");
        }
        assert!(!dir.path().join("escape.json").exists());
        assert!(!dir.path().join("state").exists());

        let store = Store::new(Prefs::default());
        assert!(persist(&store, files, "../escape").is_err());
    }
}
