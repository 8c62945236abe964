//! Persistence of resource handles and last-known remote snapshots between
//! invocations.
//!
//! The engine only defines the [`StateStore`] contract; the storage format
//! belongs to the host. The bundled file store keeps one JSON document per
//! resource under a state directory, accessed through capability-scoped
//! directory handles.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::state::{RemoteState, ResourceHandle};

/// Persisted view of a managed resource.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Identity of the resource.
    pub handle: ResourceHandle,
    /// Remote state as of the last successful fetch.
    pub remote: RemoteState,
}

/// Host-owned persistence for handles and snapshots.
pub trait StateStore: Send + Sync {
    /// Recalls the snapshot stored for a resource, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the backing storage fails.
    fn load(&self, type_name: &str, name: &str) -> Result<Option<StateSnapshot>, EngineError>;

    /// Persists a snapshot under the caller's local name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the backing storage fails.
    fn save(&self, name: &str, snapshot: &StateSnapshot) -> Result<(), EngineError>;

    /// Forgets a stored snapshot. Removing an absent entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the backing storage fails.
    fn remove(&self, type_name: &str, name: &str) -> Result<(), EngineError>;
}

impl<S: StateStore> StateStore for std::sync::Arc<S> {
    fn load(&self, type_name: &str, name: &str) -> Result<Option<StateSnapshot>, EngineError> {
        S::load(self, type_name, name)
    }

    fn save(&self, name: &str, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        S::save(self, name, snapshot)
    }

    fn remove(&self, type_name: &str, name: &str) -> Result<(), EngineError> {
        S::remove(self, type_name, name)
    }
}

/// File-backed store: one JSON document per resource.
#[derive(Clone, Debug)]
pub struct FileStateStore {
    dir: Utf8PathBuf,
}

impl FileStateStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first save.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_name(type_name: &str, name: &str) -> String {
        format!("{type_name}.{name}.json")
    }

    fn open_dir(&self) -> Result<Option<Dir>, EngineError> {
        match Dir::open_ambient_dir(&self.dir, ambient_authority()) {
            Ok(dir) => Ok(Some(dir)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(store_error(&self.dir, &err)),
        }
    }
}

fn store_error(path: &Utf8Path, err: &dyn std::fmt::Display) -> EngineError {
    EngineError::Store {
        message: format!("{path}: {err}"),
    }
}

impl StateStore for FileStateStore {
    fn load(&self, type_name: &str, name: &str) -> Result<Option<StateSnapshot>, EngineError> {
        let Some(dir) = self.open_dir()? else {
            return Ok(None);
        };
        let document = Self::document_name(type_name, name);
        let contents = match dir.read_to_string(&document) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(store_error(&self.dir.join(&document), &err)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| store_error(&self.dir.join(&document), &err))
    }

    fn save(&self, name: &str, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        Dir::create_ambient_dir_all(&self.dir, ambient_authority())
            .map_err(|err| store_error(&self.dir, &err))?;
        let dir = Dir::open_ambient_dir(&self.dir, ambient_authority())
            .map_err(|err| store_error(&self.dir, &err))?;

        let document = Self::document_name(snapshot.handle.type_name(), name);
        let rendered = serde_json::to_string_pretty(snapshot)
            .map_err(|err| store_error(&self.dir.join(&document), &err))?;
        dir.write(&document, rendered)
            .map_err(|err| store_error(&self.dir.join(&document), &err))
    }

    fn remove(&self, type_name: &str, name: &str) -> Result<(), EngineError> {
        let Some(dir) = self.open_dir()? else {
            return Ok(());
        };
        let document = Self::document_name(type_name, name);
        match dir.remove_file(&document) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(store_error(&self.dir.join(&document), &err)),
        }
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<BTreeMap<String, StateSnapshot>>,
}

impl MemoryStateStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(type_name: &str, name: &str) -> String {
        format!("{type_name}/{name}")
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, type_name: &str, name: &str) -> Result<Option<StateSnapshot>, EngineError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&Self::key(type_name, name)).cloned())
    }

    fn save(&self, name: &str, snapshot: &StateSnapshot) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            Self::key(snapshot.handle.type_name(), name),
            snapshot.clone(),
        );
        Ok(())
    }

    fn remove(&self, type_name: &str, name: &str) -> Result<(), EngineError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(&Self::key(type_name, name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use tempfile::TempDir;

    fn snapshot(name: &str) -> StateSnapshot {
        let mut identity = BTreeMap::new();
        identity.insert(String::from("project"), String::from("myproj"));
        identity.insert(String::from("name"), String::from(name));
        let mut remote = RemoteState::new();
        remote.set("name", FieldValue::from(name));
        remote.set("enable_logging", FieldValue::Bool(true));
        StateSnapshot {
            handle: ResourceHandle::new(String::from("dns_policy"), identity),
            remote,
        }
    }

    fn temp_store(tmp: &TempDir) -> FileStateStore {
        let dir = Utf8PathBuf::from_path_buf(tmp.path().join("state"))
            .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
        FileStateStore::new(dir)
    }

    #[test]
    fn file_store_round_trips_snapshots() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let store = temp_store(&tmp);
        let original = snapshot("pol1");

        store
            .save("pol1", &original)
            .unwrap_or_else(|err| panic!("save: {err}"));
        let loaded = store
            .load("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(loaded, Some(original));
    }

    #[test]
    fn file_store_load_of_missing_entry_is_none() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let store = temp_store(&tmp);
        let loaded = store
            .load("dns_policy", "missing")
            .unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(loaded, None);
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let store = temp_store(&tmp);
        store
            .save("pol1", &snapshot("pol1"))
            .unwrap_or_else(|err| panic!("save: {err}"));

        store
            .remove("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("first remove: {err}"));
        store
            .remove("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("second remove: {err}"));
        let loaded = store
            .load("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(loaded, None);
    }

    #[test]
    fn memory_store_round_trips_snapshots() {
        let store = MemoryStateStore::new();
        store
            .save("pol1", &snapshot("pol1"))
            .unwrap_or_else(|err| panic!("save: {err}"));
        let loaded = store
            .load("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(loaded, Some(snapshot("pol1")));
        store
            .remove("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("remove: {err}"));
        let removed = store
            .load("dns_policy", "pol1")
            .unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(removed, None);
    }
}
