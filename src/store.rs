use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::Context;
use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// A persistent backend could not serve the request; the store should use
/// its in-memory tier instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage backend unavailable: {reason}")]
pub struct UseFallback {
    pub reason: String,
}

impl UseFallback {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for UseFallback {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

pub type BackendResult<T> = Result<T, UseFallback>;

/// String key/value storage scoped to one session.
pub trait StorageBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> BackendResult<()>;
    fn remove(&mut self, key: &str) -> BackendResult<()>;
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON object file holding every key of the session. Rewritten as a
/// whole on each write.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt session file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string(map)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        Ok(self.write_map(&map)?)
    }

    fn remove(&mut self, key: &str) -> BackendResult<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session store
// ---------------------------------------------------------------------------

/// Two-tier session storage: the persistent backend while it works, an
/// in-memory map for the rest of the process once it has failed.
///
/// The in-memory map mirrors every value the backend served or accepted, so
/// the switch keeps the last known state. None of the operations report
/// errors.
pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
    fallback: RefCell<HashMap<String, String>>,
    degraded: Cell<bool>,
}

impl SessionStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            fallback: RefCell::new(HashMap::new()),
            degraded: Cell::new(false),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::default())
    }

    /// Whether the store has switched to its in-memory tier.
    pub fn is_degraded(&self) -> bool {
        self.degraded.get()
    }

    fn degrade(&self, op: &str, key: &str, err: &UseFallback) {
        if !self.degraded.replace(true) {
            warn!("Session storage failed during {op} of '{key}' ({err}); using in-memory fallback");
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if !self.degraded.get() {
            match self.backend.get(key) {
                Ok(value) => {
                    trace!("store get {key} -> {value:?}");
                    self.mirror(key, value.as_deref());
                    return value;
                }
                Err(e) => self.degrade("get", key, &e),
            }
        }
        self.fallback.borrow().get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        if !self.degraded.get() {
            match self.backend.set(key, value) {
                Ok(()) => trace!("store set {key} = {value}"),
                Err(e) => self.degrade("set", key, &e),
            }
        }
        self.mirror(key, Some(value));
    }

    pub fn remove(&mut self, key: &str) {
        if !self.degraded.get() {
            match self.backend.remove(key) {
                Ok(()) => trace!("store remove {key}"),
                Err(e) => self.degrade("remove", key, &e),
            }
        }
        self.mirror(key, None);
    }

    fn mirror(&self, key: &str, value: Option<&str>) {
        let mut fallback = self.fallback.borrow_mut();
        match value {
            Some(v) => fallback.insert(key.to_string(), v.to_string()),
            None => fallback.remove(key),
        };
    }

    /// Decode a JSON value. Missing or malformed data yields `None`.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Ignoring malformed value under '{key}': {e}");
                None
            }
        }
    }

    pub fn load_json_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        self.load_json(key).unwrap_or(fallback)
    }

    pub fn save_json<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, &raw),
            Err(e) => debug!("Not saving '{key}': {e}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Backend whose every call fails, like storage disabled in privacy mode.
    pub(crate) struct BrokenBackend;

    impl StorageBackend for BrokenBackend {
        fn get(&self, _key: &str) -> BackendResult<Option<String>> {
            Err(UseFallback::new("disabled"))
        }
        fn set(&mut self, _key: &str, _value: &str) -> BackendResult<()> {
            Err(UseFallback::new("quota exceeded"))
        }
        fn remove(&mut self, _key: &str) -> BackendResult<()> {
            Err(UseFallback::new("disabled"))
        }
    }

    /// Backend that accepts `healthy_writes` writes and then fails for good.
    pub(crate) struct FlakyBackend {
        inner: MemoryBackend,
        healthy_writes: usize,
        failed: bool,
    }

    impl FlakyBackend {
        pub(crate) fn new(healthy_writes: usize) -> Self {
            Self {
                inner: MemoryBackend::default(),
                healthy_writes,
                failed: false,
            }
        }

        fn spend(&mut self) -> BackendResult<()> {
            if self.healthy_writes == 0 {
                self.failed = true;
                return Err(UseFallback::new("quota exceeded"));
            }
            self.healthy_writes -= 1;
            Ok(())
        }
    }

    impl StorageBackend for FlakyBackend {
        fn get(&self, key: &str) -> BackendResult<Option<String>> {
            if self.failed {
                return Err(UseFallback::new("disabled"));
            }
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> BackendResult<()> {
            self.spend()?;
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) -> BackendResult<()> {
            self.spend()?;
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_fallback_keeps_values_written_before_failure() {
        let mut store = SessionStore::new(FlakyBackend::new(2));
        store.set("a", "1");
        store.set("b", "2");
        assert!(!store.is_degraded());

        store.set("c", "3");
        assert!(store.is_degraded());
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b").as_deref(), Some("2"));
        assert_eq!(store.get("c").as_deref(), Some("3"));

        store.remove("a");
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_memory_round_trip_and_remove() {
        let mut store = SessionStore::in_memory();
        assert_eq!(store.get("k"), None);
        store.set("k", "v");
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k");
        assert_eq!(store.get("k"), None);
        assert!(!store.is_degraded());
    }

    #[test]
    fn test_broken_backend_falls_back_to_memory() {
        let mut store = SessionStore::new(BrokenBackend);
        store.set("k", "v");
        assert!(store.is_degraded());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_malformed_json_reads_as_fallback() {
        let mut store = SessionStore::in_memory();
        store.set("hist", "[{not json");
        let hist: Vec<u32> = store.load_json_or("hist", Vec::new());
        assert!(hist.is_empty());
        assert_eq!(store.load_json::<Vec<u32>>("absent"), None);

        store.save_json("hist", &vec![1u32, 2]);
        assert_eq!(store.load_json_or("hist", Vec::<u32>::new()), vec![1, 2]);
    }

    #[test]
    fn test_file_backend_persists_across_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = SessionStore::new(FileBackend::new(&path));
        store.set("a", "1");
        store.set("b", "2");
        store.remove("a");

        let reopened = SessionStore::new(FileBackend::new(&path));
        assert_eq!(reopened.get("a"), None);
        assert_eq!(reopened.get("b").as_deref(), Some("2"));
        assert!(!reopened.is_degraded());
    }

    #[test]
    fn test_corrupt_file_degrades_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();

        let mut store = SessionStore::new(FileBackend::new(&path));
        assert_eq!(store.get("a"), None);
        assert!(store.is_degraded());
        store.set("a", "1");
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
    }
}
