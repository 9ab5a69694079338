//! Token storage: the one piece of session state that outlives the
//! controller.
//!
//! The token is the session id. Its presence means "a session was once
//! established here"; its absence means "logged out", regardless of what
//! the controller has in memory. Every operation is a single get, set, or
//! remove, never a partial update.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::NamedTempFile;
use tenure_protocol::{Codec, JsonCodec};
use tracing::{debug, warn};

use crate::StoreError;

/// Key/value storage for the session token.
///
/// Synchronous on purpose: every operation is a single small read or
/// write, like a browser's per-tab session storage.
pub trait TokenStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes `key`. Removing a missing key is a no-op.
    fn remove(&self, key: &str);
}

impl<T: TokenStore> TokenStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value);
    }

    fn remove(&self, key: &str) {
        (**self).remove(key);
    }
}

/// Recovers the guard from a poisoned lock. The maps hold plain strings,
/// so a panic mid-operation can't leave them inconsistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-process token store.
///
/// Clones share the same map, so a token written by one controller is
/// seen by the next controller created in the same process, which is
/// the "survives a reload within the same tab" behavior.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.entries).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.entries).remove(key);
    }
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// Token store persisted as a JSON object in a file.
///
/// Each `set`/`remove` rewrites the whole file through a sibling temp file
/// followed by a rename, so readers see either the old map or the new
/// one. A missing file is an empty store.
///
/// The [`TokenStore`] impl never fails: read errors are logged and treated
/// as "no token" (which fails closed to logged-out), write errors are
/// logged and dropped. Use the `try_*` methods to observe them.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    codec: JsonCodec,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: JsonCodec,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `key`, surfacing I/O and format errors.
    pub fn try_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.load()?;
        Ok(entries.remove(key))
    }

    /// Writes `key`, surfacing I/O and format errors.
    pub fn try_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    /// Removes `key`, surfacing I/O and format errors.
    ///
    /// A corrupt file is replaced rather than reported, since the
    /// caller's intent (no token under `key`) is still satisfied.
    pub fn try_remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let (mut entries, corrupt) = match self.load() {
            Ok(entries) => (entries, false),
            Err(StoreError::Corrupt { .. }) => (BTreeMap::new(), true),
            Err(e) => return Err(e),
        };
        if entries.remove(key).is_some() || corrupt {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        self.codec
            .decode(&bytes)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let bytes = self.codec.encode(entries).map_err(StoreError::Encode)?;
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        // Same directory as the target so the final rename stays atomic.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        debug!(path = %self.path.display(), keys = entries.len(), "token store saved");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.try_get(key).unwrap_or_else(|e| {
            warn!(error = %e, key, "token store read failed, treating as absent");
            None
        })
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.try_set(key, value) {
            warn!(error = %e, key, "token store write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.try_remove(key) {
            warn!(error = %e, key, "token store remove failed");
        }
    }
}
