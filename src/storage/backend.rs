//! Key-value backends
//!
//! The store only needs string values under string keys, the same contract
//! a browser's `localStorage` offers. Two implementations:
//!
//! - [`MemoryBackend`]: a map behind a mutex, for tests and embedding
//! - [`FileBackend`]: one file per key inside a data directory; writes go to
//!   a temporary file first and are renamed into place
//!
//! Both support [`KeyValueBackend::compare_and_set`], which the store's
//! `update` relies on to never overwrite a value it has not seen.

use crate::storage::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// String key-value storage shared by every reader and writer of the store
pub trait KeyValueBackend: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`; deleting an absent key is not an error
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Write `value` only if the stored value is still `expected`
    /// (`None` meaning absent). Returns whether the write happened. The
    /// check and the write are one atomic step for every writer sharing
    /// this storage.
    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool>;
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire memory backend lock: {}", e)))
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

/// Directory-backed backend: key `k` lives in `<dir>/k.json`
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = ?dir, "Opened file backend");
        Ok(Self { dir })
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Take the advisory lock guarding `key`; released when the returned
    /// file is dropped. Held per open handle, so it also excludes other
    /// backends in this process.
    fn lock_key(&self, key: &str) -> StoreResult<fs::File> {
        validate_key(key)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(format!("{}.lock", key)))?;
        file.lock()?;
        Ok(file)
    }

    fn read(&self, path: &Path) -> StoreResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, key: &str, path: &Path, value: &str) -> StoreResult<()> {
        let tmp = self
            .dir
            .join(format!("{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        self.read(&path)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let _lock = self.lock_key(key)?;
        self.write_atomic(key, &path, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let _lock = self.lock_key(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        let _lock = self.lock_key(key)?;
        if self.read(&path)?.as_deref() != expected {
            return Ok(false);
        }
        self.write_atomic(key, &path, value)?;
        Ok(true)
    }
}

/// Keys become file names, so only a conservative character set is allowed
fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
