//! Durable key-value store seam
//!
//! The engine persists two logical keys (the ledger and the session record),
//! each holding one serialized string. Anything that can store strings by
//! key can back it.

use crate::error::PersistenceError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// String key-value storage backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Replace the value under `key` as a whole
    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;

    /// Remove `key`; removing a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

/// In-memory store
///
/// Clones share the same entries, so a test can keep one handle and inspect
/// what the engine wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synchronous peek, for tests and diagnostics
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory
///
/// Writes land in a temporary sibling first and are renamed over the target,
/// so readers see either the old payload or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    ///
    /// # Errors
    /// - `PersistenceError::Io` if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "file store opened");
        Ok(Self { dir })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if valid {
            Ok(self.dir.join(format!("{key}.json")))
        } else {
            Err(PersistenceError::Backend(format!("invalid store key '{key}'")))
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(value.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
