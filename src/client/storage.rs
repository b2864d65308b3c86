//! Local credential storage
//!
//! Async key-value storage on the client device plus the [`Session`] helper
//! that knows which keys hold the signed-in user's credential.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Key holding the bearer token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// Key holding the signed-in user's profile record.
pub const USER_DATA_KEY: &str = "userData";

// == Storage Error ==
/// Failures of the local key-value store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document is not valid JSON
    #[error("storage document is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    /// The store cannot be reached at all
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// == Key Value Store ==
/// Minimal async key-value contract used by the request pipeline.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes several keys in one operation.
    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}

// == Memory Storage ==
/// Process-local storage, contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

// == File Storage ==
/// Storage persisted as a single JSON object on disk.
///
/// Every mutation rewrites the whole document; a missing file reads as empty.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStorage {
    /// Opens storage backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.multi_remove(&[key]).await
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.save(&entries).await
    }
}

// == Session ==
/// The signed-in user's credential as kept in local storage.
///
/// Login writes it, every request reads it, logout or a 401 clears it.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn KeyValueStore>,
}

impl Session {
    /// Wraps the given storage.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Underlying storage.
    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Persists the credential and profile after a successful login.
    pub async fn save(&self, token: &str, user_data: &Value) -> Result<(), StorageError> {
        self.storage.set(AUTH_TOKEN_KEY, token).await?;
        self.storage
            .set(USER_DATA_KEY, &serde_json::to_string(user_data)?)
            .await
    }

    /// Current bearer token, if any.
    pub async fn token(&self) -> Result<Option<String>, StorageError> {
        self.storage.get(AUTH_TOKEN_KEY).await
    }

    /// Stored profile record, if any.
    pub async fn user_data(&self) -> Result<Option<Value>, StorageError> {
        match self.storage.get(USER_DATA_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Removes the credential and profile (logout, or a 401).
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.storage
            .multi_remove(&[AUTH_TOKEN_KEY, USER_DATA_KEY])
            .await
    }
}
