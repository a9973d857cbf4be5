//! Access/refresh token storage.
//!
//! # Design
//! `TokenStore` is the capability the session consumes; it never validates
//! or expires tokens. `StorageTokenStore` implements it over any
//! `KeyValueStore` using the `access_token` and `refresh_token` keys.
//! Storage failures are logged and swallowed: a token that cannot be
//! persisted simply is not there on the next read.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persistent string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }
}

/// A JSON object on disk. Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.load()?;
        f(&mut values);
        self.save(&values)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: &str);
    fn set_refresh_token(&self, token: &str);
    fn clear_tokens(&self);
}

#[derive(Debug)]
pub struct StorageTokenStore<S> {
    storage: S,
}

impl<S: KeyValueStore> StorageTokenStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read token");
                None
            }
        }
    }

    fn write(&self, key: &str, token: &str) {
        if let Err(e) = self.storage.set(key, token) {
            tracing::warn!(key, error = %e, "failed to store token");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::warn!(key, error = %e, "failed to remove token");
        }
    }
}

impl<S: KeyValueStore> TokenStore for StorageTokenStore<S> {
    fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    fn set_access_token(&self, token: &str) {
        tracing::debug!("access token updated");
        self.write(ACCESS_TOKEN_KEY, token);
    }

    fn set_refresh_token(&self, token: &str) {
        tracing::debug!("refresh token updated");
        self.write(REFRESH_TOKEN_KEY, token);
    }

    fn clear_tokens(&self) {
        tracing::debug!("tokens cleared");
        self.delete(ACCESS_TOKEN_KEY);
        self.delete(REFRESH_TOKEN_KEY);
    }
}
