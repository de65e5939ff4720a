//! Client-side key-value storage.
//!
//! Three backings sit behind one interface: a durable store that survives
//! restarts ([`FileStore`]), a store scoped to the running session
//! ([`MemoryStore`]), and a cookie jar ([`CookieJar`]). Values are stored as
//! strings; the typed helpers on `dyn KeyValueStore` encode them as JSON.

mod cookies;
mod file;
mod memory;

pub use cookies::{Cookie, CookieJar, DEFAULT_COOKIE_DAYS};
pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value for {key} is malformed: {source}")]
    Malformed { key: String, source: serde_json::Error },
    #[error("value for {key} could not be encoded: {source}")]
    Encode { key: String, source: serde_json::Error },
}

pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

impl dyn KeyValueStore {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Malformed { key: key.to_string(), source }),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)
            .map_err(|source| StorageError::Encode { key: key.to_string(), source })?;
        self.set_raw(key, &raw)
    }
}

/// The three backings a client works with.
#[derive(Clone)]
pub struct StorageService {
    pub local: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub cookies: Arc<CookieJar>,
}

impl StorageService {
    pub fn new(local: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>, cookies: Arc<CookieJar>) -> Self {
        Self { local, session, cookies }
    }

    /// Durable JSON file at `path`, fresh session store and cookie jar.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Result<Self, StorageError> {
        Ok(Self::new(
            Arc::new(FileStore::open(path)?),
            Arc::new(MemoryStore::new()),
            Arc::new(CookieJar::new()),
        ))
    }

    /// Everything in memory; nothing survives the process.
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()), Arc::new(CookieJar::new()))
    }
}
