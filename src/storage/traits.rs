//! Abstract storage trait for housemind.
//!
//! By using a trait, the engine runs unchanged over an in-memory backend
//! (tests, embedded use) or a file-backed backend (production). The contract
//! is deliberately small: whole-document JSON load and save, keyed by a
//! store-key string.

use serde_json::Value;
use thiserror::Error;

use crate::error::PreconditionError;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure (lock poisoning, map corruption, ...).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Filesystem I/O failure.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be parsed as JSON.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StorageError> for PreconditionError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

/// Key-value store over whole JSON documents.
///
/// # Safety considerations
/// - `save` must replace the previous document atomically; readers never
///   observe a partial write.
/// - Implementations must be safe to share across threads (`Send + Sync`);
///   the engine serializes writes by construction.
pub trait KvStore: Send + Sync {
    /// Loads the document stored under `key`, or `None` if never saved.
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Saves `value` under `key`, replacing any previous document.
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;
}
