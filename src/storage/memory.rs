//! In-memory storage backend.
//!
//! Thread-safe reference implementation of [`KvStore`], intended for tests
//! and embedded usage where durability is not required.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::storage::traits::{KvStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// A [`KvStore`] holding documents in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let guard = self.documents.read().map_err(|_| lock_err("load"))?;
        Ok(guard.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut guard = self.documents.write().map_err(|_| lock_err("save"))?;
        guard.insert(key.to_string(), value.clone());
        Ok(())
    }
}
