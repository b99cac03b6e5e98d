//! Storage backends for housemind.
//!
//! Persistence is a single-writer key-value contract: each store key maps to
//! one JSON document, loaded wholesale on start and rewritten wholesale on
//! every mutation. Backends assume durability and fail only on I/O errors;
//! those failures are fatal for the calling operation and are not retried.

mod file;
mod memory;
mod traits;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use traits::{KvStore, StorageError};

/// Store key for the persisted signal mapping.
pub const MAPPING_STORE_KEY: &str = "housemind_mapping";

/// Store key for the persisted house-memory cache.
pub const HOUSE_MEMORY_STORE_KEY: &str = "housemind_house_memory";

/// Store key for the persisted chat history.
pub const CHAT_STORE_KEY: &str = "housemind_chat_history";
