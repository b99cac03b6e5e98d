//! # Housemind - Off-Grid Home Signal Core
//!
//! Housemind is the embeddable core of an off-grid home assistant: it maps
//! a home's entity registry onto a small set of power signals, infers which
//! energy subsystems the house actually has, and keeps a bounded, paged
//! chat history between the occupants and the agent.
//!
//! ## Core Concepts
//!
//! - **Signal role**: One of the four power signals a panel cares about
//!   (state of charge, battery voltage, solar input, house load)
//! - **Suggestion**: A scored candidate entity for a role, ranked by a
//!   keyword-and-unit heuristic over the entity snapshot
//! - **House memory**: Per-subsystem presence and confidence, inferred
//!   from keyword evidence and the confirmed mapping
//! - **Chat log**: Capped message history with cursor paging, delta
//!   fetches, and noise/echo/duplicate guardrails
//!
//! ## Usage
//!
//! ```rust,ignore
//! use housemind::{EntitySnapshot, EntityState, HouseEngine, MemoryKvStore};
//! use std::sync::Arc;
//!
//! let engine = HouseEngine::open(Arc::new(MemoryKvStore::new()))?;
//!
//! // Rank mapping candidates from a live entity snapshot
//! let snapshot: EntitySnapshot = [(
//!     "sensor.battery_soc".to_string(),
//!     EntityState::new("87").with_attribute("unit_of_measurement", "%"),
//! )]
//! .into_iter()
//! .collect();
//! let suggestions = engine.suggestions(&snapshot);
//!
//! // Recompute which subsystems this house has
//! let memory = engine.refresh_house_memory(&snapshot)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod signal;
pub mod snapshot;

// Scoring and inference
pub mod mapping;
pub mod memory;
pub mod suggest;

// Chat history
pub mod chat;

// Storage, engine, and the API boundary
pub mod api;
pub mod engine;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use chat::{ChatLog, ChatMessage, ChatPage, ChatQuery, ChatRole};
pub use engine::{HouseEngine, PanelSelfTest, DEFAULT_SESSION_KEY};
pub use error::{
    HouseError, HouseResult, PreconditionError, UpstreamError, ValidationError,
};
pub use mapping::{MappingStore, SignalMapping};
pub use memory::{HouseMemory, HouseMemoryEntry, Subsystem};
pub use signal::{SignalRole, SignalRule};
pub use snapshot::{EntitySnapshot, EntityState};
pub use storage::{FileKvStore, KvStore, MemoryKvStore, StorageError};
pub use suggest::{Suggestion, DEFAULT_SUGGESTION_LIMIT};
