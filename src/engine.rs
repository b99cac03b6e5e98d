//! The housemind engine: an explicitly owned service context.
//!
//! One engine is created at integration start and torn down at stop. It owns
//! the persisted stores and their in-memory caches and exposes every core
//! operation; host bindings (HTTP views, service handlers) are thin adapters
//! over these methods, built outside this crate. The engine is `Send + Sync`
//! but writes are sequential by construction of the host's event loop.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::Value;

use crate::chat::{ChatLog, ChatMessage, ChatPage, ChatQuery, ChatRole};
use crate::error::{HouseResult, PreconditionError};
use crate::mapping::{MappingStore, SignalMapping};
use crate::memory::{infer, HouseMemory};
use crate::signal::SignalRole;
use crate::snapshot::EntitySnapshot;
use crate::storage::{KvStore, HOUSE_MEMORY_STORE_KEY};
use crate::suggest::{suggest_all, suggestion_counts, Suggestion};

/// Session key used when a chat caller does not name one.
pub const DEFAULT_SESSION_KEY: &str = "main";

/// Number of role-confirm buttons the panel renders (one per signal role).
const CONFIRM_BUTTONS: usize = 4;

/// Diagnostics payload mirroring what the panel would render, for headless
/// verification without browser automation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSelfTest {
    /// Fixed count of confirm buttons.
    pub confirm_buttons: usize,
    /// Number of top-3 suggestion candidates per role.
    pub suggestion_counts_top3: BTreeMap<SignalRole, usize>,
    /// Whether the recommendations-v0 estimate would be shown.
    pub recommendations_v0_visible: bool,
    /// Human-readable reason backing the visibility decision.
    pub recommendations_v0_reason: String,
}

/// The dependency-injected core service context.
pub struct HouseEngine {
    store: Arc<dyn KvStore>,
    mapping: MappingStore,
    chat: ChatLog,
    house_memory: RwLock<Option<HouseMemory>>,
}

impl HouseEngine {
    /// Opens an engine over the given storage backend, hydrating the chat
    /// log and the last persisted house-memory computation.
    pub fn open(store: Arc<dyn KvStore>) -> HouseResult<Self> {
        let mapping = MappingStore::new(store.clone());
        let chat = ChatLog::open(store.clone())?;
        let house_memory = match store
            .load(HOUSE_MEMORY_STORE_KEY)
            .map_err(PreconditionError::from)?
        {
            Some(doc) => serde_json::from_value::<HouseMemory>(doc).ok(),
            None => None,
        };
        Ok(Self {
            store,
            mapping,
            chat,
            house_memory: RwLock::new(house_memory),
        })
    }

    fn lock_err() -> PreconditionError {
        PreconditionError::Storage {
            message: "poisoned house-memory cache lock".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Mapping
    // ------------------------------------------------------------------

    /// Returns the persisted mapping, empty if never set.
    pub fn mapping(&self) -> HouseResult<SignalMapping> {
        self.mapping.get()
    }

    /// Validates and persists an API-supplied mapping candidate.
    ///
    /// Only the keys the caller supplied are cleaned, returned, and
    /// persisted; the document is replaced wholesale.
    pub fn set_mapping(&self, candidate: &Value) -> HouseResult<SignalMapping> {
        let cleaned = SignalMapping::clean_partial(candidate)?;
        self.mapping.set(cleaned)
    }

    /// Service-path mapping update: all four roles explicitly present.
    pub fn set_mapping_normalized(&self, candidate: &Value) -> HouseResult<SignalMapping> {
        let cleaned = SignalMapping::clean_normalized(candidate)?;
        self.mapping.set(cleaned)
    }

    // ------------------------------------------------------------------
    // Suggestions
    // ------------------------------------------------------------------

    /// Top candidates per role for the given snapshot.
    #[must_use]
    pub fn suggestions(&self, snapshot: &EntitySnapshot) -> BTreeMap<SignalRole, Vec<Suggestion>> {
        suggest_all(snapshot)
    }

    // ------------------------------------------------------------------
    // House memory
    // ------------------------------------------------------------------

    /// The last computed house memory, empty if never refreshed.
    pub fn house_memory(&self) -> HouseResult<HouseMemory> {
        let guard = self.house_memory.read().map_err(|_| Self::lock_err())?;
        Ok(guard.clone().unwrap_or_default())
    }

    /// Recomputes house memory from a fresh snapshot, persisting the result
    /// as a cache of this computation.
    ///
    /// The confirmed mapping is re-consumed as strong evidence.
    pub fn refresh_house_memory(&self, snapshot: &EntitySnapshot) -> HouseResult<HouseMemory> {
        let mapping = self.mapping.get()?;
        let computed = infer(snapshot, &mapping);

        let doc = serde_json::to_value(&computed)
            .map_err(|e| PreconditionError::Storage { message: e.to_string() })?;
        self.store
            .save(HOUSE_MEMORY_STORE_KEY, &doc)
            .map_err(PreconditionError::from)?;

        let mut guard = self.house_memory.write().map_err(|_| Self::lock_err())?;
        *guard = Some(computed.clone());
        Ok(computed)
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Appends a chat message, defaulting the session to
    /// [`DEFAULT_SESSION_KEY`]. Returns `None` when a guardrail dropped it.
    pub fn append_chat(
        &self,
        role: ChatRole,
        text: &str,
        session_key: Option<&str>,
    ) -> HouseResult<Option<ChatMessage>> {
        let session = match session_key {
            Some(key) if !key.is_empty() => key,
            _ => DEFAULT_SESSION_KEY,
        };
        self.chat.append(role, text, session)
    }

    /// Fetches a page of chat history.
    pub fn chat_history(&self, query: &ChatQuery) -> HouseResult<ChatPage> {
        self.chat.fetch(query)
    }

    /// Fetches an older page and merges it into the live cache
    /// (see [`ChatLog::fetch_older_and_merge`]).
    pub fn chat_fetch_older(&self, query: &ChatQuery) -> HouseResult<ChatPage> {
        self.chat.fetch_older_and_merge(query)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Headless panel diagnostics over a fresh snapshot.
    pub fn panel_self_test(&self, snapshot: &EntitySnapshot) -> HouseResult<PanelSelfTest> {
        let mapping = self.mapping.get()?;
        let counts = suggestion_counts(snapshot);

        let (visible, reason) = match (mapping.get(SignalRole::Soc), mapping.get(SignalRole::Load))
        {
            (Some(soc_id), Some(load_id)) => {
                let soc = snapshot.get(soc_id).and_then(|st| st.numeric_state());
                let load = snapshot.get(load_id).and_then(|st| st.numeric_state());
                if soc.is_some() && load.is_some() {
                    (true, "soc+load numeric".to_string())
                } else {
                    // The panel still renders an informational item.
                    (true, "soc/load not numeric or not found".to_string())
                }
            }
            _ => (false, "soc/load not mapped".to_string()),
        };

        Ok(PanelSelfTest {
            confirm_buttons: CONFIRM_BUTTONS,
            suggestion_counts_top3: counts,
            recommendations_v0_visible: visible,
            recommendations_v0_reason: reason,
        })
    }
}
