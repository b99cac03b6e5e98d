//! The presentation/API boundary: tagged request and response records.
//!
//! Host bindings (HTTP views, service handlers) deserialize into these
//! records, call the matching handler function over the engine, and
//! serialize whatever comes back. Field names are wire contract — existing
//! panels depend on them. Handlers validate explicitly and return a
//! discriminated result; failures carry an HTTP-ish status so adapters do
//! not have to re-derive one from the error text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{ChatMessage, ChatQuery, ChatRole};
use crate::engine::{HouseEngine, PanelSelfTest};
use crate::error::{HouseError, PreconditionError};
use crate::mapping::SignalMapping;
use crate::memory::HouseMemory;
use crate::snapshot::EntitySnapshot;

/// Page size used when a chat-history request does not carry one.
pub const DEFAULT_CHAT_LIMIT: usize = 50;

/// Error body returned on any failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Always false.
    pub ok: bool,
    /// Human-readable failure description.
    pub error: String,
}

/// A failed API call: status code plus structured body.
///
/// Persisted state is never affected by a failed call; there are no
/// partial writes to roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// HTTP-shaped status (400 validation, 500 precondition, 502 upstream).
    pub status: u16,
    /// Response body.
    pub body: ErrorBody,
}

impl From<HouseError> for ApiFailure {
    fn from(err: HouseError) -> Self {
        let status = match &err {
            HouseError::Validation(_) => 400,
            HouseError::Precondition(_) => 500,
            HouseError::Upstream(_) => 502,
        };
        Self {
            status,
            body: ErrorBody {
                ok: false,
                error: err.to_string(),
            },
        }
    }
}

/// Result alias for API handlers.
pub type ApiResult<T> = Result<T, ApiFailure>;

/// `GET mapping` / `POST mapping` success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingResponse {
    /// Always true.
    pub ok: bool,
    /// The (cleaned) mapping.
    pub mapping: SignalMapping,
}

/// `GET house_memory` success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseMemoryResponse {
    /// Always true.
    pub ok: bool,
    /// The last computed summary.
    pub house_memory: HouseMemory,
}

/// `GET chat_history` success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatHistoryResponse {
    /// Always true.
    pub ok: bool,
    /// Page entries, oldest first.
    pub items: Vec<ChatMessage>,
    /// Whether another backward page exists.
    pub has_older: bool,
}

/// Chat append success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAppendResponse {
    /// Always true.
    pub ok: bool,
    /// The stored message, or `None` when a guardrail dropped it.
    pub item: Option<ChatMessage>,
}

/// Panel self-test success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestResponse {
    /// Always true.
    pub ok: bool,
    /// Diagnostics payload.
    pub panel: PanelSelfTest,
}

/// `POST mapping` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SetMappingRequest {
    /// Candidate mapping object.
    pub mapping: Option<Value>,
}

/// Chat append request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatAppendRequest {
    /// `user` or `agent`.
    pub role: String,
    /// Message body.
    pub text: String,
    /// Target session; defaults when absent.
    #[serde(default)]
    pub session_key: Option<String>,
}

/// `GET chat_history` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistoryRequest {
    /// Page size, clamped to `1..=500`; defaults to [`DEFAULT_CHAT_LIMIT`].
    #[serde(default)]
    pub limit: Option<usize>,
    /// Restrict to one session.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Backward cursor.
    #[serde(default)]
    pub before_id: Option<String>,
    /// Forward delta boundary.
    #[serde(default)]
    pub after_ts: Option<String>,
}

impl ChatHistoryRequest {
    fn to_query(&self) -> ChatQuery {
        ChatQuery {
            session_key: self.session_key.clone(),
            limit: self.limit.unwrap_or(DEFAULT_CHAT_LIMIT).clamp(1, 500),
            before_id: self.before_id.clone(),
            after_ts: self.after_ts.clone(),
        }
    }
}

fn require_engine<'a>(
    engine: Option<&'a HouseEngine>,
    store: &'static str,
) -> ApiResult<&'a HouseEngine> {
    engine.ok_or_else(|| {
        ApiFailure::from(HouseError::from(PreconditionError::StoreNotInitialized {
            store,
        }))
    })
}

/// `GET mapping`.
pub fn get_mapping(engine: Option<&HouseEngine>) -> ApiResult<MappingResponse> {
    let engine = require_engine(engine, "mapping")?;
    let mapping = engine.mapping()?;
    Ok(MappingResponse { ok: true, mapping })
}

/// `POST mapping`: validates and persists, returning the cleaned mapping.
pub fn set_mapping(
    engine: Option<&HouseEngine>,
    request: &SetMappingRequest,
) -> ApiResult<MappingResponse> {
    let engine = require_engine(engine, "mapping")?;
    let candidate = request.mapping.as_ref().ok_or_else(|| {
        ApiFailure::from(HouseError::from(crate::error::ValidationError::MissingField {
            field: "mapping".to_string(),
        }))
    })?;
    let mapping = engine.set_mapping(candidate)?;
    Ok(MappingResponse { ok: true, mapping })
}

/// Service-path mapping update: the stored document always carries all four
/// roles explicitly.
pub fn set_mapping_service(
    engine: Option<&HouseEngine>,
    candidate: &Value,
) -> ApiResult<MappingResponse> {
    let engine = require_engine(engine, "mapping")?;
    let mapping = engine.set_mapping_normalized(candidate)?;
    Ok(MappingResponse { ok: true, mapping })
}

/// `GET house_memory`.
pub fn get_house_memory(engine: Option<&HouseEngine>) -> ApiResult<HouseMemoryResponse> {
    let engine = require_engine(engine, "house memory")?;
    let house_memory = engine.house_memory()?;
    Ok(HouseMemoryResponse {
        ok: true,
        house_memory,
    })
}

/// Service-path house-memory refresh over a fresh snapshot.
pub fn refresh_house_memory(
    engine: Option<&HouseEngine>,
    snapshot: &EntitySnapshot,
) -> ApiResult<HouseMemoryResponse> {
    let engine = require_engine(engine, "house memory")?;
    let house_memory = engine.refresh_house_memory(snapshot)?;
    Ok(HouseMemoryResponse {
        ok: true,
        house_memory,
    })
}

/// `GET chat_history`.
pub fn get_chat_history(
    engine: Option<&HouseEngine>,
    request: &ChatHistoryRequest,
) -> ApiResult<ChatHistoryResponse> {
    let engine = require_engine(engine, "chat history")?;
    let page = engine.chat_history(&request.to_query())?;
    Ok(ChatHistoryResponse {
        ok: true,
        items: page.items,
        has_older: page.has_older,
    })
}

/// Backward-page fetch that also merges the page into the live cache
/// (the panel's "load older" path).
pub fn chat_fetch_older(
    engine: Option<&HouseEngine>,
    request: &ChatHistoryRequest,
) -> ApiResult<ChatHistoryResponse> {
    let engine = require_engine(engine, "chat history")?;
    let page = engine.chat_fetch_older(&request.to_query())?;
    Ok(ChatHistoryResponse {
        ok: true,
        items: page.items,
        has_older: page.has_older,
    })
}

/// Service-path chat append.
pub fn append_chat(
    engine: Option<&HouseEngine>,
    request: &ChatAppendRequest,
) -> ApiResult<ChatAppendResponse> {
    let engine = require_engine(engine, "chat history")?;
    let role = ChatRole::parse(&request.role).map_err(HouseError::from)?;
    let item = engine.append_chat(role, &request.text, request.session_key.as_deref())?;
    Ok(ChatAppendResponse { ok: true, item })
}

/// Headless panel diagnostics.
pub fn panel_self_test(
    engine: Option<&HouseEngine>,
    snapshot: &EntitySnapshot,
) -> ApiResult<SelfTestResponse> {
    let engine = require_engine(engine, "mapping")?;
    let panel = engine.panel_self_test(snapshot)?;
    Ok(SelfTestResponse { ok: true, panel })
}
