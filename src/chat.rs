//! Append-only, session-partitioned chat history with cursor paging.
//!
//! The log is capped at 500 entries globally (oldest evicted) and persists
//! wholesale on every append. Fetching pages strictly backward through a
//! `before_id` cursor; an unknown cursor silently falls back to the full
//! filtered set. The merge-on-fetch path additionally re-hydrates the live
//! cache from the persisted document, so paging backward is a read with a
//! durable side effect — intentional, and kept for compatibility with
//! existing stored histories.
//!
//! Appends are guarded: internal control-traffic markers are filtered out,
//! a user message echoing the last agent message within ten seconds is
//! dropped as a relay echo, and a blake3 fingerprint over the normalized
//! text (bucketed to two seconds) deduplicates cross-source double writes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HouseResult, PreconditionError, ValidationError};
use crate::storage::{KvStore, CHAT_STORE_KEY};

/// Global cap on retained messages, across all sessions.
pub const CHAT_CAP: usize = 500;

/// Maximum page size accepted by a fetch.
pub const MAX_FETCH_LIMIT: usize = 500;

/// Window within which a user message matching the last agent message in the
/// same session is treated as a relay echo.
const ECHO_WINDOW_SECS: i64 = 10;

/// Fingerprint time-bucket width in seconds.
const FINGERPRINT_BUCKET_SECS: i64 = 2;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// A person typing in the panel.
    User,
    /// The assistant.
    Agent,
}

impl ChatRole {
    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    /// Parses a canonical role name, rejecting anything else.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            other => Err(ValidationError::InvalidRole {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chat history entry.
///
/// Within a session, ascending `id` equals ascending chronological order
/// equals append order. The id doubles as the pagination cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Monotonic id derived from a nanosecond timestamp; sort and cursor key.
    pub id: String,
    /// ISO-8601 UTC timestamp.
    pub ts: String,
    /// Message author.
    pub role: ChatRole,
    /// Session this message belongs to.
    pub session_key: String,
    /// Message body (never empty).
    pub text: String,
    /// Dedup fingerprint; absent on entries persisted by older versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// A page of chat history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPage {
    /// Page entries, oldest first.
    pub items: Vec<ChatMessage>,
    /// Whether older entries exist beyond this page (see [`ChatLog::fetch`]).
    pub has_older: bool,
}

/// Fetch parameters.
#[derive(Debug, Clone, Default)]
pub struct ChatQuery {
    /// Restrict to one session; `None` returns global history.
    pub session_key: Option<String>,
    /// Page size, clamped to `1..=500`.
    pub limit: usize,
    /// Backward cursor: return entries strictly before this id.
    pub before_id: Option<String>,
    /// Forward delta: return entries strictly newer than this timestamp.
    /// Takes precedence over `before_id` when both are set.
    pub after_ts: Option<String>,
}

/// Strictly-increasing message id generator.
///
/// Ids are nanoseconds since the epoch, bumped past the last issued value
/// so two appends in the same clock tick still order correctly.
#[derive(Debug, Default)]
struct MessageIdGen {
    last: AtomicU64,
}

impl MessageIdGen {
    fn next(&self) -> String {
        #[allow(clippy::cast_possible_truncation)]
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut issued = now;
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                issued = now.max(last + 1);
                Some(issued)
            });
        issued.to_string()
    }
}

fn noise_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"\bANNOUNCE_\w+\b").expect("static regex"),
            Regex::new(r"\b(HEARTBEAT_OK|NO_REPLY)\b").expect("static regex"),
            Regex::new(r"(?i)agent-to-agent announce").expect("static regex"),
        ]
    })
}

/// True when the text is internal control traffic that must never reach
/// user-visible history.
fn is_noise(text: &str) -> bool {
    noise_patterns().iter().any(|re| re.is_match(text))
}

/// Dedup fingerprint: whitespace-normalized text, bucketed to two seconds so
/// distinct repeats of the same line survive.
fn fingerprint(session_key: &str, role: ChatRole, text: &str, ts: &DateTime<Utc>) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let bucket = ts.timestamp().div_euclid(FINGERPRINT_BUCKET_SECS);
    let material = format!("{session_key}|{role}|{normalized}|{bucket}");
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

fn iso_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct LastAgentText {
    text: String,
    at: DateTime<Utc>,
}

/// The chat history cache: in-memory log plus persisted document.
///
/// Single writer by construction; interior locks only make the log safe to
/// share with host adapter threads.
pub struct ChatLog {
    store: Arc<dyn KvStore>,
    messages: RwLock<Vec<ChatMessage>>,
    id_gen: MessageIdGen,
    last_agent: RwLock<HashMap<String, LastAgentText>>,
}

impl ChatLog {
    /// Opens the log, hydrating the in-memory cache from the store.
    ///
    /// Entries that fail to parse (foreign writers, older formats) are
    /// silently dropped, matching the host's tolerant reads.
    pub fn open(store: Arc<dyn KvStore>) -> HouseResult<Self> {
        let loaded = store.load(CHAT_STORE_KEY).map_err(PreconditionError::from)?;
        let messages = match loaded {
            Some(Value::Array(raw)) => raw
                .into_iter()
                .filter_map(|v| serde_json::from_value::<ChatMessage>(v).ok())
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            store,
            messages: RwLock::new(messages),
            id_gen: MessageIdGen::default(),
            last_agent: RwLock::new(HashMap::new()),
        })
    }

    fn lock_err() -> PreconditionError {
        PreconditionError::Storage {
            message: "poisoned chat log lock".to_string(),
        }
    }

    fn persist(&self, messages: &[ChatMessage]) -> HouseResult<()> {
        let doc = serde_json::to_value(messages)
            .map_err(|e| PreconditionError::Storage { message: e.to_string() })?;
        self.store
            .save(CHAT_STORE_KEY, &doc)
            .map_err(PreconditionError::from)?;
        Ok(())
    }

    /// Appends a message, returning it, or `None` when the guardrails
    /// (noise filter, echo suppression, dedup) silently dropped it.
    ///
    /// Blank text is a validation error. Ids are strictly increasing across
    /// sequential appends. The log is persisted before returning, evicting
    /// the oldest entries beyond [`CHAT_CAP`] across all sessions.
    pub fn append(
        &self,
        role: ChatRole,
        text: &str,
        session_key: &str,
    ) -> HouseResult<Option<ChatMessage>> {
        self.append_with(role, text, session_key, None, None)
    }

    /// [`Self::append`] with caller-supplied id and timestamp, for replaying
    /// messages recorded elsewhere. A supplied id that already exists is
    /// dropped silently.
    pub fn append_with(
        &self,
        role: ChatRole,
        text: &str,
        session_key: &str,
        provided_id: Option<String>,
        provided_ts: Option<DateTime<Utc>>,
    ) -> HouseResult<Option<ChatMessage>> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyText.into());
        }
        if is_noise(text) {
            return Ok(None);
        }

        let ts = provided_ts.unwrap_or_else(Utc::now);

        // Relay echo: the panel sometimes reflects the agent's last line
        // back as user input.
        if role == ChatRole::User {
            let guard = self.last_agent.read().map_err(|_| Self::lock_err())?;
            if let Some(last) = guard.get(session_key) {
                if last.text == text && (ts - last.at).num_seconds() <= ECHO_WINDOW_SECS {
                    return Ok(None);
                }
            }
        }

        let id = provided_id.unwrap_or_else(|| self.id_gen.next());
        let fp = fingerprint(session_key, role, text, &ts);

        let message = ChatMessage {
            id,
            ts: iso_ts(&ts),
            role,
            session_key: session_key.to_string(),
            text: text.to_string(),
            fingerprint: Some(fp.clone()),
        };

        {
            let mut guard = self.messages.write().map_err(|_| Self::lock_err())?;
            let duplicate = guard.iter().any(|m| {
                m.id == message.id || m.fingerprint.as_deref() == Some(fp.as_str())
            });
            if duplicate {
                return Ok(None);
            }
            guard.push(message.clone());
            if guard.len() > CHAT_CAP {
                let excess = guard.len() - CHAT_CAP;
                guard.drain(..excess);
            }
            self.persist(&guard)?;
        }

        if role == ChatRole::Agent {
            let mut guard = self.last_agent.write().map_err(|_| Self::lock_err())?;
            guard.insert(
                session_key.to_string(),
                LastAgentText {
                    text: text.to_string(),
                    at: ts,
                },
            );
        }

        Ok(Some(message))
    }

    /// Fetches a page of history.
    ///
    /// Filtered to the query's session (global history when absent) and
    /// sorted oldest-first. With `after_ts`, returns entries strictly newer
    /// than the timestamp (forward delta, `has_older` always false). With
    /// `before_id`, candidates are everything strictly before that id — or
    /// the full filtered set when the id is unknown, a deliberate fallback
    /// rather than an error. The page is the most recent `limit` candidates
    /// in chronological order. `has_older` reports whether candidates were
    /// truncated; when a cursor was supplied and nothing was truncated it is
    /// false even if the filtered set has earlier entries, because callers
    /// paginate strictly one cursor step at a time.
    pub fn fetch(&self, query: &ChatQuery) -> HouseResult<ChatPage> {
        let guard = self.messages.read().map_err(|_| Self::lock_err())?;
        Ok(page_of(&guard, query))
    }

    /// Fetches an older page from the *persisted* document and merges it
    /// into the live cache by id, first seen wins, re-persisting capped at
    /// [`CHAT_CAP`].
    ///
    /// The returned page is the contract; the durable re-persist is an
    /// implementation choice that progressively re-hydrates history trimmed
    /// from the live cache.
    pub fn fetch_older_and_merge(&self, query: &ChatQuery) -> HouseResult<ChatPage> {
        let persisted = self
            .store
            .load(CHAT_STORE_KEY)
            .map_err(PreconditionError::from)?;
        let stored: Vec<ChatMessage> = match persisted {
            Some(Value::Array(raw)) => raw
                .into_iter()
                .filter_map(|v| serde_json::from_value::<ChatMessage>(v).ok())
                .collect(),
            _ => Vec::new(),
        };

        let page = page_of(&stored, query);

        let mut guard = self.messages.write().map_err(|_| Self::lock_err())?;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut merged: Vec<ChatMessage> = Vec::with_capacity(page.items.len() + guard.len());
        for message in page.items.iter().chain(guard.iter()) {
            if seen.insert(message.id.as_str()) {
                merged.push(message.clone());
            }
        }
        if merged.len() > CHAT_CAP {
            let excess = merged.len() - CHAT_CAP;
            merged.drain(..excess);
        }
        self.persist(&merged)?;
        *guard = merged;

        Ok(page)
    }

    /// Number of retained messages across all sessions.
    pub fn len(&self) -> HouseResult<usize> {
        let guard = self.messages.read().map_err(|_| Self::lock_err())?;
        Ok(guard.len())
    }

    /// Returns true when no messages are retained.
    pub fn is_empty(&self) -> HouseResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Pure paging over an in-memory message list.
fn page_of(messages: &[ChatMessage], query: &ChatQuery) -> ChatPage {
    let limit = query.limit.clamp(1, MAX_FETCH_LIMIT);

    let mut filtered: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| {
            query
                .session_key
                .as_deref()
                .map_or(true, |key| m.session_key == key)
        })
        .collect();
    // Deterministic paging regardless of how the document was merged.
    filtered.sort_by(|a, b| a.ts.cmp(&b.ts));

    if let Some(after_ts) = query.after_ts.as_deref() {
        let items: Vec<ChatMessage> = filtered
            .iter()
            .filter(|m| m.ts.as_str() > after_ts)
            .take(limit)
            .map(|m| (*m).clone())
            .collect();
        return ChatPage {
            items,
            has_older: false,
        };
    }

    let candidates: &[&ChatMessage] = match query.before_id.as_deref() {
        Some(before_id) => match filtered.iter().position(|m| m.id == before_id) {
            Some(idx) => &filtered[..idx],
            // Unknown cursor: fall back to everything available.
            None => &filtered[..],
        },
        None => &filtered[..],
    };

    let start = candidates.len().saturating_sub(limit);
    let items: Vec<ChatMessage> = candidates[start..].iter().map(|m| (*m).clone()).collect();

    let has_older = if query.before_id.is_some() {
        candidates.len() > items.len()
    } else {
        filtered.len() > items.len()
    };

    ChatPage { items, has_older }
}
