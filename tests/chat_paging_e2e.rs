use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use housemind::chat::CHAT_CAP;
use housemind::{ChatLog, ChatQuery, ChatRole, FileKvStore, MemoryKvStore};

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_720_000_000 + secs, 0).unwrap()
}

fn query(limit: usize) -> ChatQuery {
    ChatQuery {
        session_key: Some("panel".to_string()),
        limit,
        before_id: None,
        after_ts: None,
    }
}

/// Five alternating messages m1..m5 in one session.
fn seeded_log() -> ChatLog {
    let log = ChatLog::open(Arc::new(MemoryKvStore::new())).unwrap();
    for i in 1..=5 {
        let role = if i % 2 == 0 {
            ChatRole::Agent
        } else {
            ChatRole::User
        };
        log.append_with(
            role,
            &format!("message {i}"),
            "panel",
            Some(format!("m{i}")),
            Some(ts(i * 10)),
        )
        .unwrap()
        .unwrap();
    }
    log
}

fn ids(items: &[housemind::ChatMessage]) -> Vec<&str> {
    items.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn backward_cursor_walks_the_whole_history() {
    let log = seeded_log();

    // Newest page first.
    let page = log.fetch(&query(2)).unwrap();
    assert_eq!(ids(&page.items), ["m4", "m5"]);
    assert!(page.has_older);

    // Walk backwards from the oldest id of each page.
    let mut older = query(2);
    older.before_id = Some("m4".to_string());
    let page = log.fetch(&older).unwrap();
    assert_eq!(ids(&page.items), ["m2", "m3"]);
    assert!(page.has_older);

    older.before_id = Some("m2".to_string());
    let page = log.fetch(&older).unwrap();
    assert_eq!(ids(&page.items), ["m1"]);
    assert!(!page.has_older);
}

#[test]
fn unknown_cursor_falls_back_to_the_newest_page() {
    let log = seeded_log();
    let mut q = query(2);
    q.before_id = Some("evicted-long-ago".to_string());

    let page = log.fetch(&q).unwrap();
    assert_eq!(ids(&page.items), ["m4", "m5"]);
    assert!(page.has_older);
}

#[test]
fn after_ts_returns_only_the_delta() {
    let log = seeded_log();
    let marker = log.fetch(&query(5)).unwrap().items[2].ts.clone();

    let mut q = query(50);
    q.after_ts = Some(marker);
    // A stale cursor is ignored once a delta boundary is given.
    q.before_id = Some("m2".to_string());

    let page = log.fetch(&q).unwrap();
    assert_eq!(ids(&page.items), ["m4", "m5"]);
    assert!(!page.has_older);
}

#[test]
fn sessions_do_not_leak_into_each_other() {
    let log = seeded_log();
    log.append_with(
        ChatRole::User,
        "kitchen ping",
        "kitchen",
        Some("k1".to_string()),
        Some(ts(100)),
    )
    .unwrap()
    .unwrap();

    let page = log.fetch(&query(50)).unwrap();
    assert_eq!(page.items.len(), 5);
    assert!(page.items.iter().all(|m| m.session_key == "panel"));

    // No session filter returns the global history.
    let all = log
        .fetch(&ChatQuery {
            session_key: None,
            limit: 50,
            before_id: None,
            after_ts: None,
        })
        .unwrap();
    assert_eq!(all.items.len(), 6);
}

#[test]
fn protocol_noise_never_reaches_the_log() {
    let log = ChatLog::open(Arc::new(MemoryKvStore::new())).unwrap();
    for text in [
        "ANNOUNCE_SOLAR back online",
        "HEARTBEAT_OK",
        "NO_REPLY",
        "Agent-to-agent announce: pump cycling",
    ] {
        let stored = log
            .append_with(ChatRole::Agent, text, "panel", None, Some(ts(0)))
            .unwrap();
        assert!(stored.is_none(), "{text} should have been dropped");
    }
    assert!(log.is_empty().unwrap());
}

#[test]
fn relay_echo_is_suppressed_inside_the_window() {
    let log = ChatLog::open(Arc::new(MemoryKvStore::new())).unwrap();
    log.append_with(
        ChatRole::Agent,
        "Turning on the water pump.",
        "panel",
        Some("a1".to_string()),
        Some(ts(0)),
    )
    .unwrap()
    .unwrap();

    // The panel reflects the agent's line back as user input.
    let echo = log
        .append_with(
            ChatRole::User,
            "Turning on the water pump.",
            "panel",
            None,
            Some(ts(5)),
        )
        .unwrap();
    assert!(echo.is_none());

    // The same words typed later are a genuine message.
    let late = log
        .append_with(
            ChatRole::User,
            "Turning on the water pump.",
            "panel",
            None,
            Some(ts(60)),
        )
        .unwrap();
    assert!(late.is_some());
}

#[test]
fn duplicate_delivery_is_dropped_by_fingerprint() {
    let log = ChatLog::open(Arc::new(MemoryKvStore::new())).unwrap();
    log.append_with(
        ChatRole::User,
        "battery status?",
        "panel",
        Some("u1".to_string()),
        Some(ts(0)),
    )
    .unwrap()
    .unwrap();

    // Same text, role, session and time bucket under a different id.
    let dup = log
        .append_with(
            ChatRole::User,
            "battery status?",
            "panel",
            Some("u2".to_string()),
            Some(ts(0)),
        )
        .unwrap();
    assert!(dup.is_none());
    assert_eq!(log.len().unwrap(), 1);
}

#[test]
fn cap_evicts_the_oldest_across_sessions() {
    let log = ChatLog::open(Arc::new(MemoryKvStore::new())).unwrap();
    let extra = 3;
    for i in 0..CHAT_CAP + extra {
        let session = if i % 2 == 0 { "panel" } else { "kitchen" };
        log.append_with(
            ChatRole::User,
            &format!("entry {i}"),
            session,
            Some(format!("id{i:05}")),
            Some(ts(i as i64)),
        )
        .unwrap()
        .unwrap();
    }

    assert_eq!(log.len().unwrap(), CHAT_CAP);

    let all = log
        .fetch(&ChatQuery {
            session_key: None,
            limit: 500,
            before_id: None,
            after_ts: None,
        })
        .unwrap();
    assert_eq!(all.items.first().unwrap().id, format!("id{extra:05}"));
    assert_eq!(
        all.items.last().unwrap().id,
        format!("id{:05}", CHAT_CAP + extra - 1)
    );
}

#[test]
fn merge_fetch_pages_and_keeps_the_cache_coherent() {
    let log = seeded_log();

    let mut q = query(2);
    q.before_id = Some("m5".to_string());
    let page = log.fetch_older_and_merge(&q).unwrap();
    assert_eq!(ids(&page.items), ["m3", "m4"]);
    assert!(page.has_older);

    // The cache still serves the full history afterwards.
    let full = log.fetch(&query(50)).unwrap();
    assert_eq!(full.items.len(), 5);
}

#[test]
fn history_survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FileKvStore::open(dir.path()).unwrap());
        let log = ChatLog::open(store).unwrap();
        for i in 1..=3 {
            log.append_with(
                ChatRole::User,
                &format!("note {i}"),
                "panel",
                Some(format!("m{i}")),
                Some(ts(i * 10)),
            )
            .unwrap()
            .unwrap();
        }
    }

    let store = Arc::new(FileKvStore::open(dir.path()).unwrap());
    let reopened = ChatLog::open(store).unwrap();
    let page = reopened.fetch(&query(50)).unwrap();
    assert_eq!(ids(&page.items), ["m1", "m2", "m3"]);

    let appended = reopened
        .append_with(
            ChatRole::Agent,
            "welcome back",
            "panel",
            None,
            Some(ts(100)),
        )
        .unwrap()
        .unwrap();
    assert_eq!(reopened.len().unwrap(), 4);
    assert!(!appended.id.is_empty());
}
