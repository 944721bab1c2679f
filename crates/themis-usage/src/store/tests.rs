//! Tests for store module

use super::*;
use crate::event::{CompletionEvent, EventKind, TokenUsage, ToolEvent, UsageEvent};
use chrono::{Duration, Utc};

fn completion(user: &str, total: u32) -> UsageEvent {
    UsageEvent::completion(
        user,
        CompletionEvent {
            model: Some("gpt-4o".to_string()),
            provider: Some("openai".to_string()),
            message_id: None,
            session_id: None,
            tokens: TokenUsage {
                total,
                input: total / 2,
                output: total - total / 2,
            },
        },
    )
}

fn tool(user: &str, name: &str) -> UsageEvent {
    UsageEvent::tool(
        user,
        ToolEvent {
            tool_name: name.to_string(),
            message_id: None,
            session_id: None,
        },
    )
}

#[tokio::test]
async fn test_jsonl_append_and_query() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlUsageStore::open(dir.path()).await.unwrap();
    assert_eq!(store.name(), "jsonl");

    store.append(&completion("u1", 100)).await.unwrap();
    store.append(&completion("u1", 200)).await.unwrap();
    store.append(&tool("u1", "search")).await.unwrap();

    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    assert_eq!(events.len(), 3);

    let completions = store
        .query(&EventQuery::for_user("u1").with_kind(EventKind::Completion))
        .await
        .unwrap();
    assert_eq!(completions.len(), 2);
    let total: u32 = completions.iter().map(|e| e.tokens().unwrap().total).sum();
    assert_eq!(total, 300);
}

#[tokio::test]
async fn test_jsonl_isolates_users() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlUsageStore::open(dir.path()).await.unwrap();

    store.append(&completion("alice", 100)).await.unwrap();
    store.append(&completion("bob", 200)).await.unwrap();

    let alice = store.query(&EventQuery::for_user("alice")).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].user_id, "alice");
}

#[tokio::test]
async fn test_jsonl_time_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlUsageStore::open(dir.path()).await.unwrap();

    let mut old = completion("u1", 100);
    old.recorded_at = Utc::now() - Duration::days(40);
    store.append(&old).await.unwrap();
    store.append(&completion("u1", 200)).await.unwrap();

    let recent = store
        .query(&EventQuery::for_user("u1").in_range(Some(Utc::now() - Duration::days(7)), None))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].tokens().unwrap().total, 200);
}

#[tokio::test]
async fn test_jsonl_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlUsageStore::new(dir.path().join("missing"));

    // Querying before anything was written must succeed with no events
    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_jsonl_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlUsageStore::open(dir.path()).await.unwrap();

    let event = completion("u1", 100);
    store.append(&event).await.unwrap();

    // Corrupt the file with a truncated line
    let path = std::fs::read_dir(dir.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"kind\": \"compl\n");
    std::fs::write(&path, content).unwrap();

    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_jsonl_health_check_creates_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = JsonlUsageStore::new(&nested);

    store.health_check().await.unwrap();
    assert!(nested.is_dir());
}
