//! Integration tests for Themis
//!
//! These tests verify the integration between the crates:
//! - themis-usage: event ingestion, storage and aggregation
//! - themis-billing: subscription lookup and quota evaluation
//!
//! The pipeline runs against the JSONL storage backend in a temp directory.

use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_err;

use chrono::{TimeZone, Utc};
use themis_billing::{
    month_start, quota, ExpirationPolicy, PlanTier, StaticSubscriptionStore, SubscriptionStore,
    UsageLevel, UserSubscription,
};
use themis_usage::{
    summarize, CompletionEvent, EventKind, EventQuery, JsonlUsageStore, TokenUsage, ToolEvent,
    UsageAggregator, UsageEvent, UsageLogger, UsageStore,
};

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

// ============================================================================
// Ingest → aggregate pipeline
// ============================================================================

#[tokio::test]
async fn test_ingested_completions_sum_in_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());
    let aggregator = UsageAggregator::new(store);

    for total in [100, 200, 50] {
        logger.record(completion("u1", total)).await.unwrap();
    }

    let summary = aggregator.summarize_user("u1", None, None).await;
    assert_eq!(summary.summary.total_tokens, 350);
    assert_eq!(summary.summary.total_messages, 3);
}

#[tokio::test]
async fn test_tool_usage_counts_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());
    let aggregator = UsageAggregator::new(store);

    logger.record(tool("u2", "search")).await.unwrap();
    logger.record(tool("u2", "calc")).await.unwrap();
    logger.record(tool("u2", "search")).await.unwrap();

    let summary = aggregator.summarize_user("u2", None, None).await;
    let mut tools = summary.tool_usage.clone();
    tools.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(tools.len(), 2);
    assert_eq!((tools[0].name.as_str(), tools[0].count), ("calc", 1));
    assert_eq!((tools[1].name.as_str(), tools[1].count), ("search", 2));
}

#[tokio::test]
async fn test_unknown_user_gets_zero_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let aggregator = UsageAggregator::new(store);

    let summary = aggregator.summarize_user("nobody", None, None).await;
    assert_eq!(summary.summary.total_tokens, 0);
    assert_eq!(summary.summary.total_messages, 0);
    assert!(summary.model_breakdown.is_empty());
    assert!(summary.recent_activity.is_empty());
}

#[tokio::test]
async fn test_window_excludes_outside_events() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let aggregator = UsageAggregator::new(store.clone());

    let mut january = completion("u1", 100);
    january.recorded_at = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
    let mut march = completion("u1", 200);
    march.recorded_at = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();

    store.append(&january).await.unwrap();
    store.append(&march).await.unwrap();

    let summary = aggregator
        .summarize_user(
            "u1",
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap()),
        )
        .await;

    assert_eq!(summary.summary.total_tokens, 200);
    assert_eq!(summary.summary.total_messages, 1);
    assert!(summary
        .daily_usage
        .iter()
        .all(|d| d.date.to_string().starts_with("2026-03")));
}

#[tokio::test]
async fn test_detached_ingestion_lands_after_drain() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());

    logger.record_detached(completion("u1", 100));
    logger.record_detached(tool("u1", "search"));
    logger.shutdown().await;

    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_mixed_kinds_do_not_cross_count() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());

    logger
        .record(UsageEvent::prompt("u1", Default::default()))
        .await
        .unwrap();
    logger.record(completion("u1", 100)).await.unwrap();
    logger.record(tool("u1", "search")).await.unwrap();

    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    let summary = summarize(&events);

    // Each event contributes to exactly one breakdown
    assert_eq!(summary.summary.total_messages, 1);
    assert_eq!(summary.tool_usage.len(), 1);
    assert_eq!(
        events.iter().filter(|e| e.kind() == EventKind::Prompt).count(),
        1
    );
}

// ============================================================================
// Payload ingestion (wire shape)
// ============================================================================

#[tokio::test]
async fn test_payload_roundtrip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());

    let payload = serde_json::json!({
        "type": "completion",
        "model": "gpt-4o",
        "provider": "openai",
        "totalTokens": 1500,
        "inputTokens": 500,
        "outputTokens": 1000,
        "client": "web"
    });
    let event = UsageEvent::from_payload("u1", &payload).unwrap();
    logger.record(event).await.unwrap();

    let events = store.query(&EventQuery::for_user("u1")).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tokens().unwrap().total, 1500);
    // The original payload is retained verbatim, extra fields included
    assert_eq!(events[0].raw["client"], "web");
}

// ============================================================================
// Usage → quota pipeline
// ============================================================================

#[tokio::test]
async fn test_quota_evaluation_from_aggregated_usage() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn UsageStore> =
        Arc::new(JsonlUsageStore::open(dir.path()).await.unwrap());
    let logger = UsageLogger::new(store.clone());
    let aggregator = UsageAggregator::new(store);

    // 95% of the Free plan's 500K tokens
    for _ in 0..5 {
        logger.record(completion("u1", 95_000)).await.unwrap();
    }
    for _ in 0..3 {
        logger.record(tool("u1", "search")).await.unwrap();
    }

    let now = Utc::now();
    let subscriptions = StaticSubscriptionStore::new();
    let subscription = subscriptions.subscription_for("u1").await;
    assert_eq!(subscription.tier, PlanTier::Free);

    let summary = aggregator
        .summarize_user("u1", Some(month_start(now)), None)
        .await;
    let tool_calls_used: u64 = summary.tool_usage.iter().map(|t| t.count).sum();

    let status = quota::evaluate(
        &subscription,
        summary.summary.total_tokens,
        tool_calls_used,
        now,
        ExpirationPolicy::RevertToFree,
    );

    assert_eq!(status.tokens_used, 475_000);
    assert_eq!(status.token_usage_pct, 95);
    assert_eq!(status.tokens_remaining, 25_000);
    assert_eq!(status.tool_calls_used, 3);
    assert_eq!(status.level, UsageLevel::Critical);
}

#[tokio::test]
async fn test_quota_with_configured_subscription() {
    let now = Utc::now();
    let subscriptions = StaticSubscriptionStore::new();
    subscriptions
        .insert(
            "pro-user",
            UserSubscription {
                tier: PlanTier::Pro,
                expires_at: now + chrono::Duration::days(20),
                extra_tokens: 1_000_000,
                extra_tool_calls: 0,
            },
        )
        .await;

    let subscription = subscriptions.subscription_for("pro-user").await;
    let status = quota::evaluate(&subscription, 3_000_000, 0, now, ExpirationPolicy::RevertToFree);

    // 3M of (5M plan + 1M overage)
    assert_eq!(status.token_limit, 6_000_000);
    assert_eq!(status.token_usage_pct, 50);
    assert_eq!(status.level, UsageLevel::Normal);
    assert!(!status.renewal_due);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_unwritable_store_is_masked_by_aggregator() {
    // A file where the directory should be makes every query fail
    let file = tempfile::NamedTempFile::new().unwrap();
    let store: Arc<dyn UsageStore> = Arc::new(JsonlUsageStore::new(file.path()));
    let aggregator = UsageAggregator::new(store.clone());

    let summary = aggregator.summarize_user("u1", None, None).await;
    assert_eq!(summary.summary.total_tokens, 0);
    assert!(summary.model_breakdown.is_empty());
}

#[tokio::test]
async fn test_unwritable_store_drops_event_after_retries() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let store: Arc<dyn UsageStore> = Arc::new(JsonlUsageStore::new(file.path()));
    let logger = UsageLogger::new(store).with_retry(2, Duration::from_millis(1));

    let result = logger.record(completion("u1", 100)).await;
    tokio_test::assert_err!(result);
}
