//! Aggregate - usage summaries
//!
//! Computes per-user usage statistics from stored events. Aggregation is a
//! pure fold over an unordered event set, so results are independent of
//! storage insertion order. A storage failure yields an all-zero summary
//! rather than an error so that dashboards always render.

use crate::event::{EventBody, EventKind, UsageEvent};
use crate::store::{EventQuery, UsageStore};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Maximum entries in the recent-activity feed
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Top-line token and message totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Sum of total tokens over completion events
    pub total_tokens: u64,
    /// Sum of prompt-side tokens over completion events
    pub input_tokens: u64,
    /// Sum of response-side tokens over completion events
    pub output_tokens: u64,
    /// Count of completion events (tool calls are not messages)
    pub total_messages: u64,
}

/// Per-(provider, model) usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Provider name (`"unknown"` when the event carried none)
    pub provider: String,
    /// Model name (`"unknown"` when the event carried none)
    pub model: String,
    /// Total tokens across the group's completions
    pub total_tokens: u64,
    /// Completion count in the group
    pub message_count: u64,
}

/// Per-tool invocation count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    /// Tool name
    pub name: String,
    /// Number of invocations
    pub count: u64,
}

/// Tokens consumed on one UTC calendar day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    /// UTC day
    pub date: NaiveDate,
    /// Total tokens of that day's completions
    pub tokens: u64,
}

/// One entry of the recent-activity feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
    /// Whether this was a completion or a tool call
    pub kind: EventKind,
    /// Model, for completions
    pub model: Option<String>,
    /// Provider, for completions
    pub provider: Option<String>,
    /// Tokens, for completions (zero for tool calls)
    pub tokens: u64,
    /// Tool name, for tool calls
    pub tool_name: Option<String>,
}

/// Aggregated usage statistics for one user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Top-line totals
    pub summary: UsageTotals,
    /// Per-(provider, model) breakdown, unsorted (ordering is presentation)
    pub model_breakdown: Vec<ModelUsage>,
    /// Per-tool invocation counts
    pub tool_usage: Vec<ToolUsage>,
    /// Daily token series, newest day first
    pub daily_usage: Vec<DailyUsage>,
    /// Most recent completion/tool events, newest first
    pub recent_activity: Vec<ActivityEntry>,
}

/// Fold an event set into a summary.
///
/// Order-insensitive: every breakdown is built by grouping, and each event
/// contributes to exactly one group per breakdown.
#[must_use]
pub fn summarize(events: &[UsageEvent]) -> UsageSummary {
    let mut totals = UsageTotals::default();
    let mut models: HashMap<(String, String), ModelUsage> = HashMap::new();
    let mut tools: HashMap<String, u64> = HashMap::new();
    let mut daily: HashMap<NaiveDate, u64> = HashMap::new();

    for event in events {
        match &event.body {
            EventBody::Completion(c) => {
                totals.total_tokens += u64::from(c.tokens.total);
                totals.input_tokens += u64::from(c.tokens.input);
                totals.output_tokens += u64::from(c.tokens.output);
                totals.total_messages += 1;

                let provider = c
                    .provider
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let model = c.model.clone().unwrap_or_else(|| "unknown".to_string());
                let entry = models
                    .entry((provider.clone(), model.clone()))
                    .or_insert_with(|| ModelUsage {
                        provider,
                        model,
                        total_tokens: 0,
                        message_count: 0,
                    });
                entry.total_tokens += u64::from(c.tokens.total);
                entry.message_count += 1;

                *daily.entry(event.recorded_at.date_naive()).or_insert(0) +=
                    u64::from(c.tokens.total);
            }
            EventBody::Tool(t) => {
                *tools.entry(t.tool_name.clone()).or_insert(0) += 1;
            }
            EventBody::Prompt(_) => {}
        }
    }

    let mut daily_usage: Vec<DailyUsage> = daily
        .into_iter()
        .map(|(date, tokens)| DailyUsage { date, tokens })
        .collect();
    daily_usage.sort_by(|a, b| b.date.cmp(&a.date));

    let mut recent_activity: Vec<ActivityEntry> = events
        .iter()
        .filter_map(|event| match &event.body {
            EventBody::Completion(c) => Some(ActivityEntry {
                timestamp: event.recorded_at,
                kind: EventKind::Completion,
                model: c.model.clone(),
                provider: c.provider.clone(),
                tokens: u64::from(c.tokens.total),
                tool_name: None,
            }),
            EventBody::Tool(t) => Some(ActivityEntry {
                timestamp: event.recorded_at,
                kind: EventKind::Tool,
                model: None,
                provider: None,
                tokens: 0,
                tool_name: Some(t.tool_name.clone()),
            }),
            EventBody::Prompt(_) => None,
        })
        .collect();
    recent_activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

    UsageSummary {
        summary: totals,
        model_breakdown: models.into_values().collect(),
        tool_usage: tools
            .into_iter()
            .map(|(name, count)| ToolUsage { name, count })
            .collect(),
        daily_usage,
        recent_activity,
    }
}

/// Computes usage summaries against a storage backend
#[derive(Clone)]
pub struct UsageAggregator {
    store: Arc<dyn UsageStore>,
}

impl UsageAggregator {
    /// Create an aggregator over a storage backend
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Summarize a user's events within an optional `[from, to]` window.
    ///
    /// A storage failure is masked: the caller gets an all-zero summary and
    /// the error is logged. Dashboards stay renderable when the store is down.
    #[instrument(skip(self))]
    pub async fn summarize_user(
        &self,
        user_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> UsageSummary {
        let query = EventQuery::for_user(user_id).in_range(from, to);
        match self.store.query(&query).await {
            Ok(events) => summarize(&events),
            Err(e) => {
                warn!(user_id, error = %e, "usage query failed, returning empty summary");
                UsageSummary::default()
            }
        }
    }
}
