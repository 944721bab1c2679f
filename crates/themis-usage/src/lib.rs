//! Themis Usage - usage accounting pipeline
//!
//! This crate provides the usage-metering core for Themis:
//! - Event: usage event types and schemas
//! - Store: event persistence (PostgreSQL, JSONL files)
//! - Ingest: best-effort recording with retries and fire-and-forget handoff
//! - Aggregate: per-user usage summaries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod error;
pub mod event;
pub mod ingest;
pub mod store;

pub use aggregate::{
    summarize, ActivityEntry, DailyUsage, ModelUsage, ToolUsage, UsageAggregator, UsageSummary,
    UsageTotals, RECENT_ACTIVITY_LIMIT,
};
pub use error::{Error, Result};
pub use event::{
    CompletionEvent, EventBody, EventKind, PromptEvent, TokenUsage, ToolEvent, UsageEvent,
};
pub use ingest::UsageLogger;
pub use store::{EventQuery, JsonlUsageStore, PgUsageStore, UsageStore};
