//! Storage trait for usage events

use super::query::EventQuery;
use crate::error::Result;
use crate::event::UsageEvent;

/// Trait for usage event storage backends
///
/// This trait allows different storage implementations (PostgreSQL, JSONL
/// files) to be used interchangeably. Events are append-only: there is no
/// update or delete operation.
#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    /// Append an event to the store
    async fn append(&self, event: &UsageEvent) -> Result<()>;

    /// Fetch events matching a query, in no guaranteed order
    async fn query(&self, query: &EventQuery) -> Result<Vec<UsageEvent>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()>;

    /// Backend name (for logging and diagnostics)
    fn name(&self) -> &'static str;
}
