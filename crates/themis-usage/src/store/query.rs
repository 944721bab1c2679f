//! Query options for fetching usage events

use crate::event::{EventKind, UsageEvent};
use chrono::{DateTime, Utc};

/// Filter for fetching a user's events, with an optional kind and time window
#[derive(Debug, Clone)]
pub struct EventQuery {
    /// Owner whose events to fetch
    pub user_id: String,
    /// Restrict to a single event kind
    pub kind: Option<EventKind>,
    /// Inclusive window start
    pub from: Option<DateTime<Utc>>,
    /// Inclusive window end
    pub to: Option<DateTime<Utc>>,
}

impl EventQuery {
    /// Create a query for all of a user's events
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: None,
            from: None,
            to: None,
        }
    }

    /// Restrict the query to one event kind
    #[must_use]
    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the time window (either bound may be open)
    #[must_use]
    pub fn in_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Whether an event satisfies every filter of this query
    #[must_use]
    pub fn matches(&self, event: &UsageEvent) -> bool {
        event.user_id == self.user_id
            && self.kind.is_none_or(|k| event.kind() == k)
            && self.from.is_none_or(|from| event.recorded_at >= from)
            && self.to.is_none_or(|to| event.recorded_at <= to)
    }
}
