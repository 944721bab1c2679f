//! Subscription - per-user plan state
//!
//! Subscriptions are owned by the billing system; this module only reads
//! them. Lookups never fail: a missing user or a storage error yields the
//! default Free subscription so quota evaluation always has an input.

use crate::plan::PlanTier;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A user's active subscription state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    /// Active plan tier
    pub tier: PlanTier,
    /// When the subscription period ends
    pub expires_at: DateTime<Utc>,
    /// Purchased extra tokens beyond the plan limit
    pub extra_tokens: u64,
    /// Purchased extra tool calls beyond the plan limit
    pub extra_tool_calls: u64,
}

impl UserSubscription {
    /// The default Free subscription, expiring at the end of the current month
    #[must_use]
    pub fn free(now: DateTime<Utc>) -> Self {
        Self {
            tier: PlanTier::Free,
            expires_at: end_of_month(now),
            extra_tokens: 0,
            extra_tool_calls: 0,
        }
    }

    /// Whether the subscription period has ended
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// First instant of the month containing `now` (UTC)
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .expect("first day of a month is always a valid date");
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

/// First instant of the month after the one containing `now` (UTC).
///
/// Used as the default subscription expiry: "end of the current month".
#[must_use]
pub fn end_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("first day of a month is always a valid date");
    Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

/// Trait for subscription lookup backends
///
/// Infallible by contract: implementations degrade to the default Free
/// subscription instead of surfacing errors.
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The subscription for a user, or the Free default
    async fn subscription_for(&self, user_id: &str) -> UserSubscription;

    /// Backend name (for logging and diagnostics)
    fn name(&self) -> &'static str;
}

/// Subscription reader backed by the billing system's `users` table
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    /// Create a reader over an existing connection pool
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn subscription_for(&self, user_id: &str) -> UserSubscription {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            SELECT subscription_tier, xtra_token, xtra_tool
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => {
                let tier = row
                    .try_get::<Option<String>, _>("subscription_tier")
                    .ok()
                    .flatten()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(PlanTier::Free);
                let extra_tokens = row
                    .try_get::<Option<i64>, _>("xtra_token")
                    .ok()
                    .flatten()
                    .unwrap_or(0)
                    .max(0) as u64;
                let extra_tool_calls = row
                    .try_get::<Option<i64>, _>("xtra_tool")
                    .ok()
                    .flatten()
                    .unwrap_or(0)
                    .max(0) as u64;

                UserSubscription {
                    tier,
                    expires_at: end_of_month(now),
                    extra_tokens,
                    extra_tool_calls,
                }
            }
            Ok(None) => {
                debug!(user_id, "user not found, defaulting to free subscription");
                UserSubscription::free(now)
            }
            Err(e) => {
                warn!(user_id, error = %e, "subscription lookup failed, defaulting to free");
                UserSubscription::free(now)
            }
        }
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// In-memory subscription store, for file-backed deployments and tests
#[derive(Default)]
pub struct StaticSubscriptionStore {
    subscriptions: RwLock<HashMap<String, UserSubscription>>,
}

impl StaticSubscriptionStore {
    /// Create an empty store; every lookup yields the Free default
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subscription for a user
    pub async fn insert(&self, user_id: impl Into<String>, subscription: UserSubscription) {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(user_id.into(), subscription);
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for StaticSubscriptionStore {
    async fn subscription_for(&self, user_id: &str) -> UserSubscription {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserSubscription::free(Utc::now()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_end_of_month() {
        let expiry = end_of_month(at(2026, 8, 7));
        assert_eq!(expiry, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_end_of_month_december_rollover() {
        let expiry = end_of_month(at(2026, 12, 15));
        assert_eq!(expiry, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_start() {
        let start = month_start(at(2026, 8, 7));
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_free_default_not_expired() {
        let now = at(2026, 8, 7);
        let sub = UserSubscription::free(now);
        assert_eq!(sub.tier, PlanTier::Free);
        assert!(!sub.is_expired(now));
        assert!(sub.is_expired(at(2026, 9, 1)));
    }

    #[tokio::test]
    async fn test_static_store_defaults_to_free() {
        let store = StaticSubscriptionStore::new();
        let sub = store.subscription_for("nobody").await;
        assert_eq!(sub.tier, PlanTier::Free);
        assert_eq!(sub.extra_tokens, 0);
    }

    #[tokio::test]
    async fn test_static_store_returns_inserted() {
        let store = StaticSubscriptionStore::new();
        let sub = UserSubscription {
            tier: PlanTier::Pro,
            expires_at: at(2026, 9, 1),
            extra_tokens: 1000,
            extra_tool_calls: 5,
        };
        store.insert("u1", sub.clone()).await;
        assert_eq!(store.subscription_for("u1").await, sub);
    }
}
