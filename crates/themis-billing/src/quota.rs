//! Quota - subscription quota evaluation
//!
//! Combines a user's subscription (plan + purchased overage) with aggregated
//! usage to produce remaining quota, clamped usage percentages and the
//! warning/critical level consumed by presentation layers.

use crate::plan::{self, PlanTier};
use crate::subscription::UserSubscription;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Usage at or above this percentage is "warning"
pub const WARNING_THRESHOLD_PCT: u8 = 75;

/// Usage at or above this percentage is "critical"
pub const CRITICAL_THRESHOLD_PCT: u8 = 90;

/// A renewal notice is due this many days before expiry
pub const RENEWAL_NOTICE_DAYS: i64 = 7;

/// Severity of a user's quota consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    /// Below the warning threshold
    Normal,
    /// At or above 75 % of a limit
    Warning,
    /// At or above 90 % of a limit
    Critical,
}

impl UsageLevel {
    /// Returns the string representation of the level
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an expired subscription is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationPolicy {
    /// Evaluate against the Free plan (purchased overage retained)
    #[default]
    RevertToFree,
    /// Evaluate as blocked: zero limits, critical level
    Block,
}

impl ExpirationPolicy {
    /// Returns the string representation of the policy
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RevertToFree => "revert_to_free",
            Self::Block => "block",
        }
    }
}

impl std::str::FromStr for ExpirationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revert_to_free" => Ok(Self::RevertToFree),
            "block" => Ok(Self::Block),
            _ => Err(format!("unknown expiration policy: {s}")),
        }
    }
}

/// Evaluated quota state for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Tier the evaluation used (Free when an expired plan reverted)
    pub tier: PlanTier,
    /// Whether usage is blocked outright (expired under the Block policy)
    pub blocked: bool,

    /// Token ceiling: plan limit plus purchased extras
    pub token_limit: u64,
    /// Tokens consumed in the evaluation window
    pub tokens_used: u64,
    /// Tokens left, never negative
    pub tokens_remaining: u64,
    /// Consumed share of the token ceiling, clamped to 0–100
    pub token_usage_pct: u8,

    /// Tool-call ceiling: plan limit plus purchased extras
    pub tool_call_limit: u64,
    /// Tool calls consumed in the evaluation window
    pub tool_calls_used: u64,
    /// Tool calls left, never negative
    pub tool_calls_remaining: u64,
    /// Consumed share of the tool-call ceiling, clamped to 0–100
    pub tool_call_usage_pct: u8,

    /// Severity derived from the worse of the two percentages
    pub level: UsageLevel,
    /// When the subscription period ends
    pub expires_at: DateTime<Utc>,
    /// Whether the subscription period has ended
    pub expired: bool,
    /// Whether expiry is within the renewal-notice window
    pub renewal_due: bool,
}

/// Consumed share of a limit as a whole percentage, clamped to 0–100.
///
/// A zero limit yields 0 so there is never a division by zero.
#[must_use]
pub fn usage_percentage(used: u64, limit: u64) -> u8 {
    if limit == 0 {
        return 0;
    }
    let pct = (used as f64 / limit as f64 * 100.0).round();
    pct.min(100.0) as u8
}

/// Severity for a usage percentage
#[must_use]
pub fn level_for(pct: u8) -> UsageLevel {
    if pct >= CRITICAL_THRESHOLD_PCT {
        UsageLevel::Critical
    } else if pct >= WARNING_THRESHOLD_PCT {
        UsageLevel::Warning
    } else {
        UsageLevel::Normal
    }
}

/// Evaluate a subscription against consumed usage.
///
/// `tokens_used` and `tool_calls_used` are expected to cover the current
/// billing month; the caller picks the aggregation window.
#[must_use]
pub fn evaluate(
    subscription: &UserSubscription,
    tokens_used: u64,
    tool_calls_used: u64,
    now: DateTime<Utc>,
    policy: ExpirationPolicy,
) -> QuotaStatus {
    let expired = subscription.is_expired(now);
    let (tier, blocked) = match (expired, policy) {
        (true, ExpirationPolicy::Block) => (subscription.tier, true),
        (true, ExpirationPolicy::RevertToFree) => (PlanTier::Free, false),
        (false, _) => (subscription.tier, false),
    };

    let (token_limit, tool_call_limit) = if blocked {
        (0, 0)
    } else {
        (
            plan::token_limit(tier, subscription.extra_tokens),
            plan::tool_call_limit(tier, subscription.extra_tool_calls),
        )
    };

    let token_usage_pct = usage_percentage(tokens_used, token_limit);
    let tool_call_usage_pct = usage_percentage(tool_calls_used, tool_call_limit);

    let level = if blocked {
        UsageLevel::Critical
    } else {
        level_for(token_usage_pct.max(tool_call_usage_pct))
    };

    let renewal_due =
        !expired && subscription.expires_at - now <= Duration::days(RENEWAL_NOTICE_DAYS);

    QuotaStatus {
        tier,
        blocked,
        token_limit,
        tokens_used,
        tokens_remaining: token_limit.saturating_sub(tokens_used),
        token_usage_pct,
        tool_call_limit,
        tool_calls_used,
        tool_calls_remaining: tool_call_limit.saturating_sub(tool_calls_used),
        tool_call_usage_pct,
        level,
        expires_at: subscription.expires_at,
        expired,
        renewal_due,
    }
}

/// Format a number with K/M suffix for compact display
#[must_use]
pub fn format_compact_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
