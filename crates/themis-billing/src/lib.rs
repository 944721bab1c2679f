//! Themis Billing - subscription plans and quota
//!
//! This crate provides the billing-side inputs to usage accounting:
//! - Plan: the fixed subscription plan catalog
//! - Subscription: per-user plan state lookup (read-only here)
//! - Quota: limit/percentage evaluation and thresholds

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod plan;
pub mod quota;
pub mod subscription;

pub use plan::{plan, token_limit, tool_call_limit, PlanTier, SubscriptionPlan};
pub use quota::{
    evaluate, format_compact_number, level_for, usage_percentage, ExpirationPolicy, QuotaStatus,
    UsageLevel, CRITICAL_THRESHOLD_PCT, RENEWAL_NOTICE_DAYS, WARNING_THRESHOLD_PCT,
};
pub use subscription::{
    end_of_month, month_start, PgSubscriptionStore, StaticSubscriptionStore, SubscriptionStore,
    UserSubscription,
};
