//! Quota API endpoint
//!
//! GET /api/usage/quota — evaluated quota state for the current billing
//! month, combining the user's subscription with aggregated usage.

use axum::{
    extract::Query, http::StatusCode, response::IntoResponse, routing::get, Extension, Json,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use themis_billing::{
    month_start, plan, quota, QuotaStatus, SubscriptionPlan, SubscriptionStore,
};
use themis_usage::UsageAggregator;
use utoipa::{IntoParams, ToSchema};

use super::usage::ErrorBody;
use crate::middleware::identity::UserIdentity;
use crate::server::config::BillingConfig;

/// Query parameters for GET /api/usage/quota
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct QuotaQuery {
    /// User to evaluate; resolved from identity headers/cookies if omitted
    pub user_id: Option<String>,
}

/// Plan display metadata
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub tier: String,
    pub name: String,
    pub description: String,
    pub monthly_token_limit: u64,
    pub tool_call_limit: u64,
    pub extra_token_price: f64,
    pub extra_tool_call_price: f64,
    pub monthly_price: f64,
    pub yearly_price: f64,
    pub features: Vec<String>,
}

impl From<&'static SubscriptionPlan> for PlanView {
    fn from(plan: &'static SubscriptionPlan) -> Self {
        Self {
            tier: plan.tier.to_string(),
            name: plan.name.to_string(),
            description: plan.description.to_string(),
            monthly_token_limit: plan.monthly_token_limit,
            tool_call_limit: plan.tool_call_limit,
            extra_token_price: plan.extra_token_price,
            extra_tool_call_price: plan.extra_tool_call_price,
            monthly_price: plan.monthly_price,
            yearly_price: plan.yearly_price,
            features: plan.features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Evaluated quota numbers
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaView {
    pub blocked: bool,
    pub token_limit: u64,
    pub tokens_used: u64,
    pub tokens_remaining: u64,
    pub token_usage_percentage: u8,
    pub tool_call_limit: u64,
    pub tool_calls_used: u64,
    pub tool_calls_remaining: u64,
    pub tool_call_usage_percentage: u8,
    pub level: String,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
    pub renewal_due: bool,
}

impl From<QuotaStatus> for QuotaView {
    fn from(status: QuotaStatus) -> Self {
        Self {
            blocked: status.blocked,
            token_limit: status.token_limit,
            tokens_used: status.tokens_used,
            tokens_remaining: status.tokens_remaining,
            token_usage_percentage: status.token_usage_pct,
            tool_call_limit: status.tool_call_limit,
            tool_calls_used: status.tool_calls_used,
            tool_calls_remaining: status.tool_calls_remaining,
            tool_call_usage_percentage: status.tool_call_usage_pct,
            level: status.level.to_string(),
            expires_at: status.expires_at,
            expired: status.expired,
            renewal_due: status.renewal_due,
        }
    }
}

/// Response for GET /api/usage/quota
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub user_id: String,
    pub plan: PlanView,
    pub quota: QuotaView,
}

/// Evaluated quota state for the current billing month
#[utoipa::path(
    get,
    path = "/api/usage/quota",
    tag = "quota",
    params(QuotaQuery),
    responses(
        (status = 200, description = "Quota state", body = QuotaResponse),
        (status = 400, description = "Unresolvable user", body = ErrorBody)
    )
)]
pub async fn get_quota(
    Extension(aggregator): Extension<UsageAggregator>,
    Extension(subscriptions): Extension<Arc<dyn SubscriptionStore>>,
    Extension(billing): Extension<BillingConfig>,
    identity: UserIdentity,
    Query(query): Query<QuotaQuery>,
) -> impl IntoResponse {
    let user_id = query
        .user_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or(identity.0);

    let Some(user_id) = user_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "User ID is required".to_string(),
            }),
        )
            .into_response();
    };

    let now = Utc::now();
    let subscription = subscriptions.subscription_for(&user_id).await;

    // Quota is monthly: aggregate from the start of the current month
    let summary = aggregator
        .summarize_user(&user_id, Some(month_start(now)), None)
        .await;
    let tool_calls_used: u64 = summary.tool_usage.iter().map(|t| t.count).sum();

    let status = quota::evaluate(
        &subscription,
        summary.summary.total_tokens,
        tool_calls_used,
        now,
        billing.expiration_policy,
    );

    Json(QuotaResponse {
        user_id,
        plan: PlanView::from(plan(status.tier)),
        quota: QuotaView::from(status),
    })
    .into_response()
}

/// Create the quota routes
pub fn quota_routes() -> Router {
    Router::new().route("/api/usage/quota", get(get_quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use themis_billing::{ExpirationPolicy, PlanTier, UserSubscription};

    #[test]
    fn test_quota_view_serializes_camel_case() {
        let sub = UserSubscription {
            tier: PlanTier::Free,
            expires_at: Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap(),
            extra_tokens: 0,
            extra_tool_calls: 0,
        };
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap();
        let status = quota::evaluate(&sub, 475_000, 10, now, ExpirationPolicy::RevertToFree);

        let view = QuotaView::from(status);
        let json = serde_json::to_string(&view).unwrap();

        assert!(json.contains("\"tokenUsagePercentage\":95"));
        assert!(json.contains("\"tokensRemaining\":25000"));
        assert!(json.contains("\"level\":\"critical\""));
    }

    #[test]
    fn test_plan_view_from_catalog() {
        let view = PlanView::from(plan(PlanTier::Pro));
        assert_eq!(view.tier, "pro");
        assert_eq!(view.monthly_token_limit, 5_000_000);
        assert!(!view.features.is_empty());
    }
}
