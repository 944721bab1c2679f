//! Usage API endpoints
//!
//! POST /api/usage/log   - record a usage event
//! GET  /api/usage/stats - per-user usage summary
//!
//! Wire DTOs are camelCase for compatibility with the dashboard clients.

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use themis_usage::{
    ActivityEntry, DailyUsage, ModelUsage, ToolUsage, UsageAggregator, UsageEvent, UsageLogger,
    UsageSummary,
};
use utoipa::{IntoParams, ToSchema};

use crate::middleware::identity::UserIdentity;

/// Error body for validation failures
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Response for POST /api/usage/log
#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub success: bool,
}

/// Request body for POST /api/usage/log (documentation shape; unknown extra
/// fields are accepted and retained in the stored event)
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct LogRequest {
    /// Owner of the event
    pub user_id: String,
    /// Event kind: prompt | completion | tool
    #[serde(rename = "type")]
    pub kind: String,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub message_id: Option<String>,
    pub session_id: Option<String>,
    pub prompt_length: Option<u64>,
    pub total_tokens: Option<u32>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub tool_name: Option<String>,
}

/// Query parameters for GET /api/usage/stats
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    /// User to summarize; resolved from identity headers/cookies if omitted
    pub user_id: Option<String>,
    /// Inclusive window start (RFC 3339 or YYYY-MM-DD)
    pub start_date: Option<String>,
    /// Inclusive window end (RFC 3339 or YYYY-MM-DD)
    pub end_date: Option<String>,
}

// ============================================================================
// Summary views (camelCase wire shape)
// ============================================================================

/// Top-line totals
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalsView {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_messages: u64,
}

/// Per-(provider, model) usage
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageView {
    pub provider: String,
    pub model: String,
    pub total_tokens: u64,
    pub message_count: u64,
}

/// Per-tool invocation count
#[derive(Debug, Serialize, ToSchema)]
pub struct ToolUsageView {
    pub name: String,
    pub count: u64,
}

/// Tokens per UTC calendar day
#[derive(Debug, Serialize, ToSchema)]
pub struct DailyUsageView {
    pub date: NaiveDate,
    pub tokens: u64,
}

/// One recent-activity entry
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityView {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// Response for GET /api/usage/stats
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummaryView {
    pub summary: TotalsView,
    pub model_breakdown: Vec<ModelUsageView>,
    pub tool_usage: Vec<ToolUsageView>,
    pub daily_usage: Vec<DailyUsageView>,
    pub recent_activity: Vec<ActivityView>,
}

impl From<UsageSummary> for UsageSummaryView {
    fn from(summary: UsageSummary) -> Self {
        Self {
            summary: TotalsView {
                total_tokens: summary.summary.total_tokens,
                input_tokens: summary.summary.input_tokens,
                output_tokens: summary.summary.output_tokens,
                total_messages: summary.summary.total_messages,
            },
            model_breakdown: summary
                .model_breakdown
                .into_iter()
                .map(|m: ModelUsage| ModelUsageView {
                    provider: m.provider,
                    model: m.model,
                    total_tokens: m.total_tokens,
                    message_count: m.message_count,
                })
                .collect(),
            tool_usage: summary
                .tool_usage
                .into_iter()
                .map(|t: ToolUsage| ToolUsageView {
                    name: t.name,
                    count: t.count,
                })
                .collect(),
            daily_usage: summary
                .daily_usage
                .into_iter()
                .map(|d: DailyUsage| DailyUsageView {
                    date: d.date,
                    tokens: d.tokens,
                })
                .collect(),
            recent_activity: summary
                .recent_activity
                .into_iter()
                .map(|a: ActivityEntry| ActivityView {
                    timestamp: a.timestamp,
                    kind: a.kind.as_str().to_string(),
                    model: a.model,
                    provider: a.provider,
                    tokens: a.tokens,
                    tool_name: a.tool_name,
                })
                .collect(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Record a usage event
#[utoipa::path(
    post,
    path = "/api/usage/log",
    tag = "usage",
    request_body = LogRequest,
    responses(
        (status = 200, description = "Event accepted (success=false when storage dropped it)", body = LogResponse),
        (status = 400, description = "Missing userId or type", body = ErrorBody)
    )
)]
pub async fn log_usage(
    Extension(logger): Extension<Arc<UsageLogger>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let user_id = payload
        .get("userId")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let Some(user_id) = user_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Missing required fields (userId, type)")),
        )
            .into_response();
    };

    let event = match UsageEvent::from_payload(user_id, &payload) {
        Ok(event) => event,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string())))
                .into_response();
        }
    };

    // Storage failure after retries is reported in-band, never as a 5xx
    let success = match logger.record(event).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "failed to record usage event");
            false
        }
    };

    Json(LogResponse { success }).into_response()
}

/// Per-user usage summary
#[utoipa::path(
    get,
    path = "/api/usage/stats",
    tag = "usage",
    params(StatsQuery),
    responses(
        (status = 200, description = "Usage summary (all-zero when storage is unavailable)", body = UsageSummaryView),
        (status = 400, description = "Unresolvable user or malformed date", body = ErrorBody)
    )
)]
pub async fn usage_stats(
    Extension(aggregator): Extension<UsageAggregator>,
    identity: UserIdentity,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    let user_id = query
        .user_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or(identity.0);

    let Some(user_id) = user_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("User ID is required")),
        )
            .into_response();
    };

    let from = match parse_window_bound(query.start_date.as_deref()) {
        Ok(from) => from,
        Err(param) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new(format!("Invalid date: {param}"))),
            )
                .into_response();
        }
    };
    let to = match parse_window_bound(query.end_date.as_deref()) {
        Ok(to) => to,
        Err(param) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new(format!("Invalid date: {param}"))),
            )
                .into_response();
        }
    };

    let summary = aggregator.summarize_user(&user_id, from, to).await;
    Json(UsageSummaryView::from(summary)).into_response()
}

/// Parse an optional window bound; RFC 3339 first, then a bare date at
/// UTC midnight. Returns the offending input on failure.
pub(crate) fn parse_window_bound(
    param: Option<&str>,
) -> Result<Option<DateTime<Utc>>, String> {
    let Some(param) = param.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if let Ok(at) = DateTime::parse_from_rfc3339(param) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    if let Some(at) = param
        .parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
    {
        return Ok(Some(at));
    }

    Err(param.to_string())
}

/// Create the usage routes
pub fn usage_routes() -> Router {
    Router::new()
        .route("/api/usage/log", post(log_usage))
        .route("/api/usage/stats", get(usage_stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use themis_usage::{summarize, CompletionEvent, TokenUsage};

    #[test]
    fn test_parse_window_bound() {
        assert_eq!(parse_window_bound(None).unwrap(), None);
        assert_eq!(parse_window_bound(Some("  ")).unwrap(), None);

        let rfc = parse_window_bound(Some("2026-08-07T10:30:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2026, 8, 7, 10, 30, 0).unwrap());

        let bare = parse_window_bound(Some("2026-08-07")).unwrap().unwrap();
        assert_eq!(bare, Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap());

        assert!(parse_window_bound(Some("last tuesday")).is_err());
    }

    #[test]
    fn test_summary_view_serializes_camel_case() {
        let events = vec![
            UsageEvent::completion(
                "u1",
                CompletionEvent {
                    model: Some("gpt-4o".to_string()),
                    provider: Some("openai".to_string()),
                    message_id: None,
                    session_id: None,
                    tokens: TokenUsage {
                        total: 100,
                        input: 40,
                        output: 60,
                    },
                },
            ),
        ];

        let view = UsageSummaryView::from(summarize(&events));
        let json = serde_json::to_string(&view).unwrap();

        assert!(json.contains("\"totalTokens\":100"));
        assert!(json.contains("\"totalMessages\":1"));
        assert!(json.contains("\"modelBreakdown\""));
        assert!(json.contains("\"toolUsage\""));
        assert!(json.contains("\"dailyUsage\""));
        assert!(json.contains("\"recentActivity\""));
        assert!(json.contains("\"type\":\"completion\""));
    }

    #[test]
    fn test_log_request_deserializes_wire_shape() {
        let json = r#"{
            "userId": "u1",
            "type": "completion",
            "model": "gpt-4o",
            "totalTokens": 1500,
            "inputTokens": 500,
            "outputTokens": 1000
        }"#;
        let request: LogRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.user_id, "u1");
        assert_eq!(request.kind, "completion");
        assert_eq!(request.total_tokens, Some(1500));
    }
}
