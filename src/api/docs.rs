//! API Documentation - Swagger UI
//!
//! Provides OpenAPI documentation at /docs

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{
    chat::{ChatRequest, ChatResponse, Choice, ChoiceMessage, FunctionCall, ToolCall, UsageBlock},
    quota::{PlanView, QuotaResponse, QuotaView},
    usage::{
        ActivityView, DailyUsageView, ErrorBody, LogRequest, LogResponse, ModelUsageView,
        ToolUsageView, TotalsView, UsageSummaryView,
    },
};

/// Themis API OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Themis API",
        version = "1.0.0",
        description = "Usage accounting and subscription quota REST API.

## Overview
Themis provides the metering surface of an AI chat platform:
- **Usage**: Record prompt/completion/tool events and query per-user summaries
- **Quota**: Evaluate subscription limits, overage and usage percentages
- **Chat**: Completion endpoint with usage interception

## Identity
User identity is resolved from `x-auth-user-id`, `x-user-id`, or identity
cookies; ingestion falls back to the shared `anonymous` bucket.
",
        contact(
            name = "Themis Team",
            url = "https://github.com/themis/themis"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Usage
        crate::api::usage::log_usage,
        crate::api::usage::usage_stats,
        // Quota
        crate::api::quota::get_quota,
        // Chat
        crate::api::chat::chat_completion,
    ),
    components(
        schemas(
            // Usage
            ErrorBody,
            LogRequest,
            LogResponse,
            TotalsView,
            ModelUsageView,
            ToolUsageView,
            DailyUsageView,
            ActivityView,
            UsageSummaryView,
            // Quota
            PlanView,
            QuotaView,
            QuotaResponse,
            // Chat
            ChatRequest,
            ChatResponse,
            Choice,
            ChoiceMessage,
            ToolCall,
            FunctionCall,
            UsageBlock,
        )
    ),
    tags(
        (name = "usage", description = "Usage event ingestion and statistics"),
        (name = "quota", description = "Subscription quota evaluation"),
        (name = "chat", description = "Chat completion with usage interception"),
    )
)]
pub struct ApiDoc;

/// Create documentation routes
pub fn docs_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api/openapi.json", ApiDoc::openapi()))
}
