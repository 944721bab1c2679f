//! Web API module for Themis
//!
//! Provides REST API endpoints for:
//! - Usage event ingestion and statistics
//! - Subscription quota evaluation
//! - Chat completion with usage interception

pub mod chat;
pub mod docs;
pub mod health;
pub mod quota;
pub mod usage;

use axum::Router;

pub use chat::chat_routes;
pub use docs::docs_routes;
pub use health::health_routes;
pub use quota::quota_routes;
pub use usage::usage_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(usage_routes())
        .merge(quota_routes())
        .merge(chat_routes())
}
