//! Health check endpoints with component-level diagnostics.
//!
//! Provides:
//! - `/health` — simple "healthy" + version (for load balancers)
//! - `/health/detailed` — per-component status (storage, billing)

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use themis_billing::SubscriptionStore;
use themis_usage::UsageStore;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

/// All component health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub storage: ComponentHealth,
    pub billing: ComponentHealth,
}

/// Individual component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    fn healthy_with_details(latency_ms: u64, details: serde_json::Value) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
            details: Some(details),
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
            details: None,
        }
    }
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Detailed health check with all component statuses
async fn detailed_health_check(
    Extension(store): Extension<Arc<dyn UsageStore>>,
    Extension(subscriptions): Extension<Arc<dyn SubscriptionStore>>,
) -> Json<DetailedHealthResponse> {
    let storage_health = check_storage(store.as_ref()).await;

    // Subscription lookups are infallible by contract, so only the source
    // is reported here.
    let billing_health = ComponentHealth::healthy_with_details(
        0,
        serde_json::json!({
            "source": subscriptions.name(),
        }),
    );

    let overall_status = if storage_health.status == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            storage: storage_health,
            billing: billing_health,
        },
    })
}

/// Round-trip the storage backend
async fn check_storage(store: &dyn UsageStore) -> ComponentHealth {
    let start = std::time::Instant::now();
    match store.health_check().await {
        Ok(()) => ComponentHealth::healthy_with_details(
            start.elapsed().as_millis() as u64,
            serde_json::json!({
                "backend": store.name(),
            }),
        ),
        Err(e) => ComponentHealth::unhealthy(e.to_string()),
    }
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_health_with_details() {
        let h = ComponentHealth::healthy_with_details(10, serde_json::json!({"backend": "jsonl"}));
        assert_eq!(h.status, "healthy");
        assert_eq!(h.latency_ms, Some(10));
        assert!(h.details.is_some());
    }

    #[test]
    fn test_component_health_unhealthy() {
        let h = ComponentHealth::unhealthy("connection refused".to_string());
        assert_eq!(h.status, "unhealthy");
        assert!(h.latency_ms.is_none());
        assert_eq!(h.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_health_response_serialization() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }
}
