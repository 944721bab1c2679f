//! Server configuration types
//!
//! Contains all configuration structures for the Themis server. Secrets are
//! deliberately absent: the database connection string comes from the
//! environment only.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use themis_billing::ExpirationPolicy;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3100,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// PostgreSQL via POSTGRES_URL / DATABASE_URL
    Postgres,
    /// Per-user monthly JSONL files
    Jsonl,
}

/// Usage storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend persists usage events
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Connection pool size (postgres)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Pool acquire timeout in seconds (postgres)
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Per-attempt deadline for a storage operation, in seconds
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// Write attempts before an event is dropped
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Base delay of the exponential backoff between attempts, in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Directory for the jsonl backend (USAGE_LOGS_DIR env overrides)
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            op_timeout_secs: default_op_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            logs_dir: default_logs_dir(),
        }
    }
}

fn default_backend() -> StorageBackend {
    StorageBackend::Postgres
}
fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    5
}
fn default_op_timeout_secs() -> u64 {
    5
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_logs_dir() -> String {
    "data/usage-logs".to_string()
}

impl StorageConfig {
    /// Database connection string from the environment.
    ///
    /// `POSTGRES_URL` wins over `DATABASE_URL`; both are tried in that fixed
    /// order and empty values are ignored.
    pub fn database_url() -> Option<String> {
        std::env::var("POSTGRES_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()))
    }

    /// Log directory for the jsonl backend, honoring the USAGE_LOGS_DIR override
    pub fn effective_logs_dir(&self) -> PathBuf {
        std::env::var("USAGE_LOGS_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.logs_dir))
    }

    /// Pool acquire timeout as a `Duration`
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Per-attempt operation deadline as a `Duration`
    #[must_use]
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.op_timeout_secs)
    }

    /// Retry backoff base delay as a `Duration`
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Subscription source selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingSource {
    /// Read the billing system's users table
    #[default]
    Postgres,
    /// In-memory defaults (every user on Free)
    Static,
}

/// Billing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Where subscriptions are read from
    #[serde(default)]
    pub source: BillingSource,
    /// How an expired subscription is evaluated
    #[serde(default)]
    pub expiration_policy: ExpirationPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.backend, StorageBackend::Postgres);
        assert_eq!(storage.max_connections, 5);
        assert_eq!(storage.retry_max_attempts, 3);
        assert_eq!(storage.op_timeout(), Duration::from_secs(5));
        assert_eq!(storage.retry_base_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 4000
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.billing.source, BillingSource::Postgres);
        assert_eq!(
            config.billing.expiration_policy,
            ExpirationPolicy::RevertToFree
        );
    }

    #[test]
    fn test_backend_parses_from_snake_case() {
        let storage: StorageConfig = toml::from_str("backend = \"jsonl\"").unwrap();
        assert_eq!(storage.backend, StorageBackend::Jsonl);
    }
}
