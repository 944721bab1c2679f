//! PgUsageStore - PostgreSQL-backed event storage
//!
//! Single-row inserts only; events are independent and immutable, so no
//! multi-row transactions are needed. Correctness under concurrent writers
//! relies on row-level atomicity of the insert.

use super::query::EventQuery;
use super::traits::UsageStore;
use crate::error::{Error, Result};
use crate::event::{CompletionEvent, EventBody, EventKind, PromptEvent, TokenUsage, ToolEvent, UsageEvent};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Usage event store backed by PostgreSQL
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    /// Create a store over an existing connection pool
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and ensure the schema exists.
    ///
    /// Schema creation is idempotent and safe to run on every process start.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        info!("PostgreSQL usage store initialized");
        Ok(store)
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the events table and its indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_events (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                kind TEXT NOT NULL,
                model TEXT,
                provider TEXT,
                message_id TEXT,
                session_id TEXT,
                prompt_length BIGINT,
                total_tokens BIGINT,
                input_tokens BIGINT,
                output_tokens BIGINT,
                tool_name TEXT,
                raw JSONB NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_events_user
            ON usage_events(user_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_events_recorded
            ON usage_events(recorded_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_usage_events_kind
            ON usage_events(kind)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("usage_events schema ensured");
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<UsageEvent> {
        let id: Uuid = row.get("id");
        let kind_str: String = row.get("kind");
        let kind: EventKind = kind_str.parse().map_err(Error::Serialization)?;

        let model: Option<String> = row.get("model");
        let provider: Option<String> = row.get("provider");
        let message_id: Option<String> = row.get("message_id");
        let session_id: Option<String> = row.get("session_id");
        let raw: serde_json::Value = row.get("raw");

        let body = match kind {
            EventKind::Prompt => EventBody::Prompt(PromptEvent {
                model,
                provider,
                message_id,
                session_id,
                prompt_length: col_u64(&row, "prompt_length"),
                // `stream` has no column of its own; it lives in the retained payload
                stream: raw
                    .get("stream")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            }),
            EventKind::Completion => EventBody::Completion(CompletionEvent {
                model,
                provider,
                message_id,
                session_id,
                tokens: TokenUsage {
                    total: col_u32(&row, "total_tokens"),
                    input: col_u32(&row, "input_tokens"),
                    output: col_u32(&row, "output_tokens"),
                },
            }),
            EventKind::Tool => {
                let tool_name: Option<String> = row.get("tool_name");
                EventBody::Tool(ToolEvent {
                    tool_name: tool_name.ok_or_else(|| {
                        Error::Serialization(format!("tool event {id} has no tool_name"))
                    })?,
                    message_id,
                    session_id,
                })
            }
        };

        Ok(UsageEvent {
            id,
            user_id: row.get("user_id"),
            recorded_at: row.get("recorded_at"),
            body,
            raw,
        })
    }
}

fn col_u32(row: &PgRow, name: &str) -> u32 {
    row.get::<Option<i64>, _>(name)
        .unwrap_or(0)
        .clamp(0, i64::from(u32::MAX)) as u32
}

fn col_u64(row: &PgRow, name: &str) -> Option<u64> {
    row.get::<Option<i64>, _>(name).map(|v| v.max(0) as u64)
}

#[async_trait::async_trait]
impl UsageStore for PgUsageStore {
    #[instrument(skip(self, event), fields(event_id = %event.id, user_id = %event.user_id))]
    async fn append(&self, event: &UsageEvent) -> Result<()> {
        let tokens = event.tokens();
        sqlx::query(
            r#"
            INSERT INTO usage_events (
                id, user_id, recorded_at, kind, model, provider,
                message_id, session_id, prompt_length,
                total_tokens, input_tokens, output_tokens, tool_name, raw
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9,
                $10, $11, $12, $13, $14
            )
            "#,
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(event.recorded_at)
        .bind(event.kind().as_str())
        .bind(event.model())
        .bind(event.provider())
        .bind(event.message_id())
        .bind(event.session_id())
        .bind(match &event.body {
            EventBody::Prompt(p) => p.prompt_length.map(|v| v as i64),
            _ => None,
        })
        .bind(tokens.map(|t| i64::from(t.total)))
        .bind(tokens.map(|t| i64::from(t.input)))
        .bind(tokens.map(|t| i64::from(t.output)))
        .bind(event.tool_name())
        .bind(&event.raw)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("recorded {} event for user {}", event.kind(), event.user_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn query(&self, query: &EventQuery) -> Result<Vec<UsageEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, recorded_at, kind, model, provider,
                   message_id, session_id, prompt_length,
                   total_tokens, input_tokens, output_tokens, tool_name, raw
            FROM usage_events
            WHERE user_id = $1
              AND ($2::text IS NULL OR kind = $2)
              AND ($3::timestamptz IS NULL OR recorded_at >= $3)
              AND ($4::timestamptz IS NULL OR recorded_at <= $4)
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(&query.user_id)
        .bind(query.kind.map(|k| k.as_str()))
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
