//! Event - Usage event types and schemas
//!
//! This module defines the usage events recorded by the accounting pipeline.
//! Events form an immutable, append-only log: a correction is a new event,
//! never an update.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator for the three kinds of usage events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Outbound chat request
    Prompt,
    /// Token-bearing model response
    Completion,
    /// A single invoked tool/function call
    Tool,
}

impl EventKind {
    /// Returns the string representation of the event kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Completion => "completion",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(Self::Prompt),
            "completion" => Ok(Self::Completion),
            "tool" => Ok(Self::Tool),
            _ => Err(format!("unknown event kind: {s}")),
        }
    }
}

/// Token counts reported with a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Total tokens
    pub total: u32,
    /// Prompt-side tokens
    pub input: u32,
    /// Response-side tokens
    pub output: u32,
}

/// Fields carried by a prompt event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptEvent {
    /// Model the request targets
    pub model: Option<String>,
    /// Provider the request targets
    pub provider: Option<String>,
    /// Correlation id linking the events of one conversational turn
    pub message_id: Option<String>,
    /// Conversation/session correlation id
    pub session_id: Option<String>,
    /// Serialized length of the outbound message list, in bytes
    pub prompt_length: Option<u64>,
    /// Whether the caller requested a streaming response
    #[serde(default)]
    pub stream: bool,
}

/// Fields carried by a completion event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Model that served the response
    pub model: Option<String>,
    /// Provider that served the response
    pub provider: Option<String>,
    /// Correlation id linking the events of one conversational turn
    pub message_id: Option<String>,
    /// Conversation/session correlation id
    pub session_id: Option<String>,
    /// Token counts reported by the backend
    #[serde(default)]
    pub tokens: TokenUsage,
}

/// Fields carried by a tool-call event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    /// Name of the invoked tool
    pub tool_name: String,
    /// Correlation id linking the events of one conversational turn
    pub message_id: Option<String>,
    /// Conversation/session correlation id
    pub session_id: Option<String>,
}

/// Kind-specific payload of a usage event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventBody {
    /// Outbound chat request
    Prompt(PromptEvent),
    /// Token-bearing model response
    Completion(CompletionEvent),
    /// A single invoked tool/function call
    Tool(ToolEvent),
}

/// One immutable usage record tied to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Unique identifier
    pub id: Uuid,

    /// Owner of the event; `"anonymous"` when no identity resolved
    pub user_id: String,

    /// Ingestion time, server-assigned (never client-supplied)
    pub recorded_at: DateTime<Utc>,

    /// Kind-specific fields
    #[serde(flatten)]
    pub body: EventBody,

    /// Original ingestion payload, retained for audit and forward compatibility
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl UsageEvent {
    /// Create a new event with a fresh id and the current ingestion time
    #[must_use]
    pub fn new(user_id: impl Into<String>, body: EventBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            recorded_at: Utc::now(),
            body,
            raw: serde_json::Value::Null,
        }
    }

    /// Create a prompt event
    #[must_use]
    pub fn prompt(user_id: impl Into<String>, prompt: PromptEvent) -> Self {
        Self::new(user_id, EventBody::Prompt(prompt))
    }

    /// Create a completion event
    #[must_use]
    pub fn completion(user_id: impl Into<String>, completion: CompletionEvent) -> Self {
        Self::new(user_id, EventBody::Completion(completion))
    }

    /// Create a tool-call event
    #[must_use]
    pub fn tool(user_id: impl Into<String>, tool: ToolEvent) -> Self {
        Self::new(user_id, EventBody::Tool(tool))
    }

    /// Attach the original payload for audit retention
    #[must_use]
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// The event's kind discriminator
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.body {
            EventBody::Prompt(_) => EventKind::Prompt,
            EventBody::Completion(_) => EventKind::Completion,
            EventBody::Tool(_) => EventKind::Tool,
        }
    }

    /// Model associated with the event, if any
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        match &self.body {
            EventBody::Prompt(p) => p.model.as_deref(),
            EventBody::Completion(c) => c.model.as_deref(),
            EventBody::Tool(_) => None,
        }
    }

    /// Provider associated with the event, if any
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match &self.body {
            EventBody::Prompt(p) => p.provider.as_deref(),
            EventBody::Completion(c) => c.provider.as_deref(),
            EventBody::Tool(_) => None,
        }
    }

    /// Correlation message id, if any
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match &self.body {
            EventBody::Prompt(p) => p.message_id.as_deref(),
            EventBody::Completion(c) => c.message_id.as_deref(),
            EventBody::Tool(t) => t.message_id.as_deref(),
        }
    }

    /// Session id, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match &self.body {
            EventBody::Prompt(p) => p.session_id.as_deref(),
            EventBody::Completion(c) => c.session_id.as_deref(),
            EventBody::Tool(t) => t.session_id.as_deref(),
        }
    }

    /// Token counts, present only on completion events
    #[must_use]
    pub fn tokens(&self) -> Option<TokenUsage> {
        match &self.body {
            EventBody::Completion(c) => Some(c.tokens),
            _ => None,
        }
    }

    /// Tool name, present only on tool events
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match &self.body {
            EventBody::Tool(t) => Some(&t.tool_name),
            _ => None,
        }
    }

    /// Build an event from a raw ingestion payload.
    ///
    /// The payload must carry a `type` discriminator (`prompt` / `completion`
    /// / `tool`) and kind-appropriate camelCase fields; everything else is
    /// retained verbatim in `raw`. The ingestion timestamp is assigned here,
    /// never taken from the payload.
    pub fn from_payload(user_id: &str, payload: &serde_json::Value) -> Result<Self> {
        let kind_str = payload
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::InvalidEvent("missing `type` discriminator".to_string()))?;
        let kind: EventKind = kind_str.parse().map_err(Error::InvalidEvent)?;

        let body = match kind {
            EventKind::Prompt => EventBody::Prompt(PromptEvent {
                model: str_field(payload, "model"),
                provider: str_field(payload, "provider"),
                message_id: str_field(payload, "messageId"),
                session_id: str_field(payload, "sessionId"),
                prompt_length: payload.get("promptLength").and_then(|v| v.as_u64()),
                stream: payload
                    .get("stream")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            }),
            EventKind::Completion => EventBody::Completion(CompletionEvent {
                model: str_field(payload, "model"),
                provider: str_field(payload, "provider"),
                message_id: str_field(payload, "messageId"),
                session_id: str_field(payload, "sessionId"),
                tokens: TokenUsage {
                    total: u32_field(payload, "totalTokens"),
                    input: u32_field(payload, "inputTokens"),
                    output: u32_field(payload, "outputTokens"),
                },
            }),
            EventKind::Tool => {
                let tool_name = str_field(payload, "toolName").ok_or_else(|| {
                    Error::InvalidEvent("tool event missing `toolName`".to_string())
                })?;
                EventBody::Tool(ToolEvent {
                    tool_name,
                    message_id: str_field(payload, "messageId"),
                    session_id: str_field(payload, "sessionId"),
                })
            }
        };

        Ok(Self::new(user_id, body).with_raw(payload.clone()))
    }
}

fn str_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn u32_field(payload: &serde_json::Value, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in [EventKind::Prompt, EventKind::Completion, EventKind::Tool] {
            let s = kind.to_string();
            let parsed: EventKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert!("usage".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_from_payload_completion() {
        let payload = serde_json::json!({
            "type": "completion",
            "model": "gpt-4o",
            "provider": "openai",
            "messageId": "m-1",
            "sessionId": "s-1",
            "totalTokens": 1500,
            "inputTokens": 500,
            "outputTokens": 1000
        });

        let event = UsageEvent::from_payload("u1", &payload).unwrap();
        assert_eq!(event.kind(), EventKind::Completion);
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.model(), Some("gpt-4o"));
        assert_eq!(
            event.tokens(),
            Some(TokenUsage {
                total: 1500,
                input: 500,
                output: 1000
            })
        );
        assert_eq!(event.raw, payload);
    }

    #[test]
    fn test_from_payload_missing_type() {
        let payload = serde_json::json!({"model": "gpt-4o"});
        let err = UsageEvent::from_payload("u1", &payload).unwrap_err();
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn test_from_payload_unknown_type() {
        let payload = serde_json::json!({"type": "embedding"});
        assert!(UsageEvent::from_payload("u1", &payload).is_err());
    }

    #[test]
    fn test_from_payload_tool_requires_name() {
        let payload = serde_json::json!({"type": "tool"});
        assert!(UsageEvent::from_payload("u1", &payload).is_err());

        let payload = serde_json::json!({"type": "tool", "toolName": "search"});
        let event = UsageEvent::from_payload("u1", &payload).unwrap();
        assert_eq!(event.tool_name(), Some("search"));
    }

    #[test]
    fn test_event_serialization_roundtrip() {
        let event = UsageEvent::completion(
            "u1",
            CompletionEvent {
                model: Some("gpt-4o".to_string()),
                provider: Some("openai".to_string()),
                message_id: None,
                session_id: None,
                tokens: TokenUsage {
                    total: 10,
                    input: 4,
                    output: 6,
                },
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"completion\""));

        let parsed: UsageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, event.id);
        assert_eq!(parsed.kind(), EventKind::Completion);
        assert_eq!(parsed.tokens(), event.tokens());
    }

    #[test]
    fn test_prompt_defaults() {
        let payload = serde_json::json!({"type": "prompt"});
        let event = UsageEvent::from_payload("u1", &payload).unwrap();
        match &event.body {
            EventBody::Prompt(p) => {
                assert!(p.model.is_none());
                assert!(!p.stream);
            }
            other => panic!("expected prompt body, got {other:?}"),
        }
    }
}
