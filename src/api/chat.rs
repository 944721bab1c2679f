//! Chat completion endpoint
//!
//! POST /api/chat — the interception point of the usage pipeline. The
//! prompt event is recorded before responding; completion and per-tool-call
//! events are handed off fire-and-forget so storage latency never delays
//! the response. The upstream LLM call itself is an external collaborator
//! and is stood in for by a stubbed responder.

use axum::{response::IntoResponse, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use themis_usage::{CompletionEvent, PromptEvent, TokenUsage, ToolEvent, UsageEvent, UsageLogger};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::middleware::identity::UserIdentity;

/// Request body for POST /api/chat
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub message_id: Option<String>,
    pub session_id: Option<String>,
    /// Outbound conversation messages (opaque to the usage pipeline)
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub stream: bool,
}

/// Token usage block of a completion response (provider wire shape)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageBlock {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One response choice
#[derive(Debug, Serialize, ToSchema)]
pub struct Choice {
    pub message: ChoiceMessage,
}

/// Message content of a choice
#[derive(Debug, Serialize, ToSchema)]
pub struct ChoiceMessage {
    pub content: String,
}

/// A tool call requested by the model
#[derive(Debug, Serialize, ToSchema)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: Option<FunctionCall>,
}

/// Function name and arguments of a tool call
#[derive(Debug, Serialize, ToSchema)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Response for POST /api/chat
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub id: Uuid,
    pub model: String,
    pub provider: String,
    pub usage: UsageBlock,
    pub choices: Vec<Choice>,
    pub tool_calls: Vec<ToolCall>,
}

/// Chat completion with usage interception
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Completion response", body = ChatResponse)
    )
)]
pub async fn chat_completion(
    Extension(logger): Extension<Arc<UsageLogger>>,
    identity: UserIdentity,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let user_id = identity.or_anonymous();
    let message_id = request
        .message_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Prompt-side ingestion happens before the upstream call; a failure is
    // logged but never fails the chat request.
    let prompt = UsageEvent::prompt(
        &user_id,
        PromptEvent {
            model: request.model.clone(),
            provider: Some(
                request
                    .provider
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            message_id: Some(message_id.clone()),
            session_id: request.session_id.clone(),
            prompt_length: serde_json::to_string(&request.messages)
                .ok()
                .map(|s| s.len() as u64),
            stream: request.stream,
        },
    );
    if let Err(e) = logger.record(prompt).await {
        warn!(error = %e, "failed to record prompt event");
    }

    let response = stub_completion(&request);

    // Completion-side ingestion is decoupled from the response path: a
    // dashboard read immediately after this response may not see it yet.
    let completion = UsageEvent::completion(
        &user_id,
        CompletionEvent {
            model: Some(response.model.clone()),
            provider: Some(response.provider.clone()),
            message_id: Some(message_id.clone()),
            session_id: request.session_id.clone(),
            tokens: TokenUsage {
                total: response.usage.total_tokens,
                input: response.usage.prompt_tokens,
                output: response.usage.completion_tokens,
            },
        },
    );
    logger.record_detached(completion);

    for call in &response.tool_calls {
        if let Some(function) = &call.function {
            logger.record_detached(UsageEvent::tool(
                &user_id,
                ToolEvent {
                    tool_name: function.name.clone(),
                    message_id: Some(message_id.clone()),
                    session_id: request.session_id.clone(),
                },
            ));
        }
    }

    Json(response)
}

/// Stand-in for the upstream LLM call (an external collaborator)
fn stub_completion(request: &ChatRequest) -> ChatResponse {
    ChatResponse {
        id: Uuid::new_v4(),
        model: request.model.clone().unwrap_or_else(|| "gpt-4".to_string()),
        provider: request
            .provider
            .clone()
            .unwrap_or_else(|| "openai".to_string()),
        usage: UsageBlock {
            total_tokens: 1500,
            prompt_tokens: 500,
            completion_tokens: 1000,
        },
        choices: vec![Choice {
            message: ChoiceMessage {
                content: "Stubbed completion: the usage pipeline recorded this exchange."
                    .to_string(),
            },
        }],
        tool_calls: Vec::new(),
    }
}

/// Create the chat routes
pub fn chat_routes() -> Router {
    Router::new().route("/api/chat", post(chat_completion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_completion_echoes_request_model() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model": "claude-sonnet-4-5-20250929", "provider": "anthropic"}"#,
        )
        .unwrap();
        let response = stub_completion(&request);

        assert_eq!(response.model, "claude-sonnet-4-5-20250929");
        assert_eq!(response.provider, "anthropic");
        assert_eq!(response.usage.total_tokens, 1500);
    }

    #[test]
    fn test_chat_response_wire_shape() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        let response = stub_completion(&request);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"total_tokens\":1500"));
        assert!(json.contains("\"choices\""));
        assert!(json.contains("\"tool_calls\""));
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.model.is_none());
        assert!(request.messages.is_empty());
        assert!(!request.stream);
    }
}
