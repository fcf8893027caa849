//! Language-model completion client.
//!
//! [`CompletionClient`] is the boundary around the chat completion service.
//! The conversation loop needs exactly one operation: given a message
//! sequence and the available tool specs, produce a [`Completion`] whose
//! stop reason distinguishes "final answer" from "wants tools executed".
//!
//! [`OpenAiChatClient`] implements the trait against any OpenAI-compatible
//! `/chat/completions` endpoint. Some compatible providers reject requests
//! with a `tool_use_failed` error when the model emits a malformed
//! tool-call form; that case is surfaced as
//! [`CompletionError::ToolUseFailed`] so the orchestrator can apply its
//! single scoped retry without tools.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ModelConfig;
use crate::models::{ChatMessage, Completion, StopReason, ToolCall};
use crate::tools::ToolSpec;

/// Completion request error. The orchestrator matches on
/// [`ToolUseFailed`](CompletionError::ToolUseFailed); everything else
/// propagates as a generic upstream failure.
#[derive(Debug)]
pub enum CompletionError {
    /// The provider rejected the model's tool-calling form (a known quirk
    /// of some OpenAI-compatible backends).
    ToolUseFailed(String),
    /// Any other API-level rejection.
    Api(String),
    /// Transport-level failure.
    Network(String),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::ToolUseFailed(e) => write!(f, "tool use failed: {}", e),
            CompletionError::Api(e) => write!(f, "completion API error: {}", e),
            CompletionError::Network(e) => write!(f, "completion request failed: {}", e),
        }
    }
}

impl std::error::Error for CompletionError {}

/// Boundary trait around the completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request one completion for the message sequence. `tools` carries the
    /// callable tool specs, or `None` to disable tool calling.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<Completion, CompletionError>;
}

// ============ OpenAI-compatible implementation ============

/// Chat client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// Create a client from configuration, reading the API key from
    /// `OPENAI_API_KEY`.
    pub fn new(config: &ModelConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key. Used by tests.
    pub fn with_api_key(config: &ModelConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<Completion, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(specs) = tools {
            if !specs.is_empty() {
                let wire: Vec<serde_json::Value> = specs
                    .iter()
                    .map(|s| serde_json::json!({ "type": "function", "function": s }))
                    .collect();
                body["tools"] = serde_json::Value::Array(wire);
            }
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            if status.as_u16() == 400 && body_text.contains("tool_use_failed") {
                return Err(CompletionError::ToolUseFailed(body_text));
            }
            return Err(CompletionError::Api(format!("{}: {}", status, body_text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Api(format!("malformed response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Api("response had no choices".to_string()))?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let stop_reason = match choice.finish_reason.as_deref() {
            Some(reason) => StopReason::from_finish_reason(reason),
            // Some providers omit finish_reason on tool turns.
            None if !tool_calls.is_empty() => StopReason::ToolCalls,
            None => StopReason::Stop,
        };

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            stop_reason,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_client(base_url: String) -> OpenAiChatClient {
        let config = ModelConfig {
            base_url,
            model: "test-model".to_string(),
            max_tool_rounds: 8,
            timeout_secs: 5,
        };
        OpenAiChatClient::with_api_key(&config, "test-key").unwrap()
    }

    #[tokio::test]
    async fn test_final_answer_completion() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_partial(r#"{"model": "test-model"}"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "Hello there." },
                    "finish_reason": "stop"
                }]
            }));
        });

        let client = test_client(server.url("/v1"));
        let completion = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(completion.content, "Hello there.");
        assert_eq!(completion.stop_reason, StopReason::Stop);
        assert!(completion.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_tool_call_completion() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_9",
                            "type": "function",
                            "function": {
                                "name": "record_unknown_question",
                                "arguments": "{\"question\":\"why?\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }]
            }));
        });

        let client = test_client(server.url("/v1"));
        let specs = vec![ToolSpec {
            name: "record_unknown_question".to_string(),
            description: "record".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let completion = client
            .complete(&[ChatMessage::user("why?")], Some(&specs))
            .await
            .unwrap();

        assert_eq!(completion.stop_reason, StopReason::ToolCalls);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_9");
        assert_eq!(
            completion.tool_calls[0].function.name,
            "record_unknown_question"
        );
    }

    #[tokio::test]
    async fn test_tool_use_failed_maps_to_typed_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(400).json_body(serde_json::json!({
                "error": {
                    "code": "tool_use_failed",
                    "message": "Failed to call a function"
                }
            }));
        });

        let client = test_client(server.url("/v1"));
        let err = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::ToolUseFailed(_)));
    }

    #[tokio::test]
    async fn test_other_api_errors_are_generic() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500).body("upstream exploded");
        });

        let client = test_client(server.url("/v1"));
        let err = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Api(_)));
    }

    #[tokio::test]
    async fn test_missing_finish_reason_with_tool_calls() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "t", "arguments": "{}" }
                        }]
                    },
                    "finish_reason": null
                }]
            }));
        });

        let client = test_client(server.url("/v1"));
        let completion = client
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap();
        assert_eq!(completion.stop_reason, StopReason::ToolCalls);
    }
}
