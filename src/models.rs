//! Core data models used throughout Concierge.
//!
//! These types represent the chunks, retrieval results, and conversation
//! messages that flow through the indexing and reply pipeline.

use serde::{Deserialize, Serialize};

/// Origin format of a knowledge document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "Text")]
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "PDF",
            SourceType::Text => "Text",
        }
    }
}

/// Metadata attached to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source file name (e.g. `resume.pdf`).
    pub source: String,
    pub source_type: SourceType,
    /// Zero-based position within the parent document.
    pub chunk_index: usize,
    /// Total chunks produced from the parent document.
    pub total_chunks: usize,
}

/// A single retrieval hit, alive for one query.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Raw cosine distance: 0 = identical, 2 = maximally dissimilar.
    pub distance: f32,
    /// `max(0, 1 - distance/2)`, rescaled onto [0, 1].
    pub relevance: f32,
}

/// A message in the conversation sequence sent to the model.
///
/// Serializes to the OpenAI-compatible wire shape: assistant messages may
/// carry `tool_calls`, tool messages carry the `tool_call_id` they answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub const SYSTEM: &'static str = "system";
    pub const USER: &'static str = "user";
    pub const ASSISTANT: &'static str = "assistant";
    pub const TOOL: &'static str = "tool";

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Self::SYSTEM, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Self::USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Self::ASSISTANT, content)
    }

    /// An assistant turn that requests tool invocations.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// A tool result paired back to the call id it answers.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A model-issued request to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id assigned by the model.
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// The function half of a [`ToolCall`]: a name plus JSON-encoded arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as a JSON object, encoded as a string on the wire.
    pub arguments: String,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Final answer.
    Stop,
    /// The model wants tools executed before continuing.
    ToolCalls,
    /// Output truncated at the token limit.
    Length,
    ContentFilter,
}

impl StopReason {
    /// Map an OpenAI-compatible `finish_reason` string. Unknown values are
    /// treated as a final answer rather than an error.
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "tool_calls" => StopReason::ToolCalls,
            "length" => StopReason::Length,
            "content_filter" => StopReason::ContentFilter,
            _ => StopReason::Stop,
        }
    }
}

/// One completion returned by the model service.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub stop_reason: StopReason,
    pub tool_calls: Vec<ToolCall>,
}
