//! Conversation orchestration.
//!
//! [`Assistant`] drives one request from start to finish:
//!
//! 1. retrieve grounding context for the message (degrades to the
//!    "no relevant context" sentinel on any store failure),
//! 2. check the response cache — a hit returns immediately with zero model
//!    calls,
//! 3. run the generate ⇄ execute-tools loop against the completion client,
//!    bounded by `max_tool_rounds`,
//! 4. sanitize the final text,
//! 5. store it in the cache (best-effort) and return it.
//!
//! The message sequence is rebuilt fresh for every incoming message; the
//! caller supplies prior turns each time. Every collaborator is an injected
//! `Arc` handle, so tests substitute scripted models and in-memory stores.

use std::sync::Arc;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::cache::ResponseCache;
use crate::llm::{CompletionClient, CompletionError};
use crate::models::{ChatMessage, StopReason};
use crate::retrieve::{retrieve_context, NO_CONTEXT_SENTINEL};
use crate::store::VectorStore;
use crate::tools::{execute_tool_calls, ToolRegistry};

/// Reply used when the tool loop exceeds its round budget.
const GAVE_UP_REPLY: &str =
    "I wasn't able to complete that request. Could you rephrase or try again?";

/// Tuning knobs for the orchestrator, taken from configuration.
#[derive(Debug, Clone)]
pub struct AssistantOptions {
    /// The person the assistant speaks as.
    pub name: String,
    pub top_k: usize,
    pub max_distance: f32,
    pub max_tool_rounds: usize,
}

/// The top-level conversation engine.
pub struct Assistant {
    model: Arc<dyn CompletionClient>,
    store: Arc<dyn VectorStore>,
    cache: Arc<dyn ResponseCache>,
    tools: Arc<ToolRegistry>,
    options: AssistantOptions,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn CompletionClient>,
        store: Arc<dyn VectorStore>,
        cache: Arc<dyn ResponseCache>,
        tools: Arc<ToolRegistry>,
        options: AssistantOptions,
    ) -> Self {
        Self {
            model,
            store,
            cache,
            tools,
            options,
        }
    }

    /// Answer one visitor message given the prior conversation turns.
    ///
    /// Always returns either a generated/cached answer or an error — never
    /// a partial message sequence.
    pub async fn generate_reply(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        // Retrieval never fails the request: a store error just means we
        // answer ungrounded.
        let context = match retrieve_context(
            self.store.as_ref(),
            message,
            self.options.top_k,
            self.options.max_distance,
        )
        .await
        {
            Ok(ctx) => ctx.formatted_context,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed, continuing without context");
                NO_CONTEXT_SENTINEL.to_string()
            }
        };

        // Cache check. Errors are swallowed: the cache is an optimization,
        // never a dependency.
        match self.cache.lookup(message, &context).await {
            Ok(Some(hit)) => {
                tracing::info!("cache hit");
                return Ok(hit.response);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cache lookup failed"),
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(build_system_prompt(
            &self.options.name,
            &context,
        )));
        messages.extend(sanitize_history(history));
        messages.push(ChatMessage::user(message));

        let specs = self.tools.specs();
        let mut tool_rounds = 0usize;

        let final_text = loop {
            let completion = match self.model.complete(&messages, Some(&specs)).await {
                Ok(c) => c,
                Err(CompletionError::ToolUseFailed(detail)) => {
                    // Known upstream quirk: retry once with tools disabled
                    // and take that output as final, whatever its shape.
                    tracing::warn!(detail = %detail, "tool use failed, retrying without tools");
                    let fallback = self.model.complete(&messages, None).await?;
                    break fallback.content;
                }
                Err(e) => return Err(e.into()),
            };

            if completion.stop_reason == StopReason::ToolCalls && !completion.tool_calls.is_empty()
            {
                tool_rounds += 1;
                if tool_rounds > self.options.max_tool_rounds {
                    tracing::warn!(
                        rounds = tool_rounds,
                        "tool loop exceeded round budget, giving up"
                    );
                    return Ok(GAVE_UP_REPLY.to_string());
                }

                let results = execute_tool_calls(&self.tools, &completion.tool_calls).await;
                let content = if completion.content.is_empty() {
                    None
                } else {
                    Some(completion.content.clone())
                };
                messages.push(ChatMessage::assistant_tool_calls(
                    content,
                    completion.tool_calls,
                ));
                messages.extend(results);
                continue;
            }

            break completion.content;
        };

        let reply = clean_response(&final_text);

        if let Err(e) = self.cache.store(message, &context, &reply, serde_json::json!({})).await {
            tracing::warn!(error = %e, "cache store failed");
        }

        Ok(reply)
    }
}

/// Build the grounding prompt: persona instructions plus retrieved context.
pub fn build_system_prompt(name: &str, retrieved_context: &str) -> String {
    format!(
        "You are acting as {name}. You are answering questions on {name}'s website, \
particularly questions related to {name}'s career, background, skills and experience. \
Your responsibility is to represent {name} for interactions on the website as faithfully as possible.\n\
\n\
{retrieved_context}\n\
\n\
Be professional and engaging, as if talking to a potential client or future employer who \
came across the website. Use the context provided above to answer questions accurately. \
Always cite sources when referencing specific information.\n\
\n\
If you don't know the answer to any question, use your record_unknown_question tool to \
record the question that you couldn't answer, even if it's about something trivial or \
unrelated to career. If the user is engaging in discussion, try to steer them towards \
getting in touch via email; ask for their email and record it using your \
record_user_details tool.\n\
\n\
With this context, please chat with the user, always staying in character as {name}."
    )
}

/// Keep only the fields and roles the model contract allows.
///
/// Front ends attach extra fields (metadata, timestamps) to history
/// entries; only `role` and `content` survive, and only for the four
/// conversation roles.
pub fn sanitize_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter(|m| {
            matches!(
                m.role.as_str(),
                ChatMessage::USER | ChatMessage::ASSISTANT | ChatMessage::SYSTEM | ChatMessage::TOOL
            )
        })
        .map(|m| ChatMessage {
            role: m.role.clone(),
            content: m.content.clone(),
            tool_calls: None,
            tool_call_id: None,
        })
        .collect()
}

static CALL_WITH_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*<function=\w+>\{[^}]*\}(?:</s>)?\s*").expect("valid regex")
});
static BARE_CALL_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*<function=\w+>\s*").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strip raw tool-call syntax the model sometimes leaks into plain text,
/// and collapse runs of blank lines. Cosmetic only.
pub fn clean_response(text: &str) -> String {
    let text = CALL_WITH_ARGS.replace_all(text, " ");
    let text = BARE_CALL_TAG.replace_all(&text, " ");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response_strips_call_syntax() {
        let input = "Hello <function=foo>{\"a\":1}</s>\n\n\n\nWorld";
        assert_eq!(clean_response(input), "Hello World");
    }

    #[test]
    fn test_clean_response_strips_bare_tag() {
        let input = "Sure. <function=record_user_details> Let me note that down.";
        assert_eq!(clean_response(input), "Sure. Let me note that down.");
    }

    #[test]
    fn test_clean_response_collapses_blank_runs() {
        let input = "First paragraph.\n\n\n\n\nSecond paragraph.";
        assert_eq!(clean_response(input), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_clean_response_preserves_normal_text() {
        let input = "A perfectly ordinary answer.\n\nWith two paragraphs.";
        assert_eq!(clean_response(input), input);
    }

    #[test]
    fn test_sanitize_history_drops_extra_fields_and_roles() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage {
                role: "assistant".to_string(),
                content: Some("hello".to_string()),
                tool_calls: Some(vec![]),
                tool_call_id: Some("stale".to_string()),
            },
            ChatMessage {
                role: "developer".to_string(),
                content: Some("should vanish".to_string()),
                tool_calls: None,
                tool_call_id: None,
            },
        ];

        let clean = sanitize_history(&history);
        assert_eq!(clean.len(), 2);
        assert!(clean.iter().all(|m| m.tool_calls.is_none()));
        assert!(clean.iter().all(|m| m.tool_call_id.is_none()));
        assert!(clean.iter().all(|m| m.role != "developer"));
    }

    #[test]
    fn test_system_prompt_embeds_context_and_name() {
        let prompt = build_system_prompt("Ada Lovelace", "=== CONTEXT ===\nfacts here");
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("facts here"));
        assert!(prompt.contains("record_unknown_question"));
        assert!(prompt.contains("record_user_details"));
    }
}
