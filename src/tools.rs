//! Side-effecting tools the model can call, and the executor that runs
//! model-issued invocations.
//!
//! Tools are resolved through an explicit [`ToolRegistry`] built once at
//! startup and passed into the conversation loop — never from ambient
//! scope. The executor isolates every invocation: an unknown tool name
//! yields an empty result object, invalid arguments yield a structured
//! error result, and a handler failure is caught per-call. Every
//! invocation produces exactly one result message paired with its
//! correlation id, so the model-side conversation state machine never sees
//! a dangling call.
//!
//! # Built-in tools
//!
//! | Tool | Effect |
//! |------|--------|
//! | `record_user_details` | Persist a contact lead, send a notification |
//! | `record_unknown_question` | Persist a knowledge gap, send a notification |

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::leads::LeadStore;
use crate::models::{ChatMessage, ToolCall};
use crate::notify::Notifier;

/// A callable tool exposed to the language model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as the model addresses it (lowercase, underscores).
    fn name(&self) -> &str;

    /// One-line description the model uses to decide when to call it.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters: an object schema with
    /// `properties` and optionally `required`.
    fn parameters_schema(&self) -> Value;

    /// Execute with already-validated parameters.
    async fn execute(&self, params: Value) -> Result<Value>;
}

/// Declarative description of a tool, serialized into model requests.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry mapping tool names to handlers.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry with the two built-in recording tools.
    pub fn with_builtins(leads: Arc<LeadStore>, notifier: Arc<Notifier>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(RecordUserDetailsTool {
            leads: leads.clone(),
            notifier: notifier.clone(),
        }));
        registry.register(Box::new(RecordUnknownQuestionTool { leads, notifier }));
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Find a tool by name.
    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Declarative specs for every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute a batch of model-issued tool calls.
///
/// Returns one tool-result message per call, in call order, each paired
/// with the call's correlation id. No invocation can abort the batch.
pub async fn execute_tool_calls(registry: &ToolRegistry, calls: &[ToolCall]) -> Vec<ChatMessage> {
    let mut results = Vec::with_capacity(calls.len());

    for call in calls {
        let name = &call.function.name;
        let result = match registry.find(name) {
            // Unknown tool: an empty result object, not an error. One bad
            // tool reference must not abort the turn.
            None => {
                tracing::warn!(tool = %name, "model called unregistered tool");
                json!({})
            }
            Some(tool) => match serde_json::from_str::<Value>(&call.function.arguments) {
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "malformed tool arguments");
                    json!({ "error": format!("invalid arguments: {}", e) })
                }
                Ok(args) => match validate_args(&tool.parameters_schema(), &args) {
                    Err(msg) => {
                        tracing::warn!(tool = %name, reason = %msg, "tool arguments rejected");
                        json!({ "error": msg })
                    }
                    Ok(()) => {
                        tracing::info!(tool = %name, "executing tool call");
                        match tool.execute(args).await {
                            Ok(value) => value,
                            Err(e) => {
                                tracing::warn!(tool = %name, error = %e, "tool execution failed");
                                json!({ "error": e.to_string() })
                            }
                        }
                    }
                },
            },
        };

        let content = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
        results.push(ChatMessage::tool_result(call.id.clone(), content));
    }

    results
}

/// Validate a tool argument payload against the tool's declared schema.
///
/// Checks that the payload is an object, that every `required` field is
/// present, and that fields with a declared primitive type carry that type.
fn validate_args(schema: &Value, args: &Value) -> std::result::Result<(), String> {
    let args_obj = match args.as_object() {
        Some(o) => o,
        None => return Err("arguments must be a JSON object".to_string()),
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required {
            let field = field.as_str().unwrap_or_default();
            match args_obj.get(field) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required argument: {}", field));
                }
                Some(_) => {}
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, value) in args_obj {
            let declared = match properties.get(field).and_then(|p| p.get("type")) {
                Some(t) => t.as_str().unwrap_or_default(),
                None => continue,
            };
            let ok = match declared {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "object" => value.is_object(),
                "array" => value.is_array(),
                _ => true,
            };
            if !ok {
                return Err(format!("argument '{}' must be of type {}", field, declared));
            }
        }
    }

    Ok(())
}

// ============ Built-in tools ============

/// Records that a visitor wants to get in touch.
pub struct RecordUserDetailsTool {
    leads: Arc<LeadStore>,
    notifier: Arc<Notifier>,
}

#[async_trait]
impl Tool for RecordUserDetailsTool {
    fn name(&self) -> &str {
        "record_user_details"
    }

    fn description(&self) -> &str {
        "Use this tool to record that a user is interested in being in touch and provided an email address"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "The email address of this user"
                },
                "name": {
                    "type": "string",
                    "description": "The user's name, if they provided it"
                },
                "notes": {
                    "type": "string",
                    "description": "Any additional information about the conversation that's worth recording to give context"
                }
            },
            "required": ["email"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let email = params["email"].as_str().unwrap_or_default();
        let name = params["name"].as_str();
        let notes = params["notes"].as_str();

        self.leads.insert_lead(email, name, notes).await?;

        self.notifier
            .notify(&format!(
                "Recording interest from {} with email {} and notes {}",
                name.unwrap_or(crate::leads::NAME_NOT_PROVIDED),
                email,
                notes.unwrap_or(crate::leads::NOTES_NOT_PROVIDED)
            ))
            .await;

        Ok(json!({ "recorded": "ok" }))
    }
}

/// Records a question the assistant could not answer.
pub struct RecordUnknownQuestionTool {
    leads: Arc<LeadStore>,
    notifier: Arc<Notifier>,
}

#[async_trait]
impl Tool for RecordUnknownQuestionTool {
    fn name(&self) -> &str {
        "record_unknown_question"
    }

    fn description(&self) -> &str {
        "Always use this tool to record any question that couldn't be answered as you didn't know the answer"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question that couldn't be answered"
                }
            },
            "required": ["question"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let question = params["question"].as_str().unwrap_or_default();

        self.leads.insert_gap(question).await?;

        self.notifier
            .notify(&format!(
                "Recording {} asked that I couldn't answer",
                question
            ))
            .await;

        Ok(json!({ "recorded": "ok" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FunctionCall;
    use crate::{db, migrate};

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    async fn test_registry() -> (tempfile::TempDir, Arc<LeadStore>, ToolRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("tools.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let leads = Arc::new(LeadStore::new(pool));
        let notifier = Arc::new(Notifier::with_url("http://127.0.0.1:1/unused", None, None));
        let registry = ToolRegistry::with_builtins(leads.clone(), notifier);
        (dir, leads, registry)
    }

    #[tokio::test]
    async fn test_builtin_registry_contents() {
        let (_dir, _leads, registry) = test_registry().await;
        assert_eq!(registry.len(), 2);
        assert!(registry.find("record_user_details").is_some());
        assert!(registry.find("record_unknown_question").is_some());
        assert!(registry.find("launch_missiles").is_none());

        let specs = registry.specs();
        assert_eq!(specs[0].name, "record_user_details");
        assert_eq!(specs[1].parameters["required"][0], "question");
    }

    #[tokio::test]
    async fn test_record_user_details_persists_lead() {
        let (_dir, leads, registry) = test_registry().await;

        let calls = vec![call(
            "call_1",
            "record_user_details",
            r#"{"email":"visitor@example.com","name":"Vera"}"#,
        )];
        let results = execute_tool_calls(&registry, &calls).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
        let payload: Value =
            serde_json::from_str(results[0].content.as_deref().unwrap()).unwrap();
        assert_eq!(payload["recorded"], "ok");

        let stored = leads.list_leads().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].email, "visitor@example.com");
        assert_eq!(stored[0].name, "Vera");
    }

    #[tokio::test]
    async fn test_record_unknown_question_persists_gap() {
        let (_dir, leads, registry) = test_registry().await;

        let calls = vec![call(
            "call_2",
            "record_unknown_question",
            r#"{"question":"What is your favorite opera?"}"#,
        )];
        execute_tool_calls(&registry, &calls).await;

        let gaps = leads.list_gaps().await.unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].question, "What is your favorite opera?");
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_empty_object() {
        let (_dir, _leads, registry) = test_registry().await;

        let calls = vec![call("call_3", "no_such_tool", "{}")];
        let results = execute_tool_calls(&registry, &calls).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content.as_deref(), Some("{}"));
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_3"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_rejected() {
        let (_dir, leads, registry) = test_registry().await;

        let calls = vec![call("call_4", "record_user_details", r#"{"name":"No Email"}"#)];
        let results = execute_tool_calls(&registry, &calls).await;

        let payload: Value =
            serde_json::from_str(results[0].content.as_deref().unwrap()).unwrap();
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("missing required argument: email"));
        assert!(leads.list_leads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_argument_type_rejected() {
        let (_dir, _leads, registry) = test_registry().await;

        let calls = vec![call("call_5", "record_unknown_question", r#"{"question":42}"#)];
        let results = execute_tool_calls(&registry, &calls).await;

        let payload: Value =
            serde_json::from_str(results[0].content.as_deref().unwrap()).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("type string"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_rejected() {
        let (_dir, _leads, registry) = test_registry().await;

        let calls = vec![call("call_6", "record_unknown_question", "not json")];
        let results = execute_tool_calls(&registry, &calls).await;

        let payload: Value =
            serde_json::from_str(results[0].content.as_deref().unwrap()).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_every_call_gets_a_result_in_order() {
        let (_dir, _leads, registry) = test_registry().await;

        let calls = vec![
            call("a", "record_unknown_question", r#"{"question":"one"}"#),
            call("b", "no_such_tool", "{}"),
            call("c", "record_unknown_question", r#"{"question":"two"}"#),
        ];
        let results = execute_tool_calls(&registry, &calls).await;

        let ids: Vec<_> = results
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
