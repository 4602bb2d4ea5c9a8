//! Deterministic offline backend.
//!
//! A first-class gateway variant (not a test double wired into provider
//! internals): given the same message log and tool set it always produces
//! the same result, which makes the two-phase protocol exactly reproducible
//! in tests and demos. Requires no credentials.

use async_trait::async_trait;
use dispatch_core::{ChatMessage, ChatRole, ToolCallRequest, ToolDefinition};
use serde_json::Value;

use super::{InferenceError, InferenceResult, LlmGateway};

#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineGateway;

impl OfflineGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmGateway for OfflineGateway {
    fn provider_name(&self) -> &'static str {
        "offline"
    }

    async fn infer(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResult, InferenceError> {
        let latest_user = messages
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default();

        // Phase 2: tool results are already in the log, so summarize them.
        let tool_payloads = messages
            .iter()
            .filter(|message| message.role == ChatRole::Tool)
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        if !tool_payloads.is_empty() {
            return Ok(InferenceResult::Answer(format!(
                "Here is what the tools returned for \"{latest_user}\": {}",
                tool_payloads.join(" ")
            )));
        }

        // Phase 1: propose a tool call when the query mentions one.
        if let Some(request) = propose_tool(latest_user, tools) {
            return Ok(InferenceResult::ToolRequest(vec![request]));
        }

        Ok(InferenceResult::Answer(canned_answer(latest_user)))
    }
}

/// Pick the first bound tool whose name shares a meaningful word with the
/// query. Declaration order of the tool set breaks ties, so the choice is
/// stable.
fn propose_tool(message: &str, tools: &[ToolDefinition]) -> Option<ToolCallRequest> {
    let normalized = message.to_lowercase();
    for tool in tools {
        let mentioned = tool
            .name
            .split('_')
            .filter(|word| !matches!(*word, "get" | "list" | "search" | "by" | "with" | "create"))
            .any(|word| normalized.contains(word.trim_end_matches('s')));
        if mentioned {
            let arguments = default_arguments(tool, message);
            return Some(
                ToolCallRequest::new(&tool.name, arguments)
                    .with_call_id(format!("offline-{}", tool.name)),
            );
        }
    }
    None
}

/// Plausible arguments: declared defaults, plus the query text for any
/// required parameter named like a search term.
fn default_arguments(tool: &ToolDefinition, message: &str) -> Value {
    let mut arguments = serde_json::Map::new();
    for parameter in &tool.parameters {
        if let Some(default) = &parameter.default {
            arguments.insert(parameter.name.clone(), default.clone());
        } else if parameter.required && parameter.name.contains("query") {
            arguments.insert(parameter.name.clone(), Value::String(message.to_string()));
        }
    }
    Value::Object(arguments)
}

fn canned_answer(message: &str) -> String {
    let normalized = message.to_lowercase();
    if normalized.contains("architecture") || normalized.contains("design") {
        "For service architecture, start from resource-oriented boundaries: one service per \
         data domain, explicit versioned HTTP contracts between them, health endpoints for \
         each, and horizontal scaling behind a stateless API layer."
            .to_string()
    } else if normalized.contains("document") {
        "A solid technical document needs an overview, the endpoint reference, authentication \
         notes, and a troubleshooting section. Keep examples runnable and version the document \
         alongside the API it describes."
            .to_string()
    } else if normalized.contains('?') || normalized.contains("what") || normalized.contains("how")
    {
        "This is a deterministic offline answer. In production this question would be handled \
         by the configured LLM provider."
            .to_string()
    } else {
        format!(
            "Offline backend response to: \"{message}\". Configure a real provider for \
             production answers."
        )
    }
}
