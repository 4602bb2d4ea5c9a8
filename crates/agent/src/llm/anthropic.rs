//! Anthropic Messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::config::LlmConfig;
use dispatch_core::{ChatMessage, ChatRole, ToolCallRequest, ToolDefinition};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use super::{tool_request_from_text, GatewayConfigError, InferenceError, InferenceResult, LlmGateway};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicGateway {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl AnthropicGateway {
    pub fn from_config(
        config: &LlmConfig,
        http: reqwest::Client,
    ) -> Result<Self, GatewayConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(GatewayConfigError::MissingApiKey { provider: "anthropic" })?;
        Ok(Self {
            http,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmGateway for AnthropicGateway {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    async fn infer(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResult, InferenceError> {
        let body = request_body(&self.model, messages, tools);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(&url)
                .timeout(self.timeout)
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await;
            match result {
                Ok(response) => break response,
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm_transport_retry",
                        provider = "anthropic",
                        attempt,
                        error = %err,
                        "retrying after transport failure"
                    );
                }
                Err(err) => return Err(InferenceError::Transport(err.to_string())),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(InferenceError::Provider { status: status.as_u16(), detail });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| InferenceError::Malformed(err.to_string()))?;
        parse_response(&payload)
    }
}

/// The Messages API takes the system prompt as a top-level field, not a
/// message. Tool results ride back as user-role text since the feedback
/// loop keeps them in serialized form.
fn request_body(model: &str, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            ChatRole::System => system_parts.push(message.content.clone()),
            ChatRole::User => turns.push(json!({"role": "user", "content": message.content})),
            ChatRole::Assistant => {
                turns.push(json!({"role": "assistant", "content": message.content}))
            }
            ChatRole::Tool => turns.push(json!({
                "role": "user",
                "content": format!("Tool result: {}", message.content),
            })),
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": turns,
    });
    if !system_parts.is_empty() {
        body["system"] = Value::String(system_parts.join("\n\n"));
    }
    if !tools.is_empty() {
        let tool_specs: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters_schema(),
                })
            })
            .collect();
        body["tools"] = Value::Array(tool_specs);
    }
    body
}

/// Native `tool_use` content blocks win; otherwise concatenated text is
/// scanned for the embedded action-JSON convention before being treated as
/// a plain answer.
fn parse_response(payload: &Value) -> Result<InferenceResult, InferenceError> {
    let blocks = payload
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| InferenceError::Malformed("missing content array".to_string()))?;

    let mut calls = Vec::new();
    let mut text_parts = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| InferenceError::Malformed("tool_use without name".to_string()))?;
                let arguments = block.get("input").cloned().unwrap_or_else(|| json!({}));
                let mut call = ToolCallRequest::new(name, arguments);
                if let Some(id) = block.get("id").and_then(Value::as_str) {
                    call = call.with_call_id(id);
                }
                calls.push(call);
            }
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    text_parts.push(text.to_string());
                }
            }
            _ => {}
        }
    }

    if !calls.is_empty() {
        return Ok(InferenceResult::ToolRequest(calls));
    }
    let text = text_parts.join("");
    if let Some(call) = tool_request_from_text(&text) {
        return Ok(InferenceResult::ToolRequest(vec![call]));
    }
    if text.trim().is_empty() {
        return Err(InferenceError::Malformed("empty answer with no tool use".to_string()));
    }
    Ok(InferenceResult::Answer(text))
}

#[cfg(test)]
mod tests {
    use dispatch_core::{ChatMessage, ToolDefinition, ToolParameter};
    use serde_json::json;

    use super::{parse_response, request_body};
    use crate::llm::InferenceResult;

    #[test]
    fn system_message_becomes_top_level_field() {
        let messages = vec![
            ChatMessage::system("You route payment inquiries."),
            ChatMessage::user("list payments"),
        ];
        let body = request_body("claude-3-5-sonnet-20241022", &messages, &[]);

        assert_eq!(body["system"], "You route payment inquiries.");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn bound_tools_are_sent_with_input_schemas() {
        let tool = ToolDefinition::new("get_payment", "Fetch one payment")
            .with_parameter(ToolParameter::new("payment_id", "Payment identifier", true));
        let body = request_body("m", &[ChatMessage::user("q")], &[tool]);

        assert_eq!(body["tools"][0]["name"], "get_payment");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["tools"][0]["input_schema"]["required"][0], "payment_id");
    }

    #[test]
    fn tool_use_blocks_win_over_text() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "Let me look that up."},
                {"type": "tool_use", "id": "toolu_01", "name": "get_payment",
                 "input": {"payment_id": "P-1"}},
            ],
        });
        let result = parse_response(&payload).expect("parse");
        let calls = match result {
            InferenceResult::ToolRequest(calls) => calls,
            other => panic!("expected tool request, got {other:?}"),
        };
        assert_eq!(calls[0].call_id, "toolu_01");
        assert_eq!(calls[0].tool_name, "get_payment");
        assert_eq!(calls[0].arguments, json!({"payment_id": "P-1"}));
    }

    #[test]
    fn action_json_in_prose_is_recognized() {
        let payload = json!({
            "content": [{"type": "text", "text":
                "{\"action\": \"list_payments\", \"parameters\": {\"limit\": 10}}"}],
        });
        let result = parse_response(&payload).expect("parse");
        assert!(matches!(result, InferenceResult::ToolRequest(calls) if calls[0].tool_name == "list_payments"));
    }

    #[test]
    fn plain_text_is_an_answer() {
        let payload = json!({"content": [{"type": "text", "text": "All good."}]});
        let result = parse_response(&payload).expect("parse");
        assert_eq!(result, InferenceResult::Answer("All good.".to_string()));
    }

    #[test]
    fn missing_content_is_malformed() {
        assert!(parse_response(&json!({"id": "msg_1"})).is_err());
    }

    #[test]
    fn empty_content_is_malformed_not_a_blank_answer() {
        assert!(parse_response(&json!({"content": []})).is_err());
        assert!(parse_response(&json!({"content": [{"type": "text", "text": "  "}]})).is_err());
    }
}
