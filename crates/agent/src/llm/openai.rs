//! OpenAI chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::config::LlmConfig;
use dispatch_core::{ChatMessage, ChatRole, ToolCallRequest, ToolDefinition};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

use super::{tool_request_from_text, GatewayConfigError, InferenceError, InferenceResult, LlmGateway};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiGateway {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiGateway {
    pub fn from_config(
        config: &LlmConfig,
        http: reqwest::Client,
    ) -> Result<Self, GatewayConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(GatewayConfigError::MissingApiKey { provider: "openai" })?;
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
impl LlmGateway for OpenAiGateway {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    async fn infer(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResult, InferenceError> {
        let body = request_body(&self.model, messages, tools);
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(&url)
                .timeout(self.timeout)
                .bearer_auth(self.api_key.expose_secret())
                .json(&body)
                .send()
                .await;
            match result {
                Ok(response) => break response,
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm_transport_retry",
                        provider = "openai",
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

/// Tool results ride back as user-role text since the feedback loop keeps
/// them in serialized form rather than tracking provider call ids.
fn request_body(model: &str, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
    let turns: Vec<Value> = messages
        .iter()
        .map(|message| match message.role {
            ChatRole::System => json!({"role": "system", "content": message.content}),
            ChatRole::User => json!({"role": "user", "content": message.content}),
            ChatRole::Assistant => json!({"role": "assistant", "content": message.content}),
            ChatRole::Tool => json!({
                "role": "user",
                "content": format!("Tool result: {}", message.content),
            }),
        })
        .collect();

    let mut body = json!({"model": model, "messages": turns});
    if !tools.is_empty() {
        let tool_specs: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters_schema(),
                    },
                })
            })
            .collect();
        body["tools"] = Value::Array(tool_specs);
        body["tool_choice"] = Value::String("auto".to_string());
    }
    body
}

fn parse_response(payload: &Value) -> Result<InferenceResult, InferenceError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| InferenceError::Malformed("missing choices[0].message".to_string()))?;

    if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
        let mut calls = Vec::new();
        for tool_call in tool_calls {
            let function = tool_call
                .get("function")
                .ok_or_else(|| InferenceError::Malformed("tool call without function".to_string()))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| InferenceError::Malformed("tool call without name".to_string()))?;
            // Arguments arrive as a JSON string, not an object.
            let arguments = function
                .get("arguments")
                .and_then(Value::as_str)
                .map(serde_json::from_str)
                .transpose()
                .map_err(|err| InferenceError::Malformed(format!("bad tool arguments: {err}")))?
                .unwrap_or_else(|| json!({}));
            let mut call = ToolCallRequest::new(name, arguments);
            if let Some(id) = tool_call.get("id").and_then(Value::as_str) {
                call = call.with_call_id(id);
            }
            calls.push(call);
        }
        if !calls.is_empty() {
            return Ok(InferenceResult::ToolRequest(calls));
        }
    }

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(call) = tool_request_from_text(&text) {
        return Ok(InferenceResult::ToolRequest(vec![call]));
    }
    if text.trim().is_empty() {
        return Err(InferenceError::Malformed("empty answer with no tool calls".to_string()));
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
    fn roles_map_onto_chat_turns() {
        let messages = vec![
            ChatMessage::system("Route inquiries."),
            ChatMessage::user("get payment P-1"),
            ChatMessage::tool("{\"payment_id\":\"P-1\"}"),
        ];
        let body = request_body("gpt-4o", &messages, &[]);

        let turns = body["messages"].as_array().expect("messages");
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0]["role"], "system");
        assert_eq!(turns[2]["role"], "user");
        assert!(turns[2]["content"].as_str().expect("content").starts_with("Tool result:"));
    }

    #[test]
    fn bound_tools_become_function_specs() {
        let tool = ToolDefinition::new("search_payments", "Search payments")
            .with_parameter(ToolParameter::new("status", "Status filter", false));
        let body = request_body("gpt-4o", &[ChatMessage::user("q")], &[tool]);

        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_payments");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn tool_calls_parse_with_string_arguments() {
        let payload = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": {"name": "get_payment", "arguments": "{\"payment_id\":\"P-1\"}"},
                }],
            }}],
        });
        let result = parse_response(&payload).expect("parse");
        let calls = match result {
            InferenceResult::ToolRequest(calls) => calls,
            other => panic!("expected tool request, got {other:?}"),
        };
        assert_eq!(calls[0].call_id, "call_9");
        assert_eq!(calls[0].arguments, json!({"payment_id": "P-1"}));
    }

    #[test]
    fn content_text_is_an_answer() {
        let payload = json!({"choices": [{"message": {"content": "Done."}}]});
        let result = parse_response(&payload).expect("parse");
        assert_eq!(result, InferenceResult::Answer("Done.".to_string()));
    }

    #[test]
    fn empty_choices_are_malformed() {
        assert!(parse_response(&json!({"choices": []})).is_err());
    }

    #[test]
    fn null_content_without_tool_calls_is_malformed() {
        let payload = json!({"choices": [{"message": {"content": null}}]});
        assert!(parse_response(&payload).is_err());
    }
}
