//! LLM gateway abstraction.
//!
//! A gateway takes an ordered message list plus the tools bound for this
//! call and returns either a direct answer or a batch of proposed tool
//! calls. Provider selection happens once, at construction, through
//! [`build_gateway`]; an unconfigured provider fails there and never at
//! inference time.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch_core::config::{LlmConfig, LlmProvider};
use dispatch_core::{ChatMessage, ToolCallRequest, ToolDefinition};
use serde_json::Value;
use thiserror::Error;

pub mod anthropic;
pub mod offline;
pub mod openai;

pub use anthropic::AnthropicGateway;
pub use offline::OfflineGateway;
pub use openai::OpenAiGateway;

/// Outcome of one inference pass.
#[derive(Clone, Debug, PartialEq)]
pub enum InferenceResult {
    Answer(String),
    ToolRequest(Vec<ToolCallRequest>),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("llm transport failure: {0}")]
    Transport(String),
    #[error("llm provider returned status {status}: {detail}")]
    Provider { status: u16, detail: String },
    #[error("llm response payload was malformed: {0}")]
    Malformed(String),
}

/// Construction-time configuration failure. Surfaces during startup, not
/// per-request.
#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error("llm provider `{provider}` requires an api key")]
    MissingApiKey { provider: &'static str },
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One inference pass over the full message log. When `tools` is
    /// non-empty the model may propose zero or more calls; every proposed
    /// call carries a unique `call_id` so results can be matched back.
    async fn infer(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<InferenceResult, InferenceError>;
}

/// Select exactly one backend from configuration. Unknown provider names are
/// already rejected when the config is parsed; missing credentials fail
/// here.
pub fn build_gateway(
    config: &LlmConfig,
    http: &reqwest::Client,
) -> Result<Arc<dyn LlmGateway>, GatewayConfigError> {
    match config.provider {
        LlmProvider::Anthropic => {
            Ok(Arc::new(AnthropicGateway::from_config(config, http.clone())?))
        }
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiGateway::from_config(config, http.clone())?)),
        LlmProvider::Offline => Ok(Arc::new(OfflineGateway::new())),
    }
}

/// Extract a JSON object embedded in free-form prose: the substring between
/// the first `{` and the last `}`. Returns `None` when no parseable object
/// is present, in which case callers treat the whole text as an
/// unstructured answer.
pub(crate) fn extract_embedded_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Some providers emit a tool request as an action JSON object inside prose
/// instead of a native tool-call block. Recognize the `{action/tool_name,
/// parameters/arguments}` convention and fold it into a [`ToolCallRequest`];
/// anything else stays an answer.
pub(crate) fn tool_request_from_text(text: &str) -> Option<ToolCallRequest> {
    let payload = extract_embedded_json(text)?;
    let name = payload
        .get("tool_name")
        .or_else(|| payload.get("action"))
        .and_then(Value::as_str)?
        .to_string();
    let arguments = payload
        .get("arguments")
        .or_else(|| payload.get("parameters"))
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Some(ToolCallRequest::new(name, arguments))
}
