use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Parameter specification for a tool, consumed by the LLM when deciding
/// which tool to call and with which arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
            param_type: "string".to_string(),
            default: None,
        }
    }

    pub fn with_type(mut self, param_type: impl Into<String>) -> Self {
        self.param_type = param_type.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Declaration of a callable tool: unique name, human-readable description
/// (part of the LLM's tool-selection context), and parameter schema.
/// Registered once at startup and immutable thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), parameters: Vec::new() }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Provider-neutral JSON Schema for the parameter set, in the shape the
    /// chat-completion tool APIs expect.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for parameter in &self.parameters {
            let mut spec = serde_json::Map::new();
            spec.insert("type".to_string(), json!(schema_type(&parameter.param_type)));
            spec.insert("description".to_string(), json!(parameter.description));
            if let Some(default) = &parameter.default {
                spec.insert("default".to_string(), default.clone());
            }
            properties.insert(parameter.name.clone(), Value::Object(spec));
            if parameter.required {
                required.push(json!(parameter.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn schema_type(param_type: &str) -> &str {
    match param_type {
        "integer" | "number" | "boolean" | "object" | "array" => param_type,
        _ => "string",
    }
}

/// A tool invocation proposed by the LLM in phase 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self { call_id: Uuid::new_v4().to_string(), tool_name: tool_name.into(), arguments }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "payload")]
pub enum ToolOutcome {
    Success(Value),
    Error(String),
}

/// Outcome of one executed tool call. Errors are folded into data here so
/// they can be fed back to the LLM for the phase-2 pass; nothing raises past
/// the executor boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub arguments: Value,
    pub outcome: ToolOutcome,
}

impl ToolCallResult {
    pub fn success(tool_name: impl Into<String>, arguments: Value, payload: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn error(tool_name: impl Into<String>, arguments: Value, message: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
            outcome: ToolOutcome::Error(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    /// The result payload as JSON: the success value as-is, or the captured
    /// failure in the collaborators' `{"error": ...}` convention.
    pub fn result_value(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Success(payload) => payload.clone(),
            ToolOutcome::Error(message) => json!({ "error": message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ToolCallRequest, ToolCallResult, ToolDefinition, ToolParameter};

    #[test]
    fn parameters_schema_lists_required_names() {
        let definition = ToolDefinition::new("search_payments", "Search payments by criteria")
            .with_parameter(ToolParameter::new("status", "Payment status filter", true))
            .with_parameter(
                ToolParameter::new("limit", "Maximum results", false)
                    .with_type("integer")
                    .with_default(10),
            );

        let schema = definition.parameters_schema();
        assert_eq!(schema["required"], json!(["status"]));
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert_eq!(schema["properties"]["limit"]["default"], 10);
    }

    #[test]
    fn unknown_parameter_types_fall_back_to_string() {
        let definition = ToolDefinition::new("get_payment", "Get a payment")
            .with_parameter(ToolParameter::new("payment_id", "Payment id", true).with_type("id"));
        let schema = definition.parameters_schema();
        assert_eq!(schema["properties"]["payment_id"]["type"], "string");
    }

    #[test]
    fn requests_receive_distinct_call_ids() {
        let first = ToolCallRequest::new("list_payments", json!({"limit": 10}));
        let second = ToolCallRequest::new("list_payments", json!({"limit": 10}));
        assert_ne!(first.call_id, second.call_id);
    }

    #[test]
    fn error_outcome_folds_into_error_payload() {
        let result = ToolCallResult::error("get_payment", json!({"payment_id": "P-1"}), "HTTP 404");
        assert!(!result.is_success());
        assert_eq!(result.result_value(), json!({"error": "HTTP 404"}));
    }
}
