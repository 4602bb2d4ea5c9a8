//! HTTP plumbing shared by every data-service tool.
//!
//! Each external service gets one [`ServiceClient`] (base URL + shared
//! connection pool). A concrete tool is a [`ToolDefinition`] bound to a
//! [`RouteSpec`]; the generic [`HttpTool`] handles argument validation,
//! path templating, and error folding for all of them.

use std::time::Duration;

use async_trait::async_trait;
use dispatch_core::ToolDefinition;
use serde_json::Value;

use super::{Tool, ToolError};

#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, ToolError> {
        let request = self
            .http
            .get(format!("{}{path}", self.base_url))
            .timeout(self.timeout)
            .query(query);
        Self::dispatch(request).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        let request = self
            .http
            .post(format!("{}{path}", self.base_url))
            .timeout(self.timeout)
            .json(body);
        Self::dispatch(request).await
    }

    async fn dispatch(request: reqwest::RequestBuilder) -> Result<Value, ToolError> {
        let response = request
            .send()
            .await
            .map_err(|err| ToolError::Upstream(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream(format!("HTTP {}: {detail}", status.as_u16())));
        }
        response
            .json()
            .await
            .map_err(|err| ToolError::Upstream(format!("invalid JSON body: {err}")))
    }
}

/// Where a tool's arguments go on the wire.
#[derive(Clone, Debug)]
pub enum RouteSpec {
    /// `path` may contain `{name}` segments filled from arguments; the
    /// remaining listed keys become query parameters.
    Get { path: &'static str, query: &'static [&'static str] },
    /// Arguments not consumed by `{name}` segments form the JSON body.
    Post { path: &'static str },
}

pub struct HttpTool {
    definition: ToolDefinition,
    client: ServiceClient,
    route: RouteSpec,
}

impl HttpTool {
    pub fn new(definition: ToolDefinition, client: ServiceClient, route: RouteSpec) -> Self {
        Self { definition, client, route }
    }

    /// Declared defaults fill in absent optional arguments; a required
    /// parameter that is still absent afterwards rejects the call before it
    /// touches the network.
    fn effective_arguments(&self, arguments: &Value) -> Result<serde_json::Map<String, Value>, ToolError> {
        let mut effective = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(ToolError::Invocation(format!(
                    "arguments must be a JSON object, got {other}"
                )))
            }
        };
        for parameter in &self.definition.parameters {
            if !effective.contains_key(&parameter.name) {
                if let Some(default) = &parameter.default {
                    effective.insert(parameter.name.clone(), default.clone());
                } else if parameter.required {
                    return Err(ToolError::Invocation(format!(
                        "missing required argument `{}`",
                        parameter.name
                    )));
                }
            }
        }
        Ok(effective)
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let mut effective = self.effective_arguments(arguments)?;
        match &self.route {
            RouteSpec::Get { path, query } => {
                let rendered = render_path(path, &mut effective)?;
                let pairs: Vec<(String, String)> = query
                    .iter()
                    .filter_map(|key| {
                        effective.get(*key).map(|value| ((*key).to_string(), query_value(value)))
                    })
                    .collect();
                self.client.get(&rendered, &pairs).await
            }
            RouteSpec::Post { path } => {
                let rendered = render_path(path, &mut effective)?;
                self.client.post(&rendered, &Value::Object(effective)).await
            }
        }
    }
}

/// Substitute `{name}` segments, consuming the matching arguments so they
/// do not also appear in the query string or body.
fn render_path(
    template: &str,
    arguments: &mut serde_json::Map<String, Value>,
) -> Result<String, ToolError> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let close = rest[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| ToolError::Invocation(format!("unclosed path segment in {template}")))?;
        rendered.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        let value = arguments
            .remove(name)
            .ok_or_else(|| ToolError::Invocation(format!("missing required argument `{name}`")))?;
        rendered.push_str(&query_value(&value));
        rest = &rest[close + 1..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::render_path;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn path_segments_are_substituted_and_consumed() {
        let mut arguments = args(json!({"payment_id": "P-1", "limit": 5}));
        let rendered = render_path("/api/payments/{payment_id}", &mut arguments).expect("render");
        assert_eq!(rendered, "/api/payments/P-1");
        assert!(!arguments.contains_key("payment_id"));
        assert_eq!(arguments["limit"], 5);
    }

    #[test]
    fn numeric_segments_render_without_quotes() {
        let mut arguments = args(json!({"transaction_id": 42}));
        let rendered =
            render_path("/api/transactions/{transaction_id}", &mut arguments).expect("render");
        assert_eq!(rendered, "/api/transactions/42");
    }

    #[test]
    fn missing_segment_argument_is_an_invocation_error() {
        let mut arguments = args(json!({}));
        assert!(render_path("/api/payments/{payment_id}", &mut arguments).is_err());
    }

    #[test]
    fn template_without_segments_passes_through() {
        let mut arguments = args(json!({"limit": 10}));
        let rendered = render_path("/api/payments", &mut arguments).expect("render");
        assert_eq!(rendered, "/api/payments");
    }
}
