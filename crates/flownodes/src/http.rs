use crate::template::interpolate;
use async_trait::async_trait;
use flowcore::{Executor, ExecutorContext, NodeError, Value};
use flowruntime::{ExecutorFactory, ExecutorMetadata};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

/// Outbound HTTP call node
pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_method(ctx: &ExecutorContext) -> Result<Method, NodeError> {
    let method = ctx.config_str("method")?.unwrap_or("GET").to_uppercase();
    Method::from_bytes(method.as_bytes())
        .map_err(|_| NodeError::Config(format!("Unsupported method: {}", method)))
}

fn has_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::DELETE
}

fn build_headers(ctx: &ExecutorContext, with_body: bool) -> Result<HeaderMap, NodeError> {
    let mut headers = HeaderMap::new();
    if with_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let configured = match ctx.config.get("headers") {
        None | Some(Value::Null) => return Ok(headers),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(NodeError::Config("headers must be an object".to_string())),
    };

    for (key, value) in configured {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| NodeError::Config(format!("Invalid header name {}: {}", key, e)))?;
        let value = HeaderValue::from_str(&value.to_string())
            .map_err(|e| NodeError::Config(format!("Invalid value for header {}: {}", key, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[async_trait]
impl Executor for HttpRequestExecutor {
    fn executor_type(&self) -> &str {
        "httpRequest"
    }

    async fn execute(&self, ctx: ExecutorContext) -> Result<Value, NodeError> {
        let url = ctx
            .require_config("url")?
            .as_str()
            .ok_or_else(|| NodeError::Config("url must be a string".to_string()))?;
        let url = interpolate(url, |key| ctx.inputs.get(key).map(|v| v.to_string()));

        let method = parse_method(&ctx)?;
        let with_body = has_body(&method);
        let headers = build_headers(&ctx, with_body)?;

        tracing::debug!(node_id = ctx.node_id, "{} {}", method, url);

        let mut request = self.client.request(method, &url).headers(headers);
        // Without `json_data` the request goes out with an empty body
        if let Some(body) = ctx.config.get("json_data").filter(|_| with_body) {
            let payload = serde_json::to_vec(body)
                .map_err(|e| NodeError::Execution(format!("Failed to encode body: {}", e)))?;
            request = request.body(payload);
        }

        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| NodeError::Execution(format!("HTTP request failed: {}", e)))?;
            let status = response.status().as_u16();
            let text = response
                .text()
                .await
                .map_err(|e| NodeError::Execution(format!("Failed to read response: {}", e)))?;
            Ok::<_, NodeError>((status, text))
        };

        let (status, text) = tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            result = call => result?,
        };

        tracing::debug!(node_id = ctx.node_id, "Response status: {}", status);

        let data = match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(_) => Value::object([("text", text)]),
        };

        Ok(Value::object([
            ("status_code", Value::from(status)),
            ("data", data),
        ]))
    }
}

pub struct HttpRequestExecutorFactory;

impl ExecutorFactory for HttpRequestExecutorFactory {
    fn create(&self) -> Arc<dyn Executor> {
        Arc::new(HttpRequestExecutor::new())
    }

    fn executor_type(&self) -> &str {
        "httpRequest"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Executes HTTP requests".to_string(),
            category: "API".to_string(),
            config_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": {"type": "string"},
                    "method": {
                        "type": "string",
                        "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"],
                        "default": "GET"
                    },
                    "headers": {"type": "object"},
                    "json_data": {}
                }
            }),
            input_schema: json!({"type": "object"}),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "status_code": {"type": "integer"},
                    "data": {}
                }
            }),
        }
    }
}
