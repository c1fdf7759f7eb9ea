//! HTTP transport for tool servers
//!
//! Implements the request/response half of MCP streamable HTTP: every call
//! is a JSON-RPC POST to a single endpoint, with credentials carried in the
//! connection's default headers.

use super::error::McpError;
use super::types::{McpTool, McpToolResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the tool server
    pub base_url: String,
    /// Headers added to every request
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl TransportConfig {
    /// Create a new transport config
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HashMap::new(),
            timeout_secs: 60,
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a bearer credential
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// A connection to a tool server
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// List the server's tool catalog
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError>;

    /// Invoke a named tool
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError>;
}

/// Builds transports; injectable so tests can supply fakes
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Open a transport with the given per-connection headers
    async fn connect(
        &self,
        headers: HashMap<String, String>,
    ) -> Result<Arc<dyn ToolTransport>, McpError>;
}

/// Streamable-HTTP transport over reqwest
pub struct HttpTransport {
    client: Client,
    base_url: String,
    request_id: AtomicU64,
}

impl HttpTransport {
    /// Create a transport from config. Headers become reqwest default
    /// headers, so every request carries the credential.
    pub fn new(config: TransportConfig) -> Result<Self, McpError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        header_map.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key),
                reqwest::header::HeaderValue::try_from(value),
            ) {
                header_map.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .default_headers(header_map)
            .build()
            .map_err(|e| McpError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_id: AtomicU64::new(1),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "sending tool server request");

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| McpError::connection(format!("Failed to send request: {}", e)))?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => {}
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(McpError::server(
                    status.as_u16() as i32,
                    format!("HTTP error {}: {}", status, body),
                ));
            }
        }

        let envelope: Value = response.json().await?;
        if let Some(error) = envelope.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1) as i32;
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown server error");
            return Err(McpError::server(code, message));
        }

        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let tools = result.get("tools").cloned().unwrap_or(Value::Array(vec![]));
        serde_json::from_value(tools).map_err(McpError::from)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        let result = self
            .rpc(
                "tools/call",
                json!({"name": name, "arguments": arguments}),
            )
            .await?;
        serde_json::from_value(result).map_err(McpError::from)
    }
}

/// Connector producing [`HttpTransport`]s for one tool server endpoint
pub struct HttpToolConnector {
    base_url: String,
    timeout_secs: u64,
}

impl HttpToolConnector {
    /// Create a connector for a tool server endpoint
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 60,
        }
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[async_trait]
impl ToolConnector for HttpToolConnector {
    async fn connect(
        &self,
        headers: HashMap<String, String>,
    ) -> Result<Arc<dyn ToolTransport>, McpError> {
        let config = headers.into_iter().fold(
            TransportConfig::new(&self.base_url).with_timeout(self.timeout_secs),
            |cfg, (k, v)| cfg.with_header(k, v),
        );
        Ok(Arc::new(HttpTransport::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = TransportConfig::new("http://localhost:9000/")
            .with_bearer("token-1")
            .with_timeout(30);

        assert_eq!(config.base_url, "http://localhost:9000/");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.headers.get("Authorization").map(String::as_str),
            Some("Bearer token-1")
        );
    }

    #[test]
    fn test_transport_strips_trailing_slash() {
        let transport = HttpTransport::new(TransportConfig::new("http://localhost:8080/")).unwrap();
        assert_eq!(transport.base_url, "http://localhost:8080");
    }
}
