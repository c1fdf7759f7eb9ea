//! Scoped tool-calling client
//!
//! A [`ToolClient`] wraps a transport and the exact tool set it was built
//! for. Calls outside that set are rejected here regardless of what the
//! server exposes or what the caller's Principal would allow. This is a
//! defense-in-depth boundary independent of the authorization tables.

use super::error::McpError;
use super::transport::ToolTransport;
use super::types::{McpTool, McpToolResult};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Tool-calling handle scoped to an agent and an exact tool set
pub struct ToolClient {
    agent_id: String,
    allowed_tools: BTreeSet<String>,
    transport: Option<Arc<dyn ToolTransport>>,
    authenticated: bool,
}

impl ToolClient {
    /// Create an authenticated client over a transport
    pub fn authenticated(
        agent_id: impl Into<String>,
        allowed_tools: BTreeSet<String>,
        transport: Arc<dyn ToolTransport>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            allowed_tools,
            transport: Some(transport),
            authenticated: true,
        }
    }

    /// Create an unauthenticated fallback client over a transport
    pub fn unauthenticated(
        agent_id: impl Into<String>,
        allowed_tools: BTreeSet<String>,
        transport: Arc<dyn ToolTransport>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            allowed_tools,
            transport: Some(transport),
            authenticated: false,
        }
    }

    /// Create a client with no tools and no transport connection
    pub fn without_tools(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            allowed_tools: BTreeSet::new(),
            transport: None,
            authenticated: false,
        }
    }

    /// Agent this client was built for
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Whether the client carries an authenticated credential
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The exact tool names this client may call
    pub fn tool_names(&self) -> &BTreeSet<String> {
        &self.allowed_tools
    }

    /// Whether a tool is inside this client's scope
    pub fn has_tool(&self, name: &str) -> bool {
        self.allowed_tools.contains(name)
    }

    /// List the server catalog restricted to this client's scope
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let transport = self.transport.as_ref().ok_or(McpError::NotConnected)?;
        let catalog = transport.list_tools().await?;
        Ok(catalog
            .into_iter()
            .filter(|t| self.allowed_tools.contains(&t.name))
            .collect())
    }

    /// Invoke a tool, rejecting anything outside the client's scope
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        if !self.allowed_tools.contains(name) {
            warn!(
                agent_id = %self.agent_id,
                tool = name,
                "rejected call outside client tool scope"
            );
            return Err(McpError::tool_not_allowed(name));
        }

        let transport = self.transport.as_ref().ok_or(McpError::NotConnected)?;
        transport.call_tool(name, arguments).await
    }
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("agent_id", &self.agent_id)
            .field("tools", &self.allowed_tools.len())
            .field("authenticated", &self.authenticated)
            .field("connected", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTransport;

    #[async_trait]
    impl ToolTransport for EchoTransport {
        async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
            Ok(vec![
                McpTool::new("create_ticket"),
                McpTool::new("delete_ticket"),
                McpTool::new("search_tickets"),
            ])
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: Value,
        ) -> Result<McpToolResult, McpError> {
            Ok(McpToolResult {
                content: vec![super::super::types::McpContent::Text {
                    text: format!("called {}", name),
                }],
                is_error: false,
            })
        }
    }

    fn scoped_client() -> ToolClient {
        ToolClient::authenticated(
            "agent-1",
            BTreeSet::from(["create_ticket".to_string()]),
            Arc::new(EchoTransport),
        )
    }

    #[tokio::test]
    async fn test_in_scope_call_passes_through() {
        let client = scoped_client();
        let result = client.call_tool("create_ticket", json!({})).await.unwrap();
        assert_eq!(result.text(), "called create_ticket");
    }

    #[tokio::test]
    async fn test_out_of_scope_call_rejected() {
        let client = scoped_client();
        let result = client.call_tool("delete_ticket", json!({})).await;
        assert!(matches!(result, Err(McpError::ToolNotAllowed { .. })));
    }

    #[tokio::test]
    async fn test_list_tools_filtered_to_scope() {
        let client = scoped_client();
        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "create_ticket");
    }

    #[tokio::test]
    async fn test_no_tool_client_has_no_connection() {
        let client = ToolClient::without_tools("agent-1");
        assert!(!client.is_authenticated());
        assert!(client.tool_names().is_empty());
        let result = client.call_tool("create_ticket", json!({})).await;
        assert!(matches!(result, Err(McpError::ToolNotAllowed { .. })));
        let result = client.list_tools().await;
        assert!(matches!(result, Err(McpError::NotConnected)));
    }
}
