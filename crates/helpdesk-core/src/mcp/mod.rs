//! Tool-calling layer: transport boundary, scoped clients, client factory

pub mod client;
pub mod error;
pub mod factory;
pub mod transport;
pub mod types;

pub use client::ToolClient;
pub use error::McpError;
pub use factory::{AgentToolClientFactory, CacheStats};
pub use transport::{HttpToolConnector, HttpTransport, ToolConnector, ToolTransport, TransportConfig};
pub use types::{McpContent, McpTool, McpToolResult};
