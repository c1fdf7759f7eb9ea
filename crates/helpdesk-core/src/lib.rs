//! Helpdesk Core Library
//!
//! Conversational-memory and tool-authorization core for the Helpdesk agent
//! backend: token-budgeted thread history, Principal-based authorization,
//! credential refresh, and authenticated MCP tool-client construction.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod mcp;
pub mod service;
pub mod thread;

// Re-export commonly used types
pub use auth::{IdentityProvider, Principal, SessionType, TokenKind, TokenRefreshManager};
pub use config::{MemoryConfig, RefreshConfig, ToolClientCacheConfig};
pub use context::{
    HistoryFormat, MessageFormatConverter, MessageHistoryProvider, SubwordEstimator, TokenCounter,
    Tokenizer,
};
pub use error::{HelpdeskError, HelpdeskResult};
pub use mcp::{AgentToolClientFactory, McpError, McpTool, ToolClient, ToolConnector, ToolTransport};
pub use service::ChatBackend;
pub use thread::{Message, MessageRole, MessageStore, Thread};
