//! Tool-transport error types

use thiserror::Error;

/// Errors at the tool-client boundary
#[derive(Debug, Error, Clone)]
pub enum McpError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server error with an HTTP or JSON-RPC code
    #[error("Server error {code}: {message}")]
    Server { code: i32, message: String },

    /// Tool not present in the server catalog
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    /// Tool outside the client's authorized scope
    #[error("Tool not in client scope: {name}")]
    ToolNotAllowed { name: String },

    /// Request timeout
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Client has no transport attached
    #[error("Client not connected")]
    NotConnected,

    /// Other error
    #[error("MCP error: {0}")]
    Other(String),
}

impl McpError {
    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new server error
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Create a new tool-not-found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a new scope-rejection error
    pub fn tool_not_allowed(name: impl Into<String>) -> Self {
        Self::ToolNotAllowed { name: name.into() }
    }

    /// Create a new timeout error
    pub const fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    /// Create a new generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// The HTTP status carried by a server error, when it is one.
    /// Used by reactive token refresh to spot 401/403 responses.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Server { code, .. } => u16::try_from(*code).ok(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection(err.to_string())
    }
}
