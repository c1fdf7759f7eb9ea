//! Error types for the Helpdesk core

use thiserror::Error;

/// Result type alias for Helpdesk core operations
pub type HelpdeskResult<T> = Result<T, HelpdeskError>;

/// Main error type for the Helpdesk core
#[derive(Error, Debug, Clone)]
pub enum HelpdeskError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Authentication and identity-provider errors
    #[error("Auth error: {0}")]
    Auth(String),

    /// Authorization denial. Surfaced explicitly so callers can distinguish
    /// "access denied" from degraded best-effort fallbacks.
    #[error("Access denied: {user_id} may not use tool {tool_name}")]
    AccessDenied { user_id: String, tool_name: String },

    /// Tool client errors
    #[error("Tool client error: {0}")]
    ToolClient(String),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Operation timeout
    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl HelpdeskError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a new access-denied error
    pub fn access_denied(user_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::AccessDenied {
            user_id: user_id.into(),
            tool_name: tool_name.into(),
        }
    }

    /// Create a new tool client error
    pub fn tool_client(message: impl Into<String>) -> Self {
        Self::ToolClient(message.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a new timeout error
    pub const fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }
}

impl From<anyhow::Error> for HelpdeskError {
    fn from(error: anyhow::Error) -> Self {
        Self::Other(error.to_string())
    }
}

impl From<std::io::Error> for HelpdeskError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<reqwest::Error> for HelpdeskError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

impl From<crate::mcp::McpError> for HelpdeskError {
    fn from(error: crate::mcp::McpError) -> Self {
        Self::ToolClient(error.to_string())
    }
}
