//! Persisted conversation message types
//!
//! Messages are owned by the storage layer. This core only reads and
//! reshapes them; nothing here mutates a persisted message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a message within a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// End-user message
    User,
    /// Agent response
    Assistant,
    /// Out-of-band system message
    System,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Record of a tool invocation made while producing an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation id assigned by the agent runtime
    pub id: String,
    /// Name of the invoked tool
    pub name: String,
    /// Arguments passed to the tool
    #[serde(default)]
    pub arguments: Value,
}

impl ToolInvocation {
    /// Create a new tool invocation record
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// File or media attachment on a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment id
    pub id: Uuid,
    /// Original file name
    pub file_name: String,
    /// MIME content type
    pub content_type: String,
    /// Storage URL
    #[serde(default)]
    pub url: Option<String>,
    /// Size in bytes, when known
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// A persisted message within a thread
///
/// Within a thread, messages are totally ordered by `created_at`. Rows
/// missing a timestamp deserialize to "now" rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id
    pub id: Uuid,
    /// Owning thread
    pub thread_id: Uuid,
    /// Message role
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Tool invocations recorded on this message, in call order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    /// Attachments on this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl Message {
    /// Create a new message with a fresh id and the current timestamp
    pub fn new(thread_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            tool_calls: None,
            attachments: None,
        }
    }

    /// Set the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach tool invocation records
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolInvocation>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Attach attachments
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }
}

/// A persisted conversation between a user and an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Thread id
    pub id: Uuid,
    /// Organization owning the thread
    pub organization_id: String,
    /// Agent assigned to the thread
    pub agent_id: String,
    /// Optional human-readable title
    #[serde(default)]
    pub title: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: MessageRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, MessageRole::User);
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let thread_id = Uuid::new_v4();
        let json = format!(
            r#"{{"id":"{}","thread_id":"{}","role":"user","content":"hi"}}"#,
            Uuid::new_v4(),
            thread_id
        );
        let before = Utc::now();
        let message: Message = serde_json::from_str(&json).unwrap();
        assert!(message.created_at >= before);
        assert!(message.created_at <= Utc::now());
    }

    #[test]
    fn test_message_round_trip() {
        let message = Message::new(Uuid::new_v4(), MessageRole::Assistant, "done")
            .with_tool_calls(vec![ToolInvocation::new(
                "call-1",
                "create_ticket",
                serde_json::json!({"subject": "printer on fire"}),
            )]);

        let json = serde_json::to_string(&message).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
