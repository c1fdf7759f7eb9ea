//! Message format conversion for history consumers
//!
//! Persisted messages are reshaped into the three forms consumers need:
//! full-metadata records for operator UIs, bare role/content pairs for chat
//! completion calls, and model-native request/response envelopes the agent
//! runtime can replay directly.

use crate::thread::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Placeholder recorded on reconstructed responses; the producing model is
/// not stored on historical messages.
const MODEL_NAME_PLACEHOLDER: &str = "unknown";

/// Target shape for converted history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFormat {
    /// Full metadata: role, content, timestamp, tool calls, attachments
    Detailed,
    /// Bare `{role, content}` pairs
    Simple,
    /// Structured request/response envelopes for the agent runtime
    ModelNative,
}

/// Token accounting attached to a reconstructed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed
    pub input_tokens: u64,
    /// Output tokens produced
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Usage marker for historical messages whose accounting was not stored.
    /// Token usage is never retroactively reconstructed.
    pub fn unknown() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// Part of a model request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPart {
    /// User prompt text with its original timestamp
    UserPrompt {
        content: String,
        timestamp: DateTime<Utc>,
    },
}

/// Part of a model response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePart {
    /// Response text
    Text { content: String },
}

/// Request envelope consumable by the agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Request parts, in order
    pub parts: Vec<RequestPart>,
}

/// Response envelope consumable by the agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Response parts, in order
    pub parts: Vec<ResponsePart>,
    /// Token accounting (always the unknown marker for replayed history)
    pub usage: TokenUsage,
    /// Producing model name
    pub model_name: String,
    /// Original message timestamp
    pub timestamp: DateTime<Utc>,
}

/// A model-native history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelMessage {
    /// User turn
    Request(ModelRequest),
    /// Assistant turn
    Response(ModelResponse),
}

/// Message format converter
pub struct MessageFormatConverter;

impl MessageFormatConverter {
    /// Convert messages into the requested transport-neutral shape
    pub fn convert(messages: &[Message], format: HistoryFormat) -> Vec<Value> {
        match format {
            HistoryFormat::Detailed => messages.iter().map(Self::to_detailed).collect(),
            HistoryFormat::Simple => messages.iter().map(Self::to_simple).collect(),
            HistoryFormat::ModelNative => Self::to_model_native(messages)
                .iter()
                .map(|m| serde_json::to_value(m).unwrap_or(Value::Null))
                .collect(),
        }
    }

    /// Convert messages into typed model-native envelopes
    ///
    /// Only user and assistant turns have a model-native shape; messages
    /// with any other role are dropped. This mirrors the upstream behavior
    /// and is a documented limitation, not an error path.
    pub fn to_model_native(messages: &[Message]) -> Vec<ModelMessage> {
        let mut converted = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                MessageRole::User => {
                    converted.push(ModelMessage::Request(ModelRequest {
                        parts: vec![RequestPart::UserPrompt {
                            content: message.content.clone(),
                            timestamp: message.created_at,
                        }],
                    }));
                }
                MessageRole::Assistant => {
                    converted.push(ModelMessage::Response(ModelResponse {
                        parts: vec![ResponsePart::Text {
                            content: message.content.clone(),
                        }],
                        usage: TokenUsage::unknown(),
                        model_name: MODEL_NAME_PLACEHOLDER.to_string(),
                        timestamp: message.created_at,
                    }));
                }
                other => {
                    debug!(role = %other, "dropping message without a model-native shape");
                }
            }
        }

        converted
    }

    fn to_detailed(message: &Message) -> Value {
        json!({
            "role": message.role.to_string(),
            "content": message.content,
            "created_at": message.created_at,
            "tool_calls": serde_json::to_value(&message.tool_calls).unwrap_or(Value::Null),
            "attachments": serde_json::to_value(&message.attachments).unwrap_or(Value::Null),
        })
    }

    fn to_simple(message: &Message) -> Value {
        json!({
            "role": message.role.to_string(),
            "content": message.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ToolInvocation;
    use uuid::Uuid;

    fn message(role: MessageRole, content: &str) -> Message {
        Message::new(Uuid::new_v4(), role, content)
    }

    #[test]
    fn test_simple_is_role_and_content_only() {
        let messages = vec![message(MessageRole::User, "hello")];
        let converted = MessageFormatConverter::convert(&messages, HistoryFormat::Simple);

        assert_eq!(converted.len(), 1);
        let obj = converted[0].as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["role"], "user");
        assert_eq!(obj["content"], "hello");
    }

    #[test]
    fn test_detailed_preserves_tool_calls() {
        let messages = vec![
            message(MessageRole::Assistant, "created the ticket").with_tool_calls(vec![
                ToolInvocation::new("call-1", "create_ticket", json!({"subject": "vpn down"})),
            ]),
        ];
        let converted = MessageFormatConverter::convert(&messages, HistoryFormat::Detailed);

        let obj = converted[0].as_object().unwrap();
        assert_eq!(obj["tool_calls"][0]["name"], "create_ticket");
        assert!(obj.contains_key("created_at"));
    }

    #[test]
    fn test_model_native_shapes() {
        let messages = vec![
            message(MessageRole::User, "my printer is on fire"),
            message(MessageRole::Assistant, "filing a ticket now"),
        ];
        let native = MessageFormatConverter::to_model_native(&messages);

        assert_eq!(native.len(), 2);
        match &native[0] {
            ModelMessage::Request(req) => {
                let RequestPart::UserPrompt { content, timestamp } = &req.parts[0];
                assert_eq!(content, "my printer is on fire");
                assert_eq!(*timestamp, messages[0].created_at);
            }
            other => panic!("expected request envelope, got {:?}", other),
        }
        match &native[1] {
            ModelMessage::Response(resp) => {
                assert_eq!(resp.usage, TokenUsage::unknown());
                assert_eq!(resp.model_name, MODEL_NAME_PLACEHOLDER);
            }
            other => panic!("expected response envelope, got {:?}", other),
        }
    }

    /// Documented limitation: system and tool turns have no model-native
    /// shape and are dropped, not preserved and not an error.
    #[test]
    fn test_model_native_drops_other_roles() {
        let messages = vec![
            message(MessageRole::System, "be terse"),
            message(MessageRole::User, "hi"),
            message(MessageRole::Tool, "{\"ok\":true}"),
        ];
        let native = MessageFormatConverter::to_model_native(&messages);

        assert_eq!(native.len(), 1);
        assert!(matches!(native[0], ModelMessage::Request(_)));
    }

    #[test]
    fn test_model_native_round_trip() {
        let messages = vec![
            message(MessageRole::User, "hello"),
            message(MessageRole::Assistant, "hi there"),
        ];
        let native = MessageFormatConverter::to_model_native(&messages);

        let encoded = serde_json::to_string(&native).unwrap();
        let decoded: Vec<ModelMessage> = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, native);
    }
}
