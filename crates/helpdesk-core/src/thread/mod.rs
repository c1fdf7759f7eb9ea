//! Thread and message data model plus the storage boundary

pub mod message;
pub mod storage;

pub use message::{Attachment, Message, MessageRole, Thread, ToolInvocation};
pub use storage::{InMemoryMessageStore, MessageStore, SortOrder};
