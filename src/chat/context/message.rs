use serde::{Deserialize, Serialize};

/// One turn of a conversation as the chat endpoint receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Anything that isn't `user` is treated as the assistant side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl From<String> for MessageRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => MessageRole::User,
            _ => MessageRole::Assistant,
        }
    }
}
