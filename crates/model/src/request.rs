use serde::{Deserialize, Serialize};

/// The author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The system instructions.
    System,
    /// The learner.
    User,
    /// The model.
    Assistant,
    /// Grounding content returned alongside an answer.
    Tool,
}

/// A single message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: ChatRole,
    /// Text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with the given role.
    #[inline]
    pub fn new<S: Into<String>>(role: ChatRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Creates a tool message.
    #[inline]
    pub fn tool<S: Into<String>>(content: S) -> Self {
        Self::new(ChatRole::Tool, content)
    }
}

/// A request to be sent to the chat provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChatRequest {
    /// The whole conversation, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Whether the provider should ground the answer on its search index,
    /// if it has one.
    pub use_search: bool,
}
