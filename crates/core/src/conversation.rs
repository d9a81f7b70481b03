//! The chat history of a tutoring session.

use edura_model::{ChatMessage, ChatRole};

/// The messages exchanged with the model, system prompt first.
///
/// The conversation holds at most one assistant message per turn: while an
/// answer streams in, its message is rewritten in place.
#[derive(Clone, Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    answer_open: bool,
}

impl Conversation {
    /// Creates a conversation that starts with the given system prompt.
    #[inline]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            answer_open: false,
        }
    }

    /// Returns the messages in order.
    #[inline]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends a learner message and opens a new turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.answer_open = false;
        self.messages.push(ChatMessage::user(content));
    }

    /// Replaces the answer of the current turn, or appends it if the turn
    /// has none yet.
    pub fn upsert_assistant(&mut self, content: &str) {
        match self.messages.last_mut() {
            Some(last) if self.answer_open && last.role == ChatRole::Assistant => {
                content.clone_into(&mut last.content);
            }
            _ => {
                self.messages.push(ChatMessage::assistant(content));
                self.answer_open = true;
            }
        }
    }

    /// Appends grounding content after the answer.
    pub fn push_tool(&mut self, content: impl Into<String>) {
        self.answer_open = false;
        self.messages.push(ChatMessage::tool(content));
    }

    /// Closes the current turn.
    #[inline]
    pub fn end_turn(&mut self) {
        self.answer_open = false;
    }

    /// Drops the history and starts over with a fresh system prompt.
    pub fn clear(&mut self, system_prompt: impl Into<String>) {
        *self = Self::new(system_prompt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_answer_per_turn() {
        let mut conversation = Conversation::new("Be kind.");
        conversation.push_user("What is a noun?");
        conversation.upsert_assistant("A noun");
        conversation.upsert_assistant("A noun names a thing.");
        conversation.push_tool("citations");
        conversation.push_user("And a verb?");
        conversation.upsert_assistant("An action.");
        conversation.end_turn();
        conversation.upsert_assistant("A new turn.");

        let roles: Vec<_> =
            conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Tool,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::Assistant,
            ]
        );
        assert_eq!(conversation.messages()[2].content, "A noun names a thing.");
    }

    #[test]
    fn test_clear() {
        let mut conversation = Conversation::new("Old prompt.");
        conversation.push_user("Hi");
        conversation.clear("New prompt.");
        assert_eq!(
            conversation.messages(),
            &[ChatMessage::system("New prompt.")]
        );
    }
}
