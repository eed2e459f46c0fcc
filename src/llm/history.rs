use crate::llm::types::{ChatMessage, Role};

/// Tells the model to treat earlier turns as background only.
pub const CONTEXT_ONLY_INSTRUCTION: &str = "Ignore previous questions. Use them only as context for understanding your environment, but DON'T answer them again. Answer ONLY the next question:";

/// Append-only record of one session's turns, owned by the session and lent
/// to the dispatcher for the length of a turn. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn append_tool_result(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::tool(content));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The list sent on a turn's first stream: the system context first, then
    /// history with the context-only instruction placed just before the
    /// current (last) message. History itself is left untouched.
    pub fn build_outbound(&self, system_context: &str) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 2);
        out.push(ChatMessage::system(system_context));
        if let Some((current, earlier)) = self.messages.split_last() {
            out.extend(earlier.iter().cloned());
            if current.role == Role::User {
                out.push(ChatMessage::system(CONTEXT_ONLY_INSTRUCTION));
            }
            out.push(current.clone());
        }
        out
    }
}
