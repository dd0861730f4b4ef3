//! Ordered message log for one agent session.

use crate::types::{ChatMessage, MessageRole, ToolRequest};

/// Chronological message history. Holds at most one system message, always
/// at index 0. Messages are only removed by [`Conversation::reset`] or when
/// the system prompt is replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.set_system_prompt(prompt);
        conversation
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.messages
            .push(ChatMessage::new(MessageRole::User, content));
    }

    pub fn append_assistant(&mut self, content: impl Into<String>, requests: Vec<ToolRequest>) {
        self.messages.push(ChatMessage::assistant(content, requests));
    }

    pub fn append_tool_result(&mut self, request_id: impl Into<String>, content: impl Into<String>) {
        self.messages.push(ChatMessage::tool(request_id, content));
    }

    /// Replace any existing system message with `prompt` at the front.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.messages.retain(|m| m.role != MessageRole::System);
        self.messages
            .insert(0, ChatMessage::new(MessageRole::System, prompt.clone()));
        self.system_prompt = Some(prompt);
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Drop all history and re-seed the last system prompt, if any.
    pub fn reset(&mut self) {
        self.messages.clear();
        if let Some(prompt) = self.system_prompt.clone() {
            self.messages
                .push(ChatMessage::new(MessageRole::System, prompt));
        }
    }

    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
