//! Conversation history carried from stage to stage

use crate::orchestrator::completion_types::ChatMessage;
use serde::Serialize;

/// Append-only list of prompt/response pairs owned by one run
///
/// Each completed stage adds exactly two entries: the prompt that was sent and
/// the raw text the model returned. Nothing is ever pruned or rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages to send for the next stage: every prior entry plus `prompt`
    pub fn request_messages(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Record a completed exchange
    ///
    /// `response` is the raw model text, not the parsed result, since that is
    /// what the model must see again as its own previous answer.
    pub fn record_exchange(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.messages.push(ChatMessage::user(prompt));
        self.messages.push(ChatMessage::assistant(response));
    }

    /// All entries, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
