//! Chat-completion wire types
//!
//! Structs that mirror the OpenAI-style chat-completion JSON format shared by
//! Azure OpenAI and RAGFlow's OpenAI-compatible chat endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Prompt written by the orchestrator on the user's behalf
    User,
    /// Text returned by the model
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Build a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Generation parameters sent alongside the messages
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens in the response
    pub max_tokens: u32,
}

/// Request body for a chat-completion call
#[derive(Serialize, Debug)]
pub struct ChatCompletionRequest<'a> {
    /// Model name (RAGFlow only; Azure selects the model by deployment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    /// Full conversation, oldest first
    pub messages: &'a [ChatMessage],
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum number of tokens in the response
    pub max_tokens: u32,
    /// Streaming flag (RAGFlow only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Top-level chat-completion response
#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    /// Candidate completions; only the first is consumed
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A single completion choice
#[derive(Deserialize, Debug)]
pub struct Choice {
    /// Message produced by the model
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    /// Why the model stopped generating (if applicable)
    #[serde(default)]
    #[allow(dead_code)] // Part of API response format, logged only
    pub finish_reason: Option<String>,
}

/// Message inside a completion choice
#[derive(Deserialize, Debug)]
pub struct ResponseMessage {
    /// Role reported by the endpoint
    #[serde(default)]
    #[allow(dead_code)] // Part of API response format, may be used in future
    pub role: Option<String>,
    /// Generated text
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of `choices[0].message.content`, if present and non-empty
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .filter(|content| !content.trim().is_empty())
    }
}
