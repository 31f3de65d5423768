// OpenAI Protocol Types
//
// Request body for a streamed chat completion. Only what a latency probe
// sends: the model, an optional system message, the user message and the
// stream flag.

use firstbyte_core::ProbeRequest;
use serde::{Deserialize, Serialize};

/// Chat message following OpenAI's format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Message role in conversation (OpenAI format)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

/// OpenAI chat completion request format
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// Build the streamed request body for a probe
    pub fn streaming(request: &ProbeRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = request.system_prompt() {
            messages.push(ChatMessage {
                role: MessageRole::System,
                content: system_prompt.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: MessageRole::User,
            content: request.user_prompt().to_string(),
        });

        Self {
            model: request.model().to_string(),
            messages,
            stream: true,
        }
    }
}
