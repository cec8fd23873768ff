//! Conversational interaction handler
//!
//! Normalises an incoming chat request into a role-tagged conversation and
//! answers it with the language model, dropping to the rule-based agent when
//! the model is unavailable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::OrchestrationError;
use crate::fallback::FallbackAgent;
use crate::gemini::LanguageModel;
use crate::models::{ChatMessage, ChatRole};
use crate::Result;

/// One inbound message before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Either a full conversation or a single prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Vec<IncomingMessage>>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub messages: Vec<ChatMessage>,
    pub raw: Value,
}

impl ChatRequest {
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: None,
            prompt: Some(prompt.into()),
        }
    }

    /// Validated conversation. A non-empty `messages` list wins over `prompt`.
    pub fn into_messages(self) -> Result<Vec<ChatMessage>> {
        if let Some(messages) = self.messages.filter(|m| !m.is_empty()) {
            return messages.into_iter().map(normalize).collect();
        }

        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => Ok(vec![ChatMessage::user(prompt)]),
            _ => Err(OrchestrationError::Validation(
                "Either 'messages' or 'prompt' must be provided".to_string(),
            )),
        }
    }
}

fn normalize(message: IncomingMessage) -> Result<ChatMessage> {
    let role = ChatRole::parse(&message.role).ok_or_else(|| {
        OrchestrationError::Validation(format!(
            "Unsupported role '{}'; expected user, model or system",
            message.role.trim()
        ))
    })?;

    let content = message.content.trim();
    if content.is_empty() {
        return Err(OrchestrationError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }

    Ok(ChatMessage {
        role,
        content: content.to_string(),
    })
}

/// Ask `model`, answering from `fallback` if it fails.
pub async fn respond(
    model: &dyn LanguageModel,
    fallback: &FallbackAgent,
    messages: &[ChatMessage],
) -> ChatReply {
    let response = match model.chat(messages).await {
        Ok(response) => {
            info!(messages = messages.len(), "Conversational response from Gemini API");
            response
        }
        Err(e) => {
            warn!("Gemini unavailable, answering with fallback agent: {}", e);
            fallback.answer(messages)
        }
    };

    ChatReply {
        messages: response.messages(),
        raw: response.raw,
    }
}
