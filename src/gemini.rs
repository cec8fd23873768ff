//! Gemini API client
//!
//! One `generateContent` call per chat. Uses a long-lived reqwest::Client
//! for connection pooling.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::{ChatMessage, ChatRole, ModelResponse};
use crate::Result;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can answer a conversation in the Gemini response shape.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ModelResponse>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(GEMINI_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: settings.gemini_api_key.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: settings.gemini_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ModelResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            OrchestrationError::Config("GEMINI_API_KEY not configured".to_string())
        })?;

        let url = format!("{}?key={}", self.endpoint(), api_key);
        let request = build_request(messages);

        debug!(model = %self.model, messages = messages.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                OrchestrationError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {} {}", status, body);
            return Err(OrchestrationError::Upstream {
                service: "gemini",
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await?;
        info!("Gemini response received");

        Ok(ModelResponse::new(raw))
    }
}

/// Map chat messages onto Gemini `contents`; system turns become the system instruction.
fn build_request(messages: &[ChatMessage]) -> GeminiRequest {
    let mut contents = Vec::with_capacity(messages.len());
    let mut system_parts = Vec::new();

    for message in messages {
        let part = Part {
            text: message.content.clone(),
        };
        match message.role {
            ChatRole::System => system_parts.push(part),
            ChatRole::User | ChatRole::Model => contents.push(Content {
                role: message.role.as_str().to_string(),
                parts: vec![part],
            }),
        }
    }

    GeminiRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: system_parts,
            })
        },
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = build_request(&[
            ChatMessage {
                role: ChatRole::System,
                content: "Eres un asesor financiero".to_string(),
            },
            ChatMessage::user("¿Qué es un presupuesto?"),
            ChatMessage::model("Un plan de gastos."),
        ]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"].as_array().unwrap().len(), 2);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "Eres un asesor financiero"
        );
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_request_without_system_turns() {
        let json = serde_json::to_value(build_request(&[ChatMessage::user("Hola")])).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_any_request() {
        let client = GeminiClient::new(&Settings::default()).unwrap();
        let err = client.chat(&[ChatMessage::user("Hola")]).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }
}
