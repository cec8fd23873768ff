//! Mistral OCR client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::OcrResult;
use crate::Result;

const MISTRAL_OCR_URL: &str = "https://api.mistral.ai/v1/ocr";
const MISTRAL_OCR_MODEL: &str = "mistral-ocr-latest";
const OCR_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, document_url: &str) -> Result<OcrResult>;
}

pub struct MistralOcrClient {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl MistralOcrClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(OCR_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_key: settings.mistral_ocr_api_key.clone(),
            url: MISTRAL_OCR_URL.to_string(),
        })
    }
}

#[async_trait]
impl OcrProvider for MistralOcrClient {
    async fn extract_text(&self, document_url: &str) -> Result<OcrResult> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            OrchestrationError::Config("MISTRAL_OCR_API_KEY not configured".to_string())
        })?;

        let body = json!({
            "model": MISTRAL_OCR_MODEL,
            "document": {
                "type": "document_url",
                "document_url": document_url,
            }
        });

        debug!("Sending document to Mistral OCR");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mistral OCR error response: {} {}", status, body);
            return Err(OrchestrationError::Upstream {
                service: "mistral_ocr",
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await?;
        Ok(parse_ocr_response(raw))
    }
}

/// Prefer a top-level `text`; otherwise stitch the per-page markdown together.
fn parse_ocr_response(raw: Value) -> OcrResult {
    let text = match raw.get("text").and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => raw
            .get("pages")
            .and_then(Value::as_array)
            .map(|pages| {
                pages
                    .iter()
                    .filter_map(|p| p.get("markdown").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })
            .unwrap_or_default(),
    };

    let confidence = raw.get("confidence").and_then(Value::as_f64);

    OcrResult {
        text: text.trim().to_string(),
        confidence,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_level_text() {
        let result = parse_ocr_response(json!({ "text": "Contenido OCR", "confidence": 0.9 }));
        assert_eq!(result.text, "Contenido OCR");
        assert_eq!(result.confidence, Some(0.9));
    }

    #[test]
    fn test_parse_pages_markdown() {
        let result = parse_ocr_response(json!({
            "pages": [
                { "index": 0, "markdown": "Total: 30 Bs." },
                { "index": 1, "markdown": "Categoría: Transporte" }
            ]
        }));
        assert_eq!(result.text, "Total: 30 Bs.\n\nCategoría: Transporte");
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_parse_empty_response() {
        let result = parse_ocr_response(json!({}));
        assert!(result.text.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let client = MistralOcrClient::new(&Settings::default()).unwrap();
        let err = client.extract_text("https://example.com/doc.pdf").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }
}
