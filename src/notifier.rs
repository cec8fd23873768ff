//! Notification service client
//!
//! Fires a `createNotification` mutation at the notification service. Bodies
//! are signed with the shared service secret so the receiver can tell our
//! calls apart from browser traffic.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::OrchestrationError;
use crate::models::Notification;
use crate::Result;

const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(10);
const SIGNATURE_HEADER: &str = "X-Service-Signature";

const CREATE_NOTIFICATION_MUTATION: &str = r#"
mutation CreateNotification($input: CreateNotificationInput!) {
  createNotification(input: $input) {
    id
    title
    message
    type
    read
  }
}"#;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification, returning the created notification id if any.
    async fn send_notification(&self, notification: &Notification) -> Result<Option<String>>;
}

pub struct NotificationClient {
    client: Client,
    url: String,
    secret: String,
}

impl NotificationClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(NOTIFICATION_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: settings.notification_service_url.clone(),
            secret: settings.service_jwt_secret.clone(),
        })
    }
}

#[async_trait]
impl Notifier for NotificationClient {
    async fn send_notification(&self, notification: &Notification) -> Result<Option<String>> {
        let payload = json!({
            "query": CREATE_NOTIFICATION_MUTATION,
            "variables": { "input": notification },
        });
        let body = serde_json::to_vec(&payload)?;
        let signature = sign(self.secret.as_bytes(), &body)?;

        debug!(user_id = %notification.user_id, title = %notification.title, "Sending notification");

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, format!("sha256={}", signature))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Notification service returned {}: {}", status, body);
            return Err(OrchestrationError::Upstream {
                service: "notification",
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        if let Some(errors) = envelope.get("errors").filter(|e| !e.is_null()) {
            warn!("Notification service GraphQL errors: {}", errors);
            return Err(OrchestrationError::Graphql(errors.to_string()));
        }

        Ok(envelope
            .pointer("/data/createNotification/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

/// HMAC-SHA256 (RFC 2104) of `message` under `key`, hex encoded.
pub fn sign(key: &[u8], message: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| OrchestrationError::Config(format!("Invalid signing key: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
