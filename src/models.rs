//! Core data models for the agents service
//!
//! Gateway records use camelCase keys and are deserialized leniently:
//! the gateway schema is owned by another service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Accept numbers, numeric strings or null (GraphQL decimals often arrive as strings).
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
    System,
}

impl ChatRole {
    /// Parse a role after trimming and lower-casing it.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "user" => Some(Self::User),
            "model" => Some(Self::Model),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Expense,
    Income,
}

impl TransactionType {
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

//
// ================= Gateway Records =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Budget {
    pub id: Option<String>,
    pub category: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub limit_amount: f64,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub account_id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub description: String,
}

/// The gateway's echo of a created transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegisteredTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub balance: f64,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Goal {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub target_amount: f64,
    #[serde(deserialize_with = "lenient_amount")]
    pub current_amount: f64,
    pub target_date: Option<String>,
}

impl Goal {
    /// Completion percentage; a zero target counts as no progress.
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount == 0.0 {
            0.0
        } else {
            self.current_amount / self.target_amount * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Classification {
    pub predicted_category: String,
    #[serde(deserialize_with = "lenient_amount")]
    pub confidence: f64,
    pub model_version: Option<String>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            predicted_category: "Otros".to_string(),
            confidence: 0.0,
            model_version: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SpendingPattern {
    pub pattern_type: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Value>,
    #[serde(deserialize_with = "lenient_amount")]
    pub average_amount: f64,
    pub category: Option<String>,
}

impl SpendingPattern {
    pub fn is_anomaly(&self) -> bool {
        self.pattern_type.as_deref() == Some("anomaly")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastPoint {
    pub forecast_month: Option<u32>,
    pub forecast_year: Option<i32>,
    #[serde(deserialize_with = "lenient_amount")]
    pub predicted_amount: f64,
    pub trend: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Prediction {
    pub id: Option<String>,
    pub input_text: Option<String>,
    pub predicted_category: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub confidence: f64,
}

//
// ================= Notifications =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
}

/// Inline outcome of a notification attempt. Send failures never abort a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NotificationReceipt {
    Ok { notification_id: Option<String> },
    Error { message: String },
}

//
// ================= Model I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Raw language model reply in the `candidates[].content.parts[].text` shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    pub raw: Value,
}

impl ModelResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Wrap plain text in a single-candidate envelope.
    pub fn from_text(text: &str) -> Self {
        Self::new(serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        }))
    }

    fn candidates(&self) -> &[Value] {
        self.raw
            .get("candidates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn join_parts(candidate: &Value) -> String {
        candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .map(|p| p.get("text").and_then(Value::as_str).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Flattened text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates()
            .first()
            .map(Self::join_parts)
            .unwrap_or_default()
    }

    /// One model message per candidate.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.candidates()
            .iter()
            .map(|c| ChatMessage::model(Self::join_parts(c)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f64>,
    pub raw: Value,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationType::Info => "INFO",
            NotificationType::Warning => "WARNING",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Expense => "EXPENSE",
            TransactionType::Income => "INCOME",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_response_text_joins_first_candidate() {
        let response = ModelResponse::new(json!({
            "candidates": [
                { "content": { "parts": [ { "text": " Hola" }, { "text": "mundo " } ] } },
                { "content": { "parts": [ { "text": "segunda" } ] } }
            ]
        }));

        assert_eq!(response.text(), "Hola mundo");
        let messages = response.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], ChatMessage::model("segunda"));
    }

    #[test]
    fn test_model_response_without_candidates() {
        let response = ModelResponse::new(json!({ "promptFeedback": {} }));
        assert_eq!(response.text(), "");
        assert!(response.messages().is_empty());
    }

    #[test]
    fn test_gateway_records_are_lenient() {
        let budget: Budget = serde_json::from_value(json!({
            "category": "Alimentación",
            "limitAmount": 500,
            "periodStart": "2025-01-01"
        }))
        .unwrap();
        assert_eq!(budget.limit_amount, 500.0);
        assert!(budget.period_end.is_none());

        let classification: Classification = serde_json::from_value(json!({})).unwrap();
        assert_eq!(classification.predicted_category, "Otros");
    }

    #[test]
    fn test_new_transaction_wire_shape() {
        let tx = NewTransaction {
            account_id: "acc1".into(),
            amount: 30.0,
            transaction_type: TransactionType::Expense,
            category: Some("Transporte".into()),
            description: "Taxi".into(),
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["accountId"], "acc1");
        assert_eq!(value["type"], "EXPENSE");
    }

    #[test]
    fn test_goal_progress_with_zero_target() {
        let goal = Goal {
            current_amount: 50.0,
            ..Goal::default()
        };
        assert_eq!(goal.progress_percent(), 0.0);
    }
}
