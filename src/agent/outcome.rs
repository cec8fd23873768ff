//! Typed workflow results
//!
//! Each workflow has its own tagged result. Serialized, the variant becomes
//! the `status` field and the payload fields sit beside it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ForecastPoint, NotificationReceipt, RegisteredTransaction, SpendingPattern};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BudgetAuditOutcome {
    Completed {
        analysis: String,
        budgets_reviewed: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        notification: Option<NotificationReceipt>,
    },
    NoBudgets {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Success {
        transaction: RegisteredTransaction,
        ocr_text: String,
        notification: NotificationReceipt,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SavingsPlanOutcome {
    Success {
        plan: String,
        target: f64,
        months: u32,
        monthly_amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        notification: Option<NotificationReceipt>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationMethod {
    Ml,
    GeminiAssisted,
}

impl CategorizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ml => "ml",
            Self::GeminiAssisted => "gemini_assisted",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategorizationOutcome {
    Success {
        transaction: RegisteredTransaction,
        category: String,
        ml_confidence: f64,
        method: CategorizationMethod,
        notification: NotificationReceipt,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightsOutcome {
    Success {
        patterns: Vec<SpendingPattern>,
        forecast: Vec<ForecastPoint>,
        analysis: String,
        generated_at: DateTime<Utc>,
        notification: NotificationReceipt,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpendingAlertOutcome {
    AlertSent {
        message: String,
        anomalies: usize,
        notification: NotificationReceipt,
    },
    NoAlerts {
        anomalies_detected: usize,
    },
}

/// `target / months`, or zero when there are no months to spread it over.
pub fn monthly_amount(target: f64, months: u32) -> f64 {
    if months == 0 {
        0.0
    } else {
        target / f64::from(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_tags() {
        let outcome = BudgetAuditOutcome::NoBudgets {
            message: "Usuario sin presupuestos configurados.".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "no_budgets", "message": "Usuario sin presupuestos configurados." })
        );

        let outcome = SpendingAlertOutcome::NoAlerts { anomalies_detected: 0 };
        assert_eq!(serde_json::to_value(&outcome).unwrap()["status"], "no_alerts");
    }

    #[test]
    fn test_method_serialization() {
        assert_eq!(
            serde_json::to_value(CategorizationMethod::GeminiAssisted).unwrap(),
            json!("gemini_assisted")
        );
        assert_eq!(CategorizationMethod::Ml.as_str(), "ml");
    }

    #[test]
    fn test_monthly_amount_never_divides_by_zero() {
        assert_eq!(monthly_amount(1200.0, 0), 0.0);
        assert_eq!(monthly_amount(1200.0, 12), 100.0);
    }
}
