//! Workflow orchestrator
//!
//! Each workflow is a fixed, sequential pipeline:
//! FETCH → PROMPT → MODEL → PARSE? → WRITE BACK? → NOTIFY
//!
//! An orchestrator is built per request for one user; upstream failures
//! propagate as `OrchestrationError`, notification failures never do.

pub mod outcome;
pub mod prompts;

use chrono::{Duration, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extraction::{self, ExtractionError};
use crate::gateway::DataGateway;
use crate::gemini::LanguageModel;
use crate::models::{
    ChatMessage, NewTransaction, Notification, NotificationReceipt, NotificationType,
    TransactionType,
};
use crate::notifier::Notifier;
use crate::ocr::OcrProvider;
use crate::Result;

use outcome::{
    monthly_amount, BudgetAuditOutcome, CategorizationMethod, CategorizationOutcome,
    DocumentOutcome, InsightsOutcome, SavingsPlanOutcome, SpendingAlertOutcome,
};
use prompts::InsightsContext;

pub const CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const ALERT_MESSAGE_LIMIT: usize = 200;

const AUDIT_TRANSACTION_LIMIT: u32 = 20;
const SAVINGS_TRANSACTION_LIMIT: u32 = 30;
const PREDICTION_LIMIT: u32 = 20;
const PREDICTION_VOLUME_THRESHOLD: usize = 15;
const INSIGHTS_WINDOW_DAYS: i64 = 90;
const ALERT_WINDOW_DAYS: i64 = 30;
const FORECAST_MONTHS: u32 = 3;
const AUDIT_ALERT_MARKERS: &[&str] = &["alerta", "excedido"];
const NO_RISK_REPLY: &str = "OK";

/// Upstream collaborators for one orchestrator.
#[derive(Clone)]
pub struct Services {
    pub model: Arc<dyn LanguageModel>,
    pub ocr: Arc<dyn OcrProvider>,
    pub gateway: Arc<dyn DataGateway>,
    pub notifier: Arc<dyn Notifier>,
}

/// Fields the model is asked to pull out of a document.
#[derive(Debug, Deserialize)]
struct ExtractedTransaction {
    #[serde(deserialize_with = "numeric")]
    amount: f64,
    category: String,
    #[serde(default)]
    description: String,
}

fn numeric<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("amount '{}' is not a number", s))),
        other => Err(serde::de::Error::custom(format!(
            "amount must be a number, got {}",
            other
        ))),
    }
}

pub struct Orchestrator {
    user_id: String,
    run_id: Uuid,
    services: Services,
}

impl Orchestrator {
    pub fn new(user_id: impl Into<String>, services: Services) -> Self {
        Self {
            user_id: user_id.into(),
            run_id: Uuid::new_v4(),
            services,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Single-turn model call, returning the flattened text.
    async fn ask(&self, prompt: String) -> Result<String> {
        let response = self.services.model.chat(&[ChatMessage::user(prompt)]).await?;
        Ok(response.text())
    }

    async fn notify(
        &self,
        title: &str,
        message: String,
        notification_type: NotificationType,
    ) -> NotificationReceipt {
        let notification = Notification {
            user_id: self.user_id.clone(),
            title: title.to_string(),
            message,
            notification_type,
        };

        match self.services.notifier.send_notification(&notification).await {
            Ok(notification_id) => NotificationReceipt::Ok { notification_id },
            Err(e) => {
                warn!(run_id = %self.run_id, "Notification failed (service unavailable?): {}", e);
                NotificationReceipt::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Review budgets against recent spending and warn on overruns.
    pub async fn run_budget_audit(&self) -> Result<BudgetAuditOutcome> {
        info!(run_id = %self.run_id, user_id = %self.user_id, "Starting budget audit");

        let gateway = &self.services.gateway;
        let budgets = gateway.user_budgets(&self.user_id).await?;
        let transactions = gateway
            .recent_transactions(&self.user_id, AUDIT_TRANSACTION_LIMIT)
            .await?;

        if budgets.is_empty() {
            info!(run_id = %self.run_id, "No budgets configured");
            return Ok(BudgetAuditOutcome::NoBudgets {
                message: "Usuario sin presupuestos configurados.".to_string(),
            });
        }

        let context = prompts::budget_context(&budgets, &transactions);
        let analysis = self.ask(prompts::budget_audit_prompt(&context)).await?;

        let lowered = analysis.to_lowercase();
        let notification = if AUDIT_ALERT_MARKERS.iter().any(|m| lowered.contains(m)) {
            Some(
                self.notify(
                    "Alerta de Presupuesto",
                    prompts::truncate_chars(&analysis, ALERT_MESSAGE_LIMIT),
                    NotificationType::Warning,
                )
                .await,
            )
        } else {
            None
        };

        info!(run_id = %self.run_id, budgets = budgets.len(), "Budget audit completed");

        Ok(BudgetAuditOutcome::Completed {
            analysis,
            budgets_reviewed: budgets.len(),
            notification,
        })
    }

    /// OCR a receipt or invoice, let the model read it, and register the expense.
    pub async fn process_document_and_register(
        &self,
        document_url: &str,
        account_id: &str,
    ) -> Result<DocumentOutcome> {
        info!(run_id = %self.run_id, user_id = %self.user_id, %document_url, "Processing document");

        let ocr = self.services.ocr.extract_text(document_url).await?;
        let extracted_text = ocr.text.trim();

        if extracted_text.is_empty() {
            return Ok(DocumentOutcome::Error {
                message: "No se pudo extraer texto del documento.".to_string(),
            });
        }

        let reply = self.ask(prompts::document_prompt(extracted_text)).await?;

        let parsed: ExtractedTransaction = match extraction::extract_as(&reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                log_extraction_failure(self.run_id, &e);
                return Ok(DocumentOutcome::Error {
                    message: "No se pudo interpretar el documento.".to_string(),
                });
            }
        };

        let transaction = self
            .services
            .gateway
            .register_transaction(&NewTransaction {
                account_id: account_id.to_string(),
                amount: parsed.amount,
                transaction_type: TransactionType::Expense,
                category: Some(parsed.category.clone()),
                description: parsed.description.clone(),
            })
            .await?;

        let notification = self
            .notify(
                "Transacción Registrada",
                format!(
                    "Se registró un gasto de {} en {}.",
                    parsed.amount, parsed.category
                ),
                NotificationType::Info,
            )
            .await;

        info!(run_id = %self.run_id, transaction_id = ?transaction.id, "Document processed");

        Ok(DocumentOutcome::Success {
            transaction,
            ocr_text: extracted_text.to_string(),
            notification,
        })
    }

    /// Ask the model for a monthly plan towards `target` over `months`.
    pub async fn generate_savings_plan(&self, target: f64, months: u32) -> Result<SavingsPlanOutcome> {
        info!(run_id = %self.run_id, target, months, "Generating savings plan");

        let gateway = &self.services.gateway;
        let accounts = gateway.user_accounts(&self.user_id).await?;
        let transactions = gateway
            .recent_transactions(&self.user_id, SAVINGS_TRANSACTION_LIMIT)
            .await?;

        let balance = prompts::total_balance(&accounts);
        let avg_expense = prompts::calculate_avg_expense(&transactions);
        debug!(balance, avg_expense, "Savings plan inputs");

        let plan = self
            .ask(prompts::savings_plan_prompt(target, months, balance, avg_expense))
            .await?;

        let notification = self
            .notify(
                "Plan de Ahorro Generado",
                format!(
                    "Tu plan para ahorrar {} está listo. Revisa los detalles.",
                    target
                ),
                NotificationType::Info,
            )
            .await;

        Ok(SavingsPlanOutcome::Success {
            plan,
            target,
            months,
            monthly_amount: monthly_amount(target, months),
            notification: Some(notification),
        })
    }

    /// Classify with the ML service; below the confidence threshold the model decides.
    pub async fn smart_categorize_transaction(
        &self,
        transaction_text: &str,
        account_id: &str,
        amount: f64,
    ) -> Result<CategorizationOutcome> {
        info!(run_id = %self.run_id, user_id = %self.user_id, "Categorizing transaction");

        let classification = self
            .services
            .gateway
            .classify_transaction(transaction_text, amount)
            .await?;
        let confidence = classification.confidence;

        let (category, method) = if confidence < CONFIDENCE_THRESHOLD {
            let reply = self
                .ask(prompts::categorization_prompt(
                    transaction_text,
                    amount,
                    &classification.predicted_category,
                    confidence,
                ))
                .await?;
            (reply.trim().to_string(), CategorizationMethod::GeminiAssisted)
        } else {
            (classification.predicted_category, CategorizationMethod::Ml)
        };

        let transaction = self
            .services
            .gateway
            .register_transaction(&NewTransaction {
                account_id: account_id.to_string(),
                amount,
                transaction_type: TransactionType::from_amount(amount),
                category: Some(category.clone()),
                description: transaction_text.to_string(),
            })
            .await?;

        let notification = self
            .notify(
                "Transacción Categorizada",
                format!(
                    "Se registró {} en {} (confianza ML: {:.0}%).",
                    amount.abs(),
                    category,
                    confidence * 100.0
                ),
                NotificationType::Info,
            )
            .await;

        Ok(CategorizationOutcome::Success {
            transaction,
            category,
            ml_confidence: confidence,
            method,
            notification,
        })
    }

    /// One composite report from patterns, forecast, budgets, goals and balances.
    pub async fn generate_financial_insights(&self) -> Result<InsightsOutcome> {
        info!(run_id = %self.run_id, user_id = %self.user_id, "Generating financial insights");

        let (start_date, end_date) = date_window(INSIGHTS_WINDOW_DAYS);
        let gateway = &self.services.gateway;

        let patterns = gateway.spending_patterns(&start_date, &end_date).await?;
        let forecast = gateway.forecast(FORECAST_MONTHS).await?;
        let budgets = gateway.user_budgets(&self.user_id).await?;
        let goals = gateway.user_goals(&self.user_id).await?;
        let accounts = gateway.user_accounts(&self.user_id).await?;

        let analysis = self
            .ask(prompts::insights_prompt(&InsightsContext {
                patterns: &patterns,
                forecast: &forecast,
                budgets: &budgets,
                goals: &goals,
                accounts: &accounts,
            }))
            .await?;

        let notification = self
            .notify(
                "Reporte Financiero Mensual",
                "Tu análisis financiero personalizado está listo. Revisa los insights y recomendaciones.".to_string(),
                NotificationType::Info,
            )
            .await;

        Ok(InsightsOutcome::Success {
            patterns,
            forecast,
            analysis,
            generated_at: Utc::now(),
            notification,
        })
    }

    /// Look for anomalies or unusual volume and warn the user if the model sees risk.
    pub async fn proactive_spending_alert(&self) -> Result<SpendingAlertOutcome> {
        info!(run_id = %self.run_id, user_id = %self.user_id, "Running spending monitor");

        let gateway = &self.services.gateway;
        let predictions = gateway.predictions(PREDICTION_LIMIT, 0).await?;
        let budgets = gateway.user_budgets(&self.user_id).await?;

        let (start_date, end_date) = date_window(ALERT_WINDOW_DAYS);
        let patterns = gateway.spending_patterns(&start_date, &end_date).await?;

        let anomalies: Vec<_> = patterns.into_iter().filter(|p| p.is_anomaly()).collect();

        if !anomalies.is_empty() || predictions.len() > PREDICTION_VOLUME_THRESHOLD {
            let reply = self
                .ask(prompts::spending_alert_prompt(
                    &anomalies,
                    predictions.len(),
                    &budgets,
                ))
                .await?;
            let message = reply.trim();

            if message != NO_RISK_REPLY {
                let message = prompts::truncate_chars(message, ALERT_MESSAGE_LIMIT);
                let notification = self
                    .notify("Alerta de Gasto", message.clone(), NotificationType::Warning)
                    .await;

                info!(run_id = %self.run_id, anomalies = anomalies.len(), "Spending alert sent");
                return Ok(SpendingAlertOutcome::AlertSent {
                    message,
                    anomalies: anomalies.len(),
                    notification,
                });
            }
        }

        Ok(SpendingAlertOutcome::NoAlerts {
            anomalies_detected: anomalies.len(),
        })
    }
}

/// `(today - days, today)` as `YYYY-MM-DD`.
fn date_window(days: i64) -> (String, String) {
    let end = Utc::now().date_naive();
    let start = end - Duration::days(days);
    (
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    )
}

fn log_extraction_failure(run_id: Uuid, error: &ExtractionError) {
    warn!(%run_id, "Could not read transaction from model reply: {}", error);
}
