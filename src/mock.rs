//! Scripted upstream doubles
//!
//! Keep the orchestrator and the transports testable without network access.
//! Every double records what it was asked so tests can assert on call order
//! and payloads.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::OrchestrationError;
use crate::gateway::DataGateway;
use crate::gemini::LanguageModel;
use crate::models::{
    Account, Budget, ChatMessage, Classification, ForecastPoint, Goal, ModelResponse,
    NewTransaction, Notification, OcrResult, Prediction, RegisteredTransaction, SpendingPattern,
    Transaction,
};
use crate::notifier::Notifier;
use crate::ocr::OcrProvider;
use crate::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable(service: &'static str) -> OrchestrationError {
    OrchestrationError::Upstream {
        service,
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// Returns scripted replies in order; fails once the script runs out.
#[derive(Default)]
pub struct MockModel {
    replies: Vec<String>,
    index: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A model that fails on every call.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Every conversation the model was sent, in call order.
    pub fn conversations(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ModelResponse> {
        lock(&self.prompts).push(messages.to_vec());
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.replies
            .get(i)
            .map(|reply| ModelResponse::from_text(reply))
            .ok_or_else(|| unavailable("gemini"))
    }
}

#[derive(Default)]
pub struct MockOcr {
    text: Option<String>,
}

impl MockOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OcrProvider for MockOcr {
    async fn extract_text(&self, _document_url: &str) -> Result<OcrResult> {
        let text = self.text.clone().ok_or_else(|| unavailable("mistral_ocr"))?;
        Ok(OcrResult {
            raw: serde_json::json!({ "text": text }),
            text,
            confidence: None,
        })
    }
}

/// In-memory gateway. Reads return the seeded records; writes are recorded.
#[derive(Default)]
pub struct MockGateway {
    pub budgets: Vec<Budget>,
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<Account>,
    pub goals: Vec<Goal>,
    pub classification: Classification,
    pub patterns: Vec<SpendingPattern>,
    pub forecast: Vec<ForecastPoint>,
    pub predictions: Vec<Prediction>,
    pub unavailable: bool,
    pub registered: Mutex<Vec<NewTransaction>>,
    pub transaction_limits: Mutex<Vec<u32>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that rejects every call.
    pub fn failing() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn registered(&self) -> Vec<NewTransaction> {
        lock(&self.registered).clone()
    }

    /// `limit` argument of every transaction fetch.
    pub fn transaction_limits(&self) -> Vec<u32> {
        lock(&self.transaction_limits).clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable {
            Err(unavailable("gateway"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataGateway for MockGateway {
    async fn user_budgets(&self, _user_id: &str) -> Result<Vec<Budget>> {
        self.check()?;
        Ok(self.budgets.clone())
    }

    async fn recent_transactions(&self, _user_id: &str, limit: u32) -> Result<Vec<Transaction>> {
        self.check()?;
        lock(&self.transaction_limits).push(limit);
        Ok(self.transactions.iter().take(limit as usize).cloned().collect())
    }

    async fn user_accounts(&self, _user_id: &str) -> Result<Vec<Account>> {
        self.check()?;
        Ok(self.accounts.clone())
    }

    async fn user_goals(&self, _user_id: &str) -> Result<Vec<Goal>> {
        self.check()?;
        Ok(self.goals.clone())
    }

    async fn register_transaction(&self, transaction: &NewTransaction) -> Result<RegisteredTransaction> {
        self.check()?;
        let mut registered = lock(&self.registered);
        registered.push(transaction.clone());
        Ok(RegisteredTransaction {
            id: Some(format!("tx-{}", registered.len())),
            fields: serde_json::Map::new(),
        })
    }

    async fn classify_transaction(&self, _text: &str, _amount: f64) -> Result<Classification> {
        self.check()?;
        Ok(self.classification.clone())
    }

    async fn spending_patterns(&self, _start_date: &str, _end_date: &str) -> Result<Vec<SpendingPattern>> {
        self.check()?;
        Ok(self.patterns.clone())
    }

    async fn forecast(&self, _months: u32) -> Result<Vec<ForecastPoint>> {
        self.check()?;
        Ok(self.forecast.clone())
    }

    async fn predictions(&self, limit: u32, offset: u32) -> Result<Vec<Prediction>> {
        self.check()?;
        Ok(self
            .predictions
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    fail: bool,
    sent: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_notification(&self, notification: &Notification) -> Result<Option<String>> {
        let mut sent = lock(&self.sent);
        sent.push(notification.clone());
        if self.fail {
            return Err(unavailable("notification"));
        }
        Ok(Some(format!("n-{}", sent.len())))
    }
}
