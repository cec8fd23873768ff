//! GraphQL data gateway client
//!
//! The gateway fronts the core service (accounts, budgets, transactions,
//! goals) and the ML service (classification, patterns, forecasts,
//! predictions). A client is bound to one user and that caller's
//! authorization token.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::OrchestrationError;
use crate::models::{
    Account, Budget, Classification, ForecastPoint, Goal, NewTransaction, Prediction,
    RegisteredTransaction, SpendingPattern, Transaction,
};
use crate::Result;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

const BUDGETS_QUERY: &str = r#"
query BudgetsByUser($userId: String!) {
  budgetsByUser(userId: $userId) {
    id
    category
    limitAmount
    periodStart
    periodEnd
  }
}"#;

const TRANSACTIONS_QUERY: &str = r#"
query TransactionsByUser($userId: String!, $limit: Int) {
  transactionsByUser(userId: $userId, limit: $limit) {
    id
    amount
    category
    description
    date
  }
}"#;

const ACCOUNTS_QUERY: &str = r#"
query GetUserAccounts($userId: String!) {
  accountsByUser(userId: $userId) {
    id
    name
    balance
    type
    currency
  }
}"#;

const GOALS_QUERY: &str = r#"
query GetUserGoals($userId: String!) {
  goals(userId: $userId) {
    id
    name
    targetAmount
    currentAmount
    targetDate
  }
}"#;

const REGISTER_TRANSACTION_MUTATION: &str = r#"
mutation RegisterTransaction($input: RegisterTransactionInput!) {
  registerTransaction(input: $input) {
    id
    account { id userId name balance }
  }
}"#;

const CLASSIFY_TRANSACTION_MUTATION: &str = r#"
mutation ClassifyTransaction($input: ClassifyTransactionInput!) {
  classifyTransaction(input: $input) {
    id
    predictedCategory
    confidence
    modelVersion
  }
}"#;

const SPENDING_PATTERNS_QUERY: &str = r#"
query AnalyzePatterns($userId: ID!, $startDate: String!, $endDate: String!) {
  analyzeSpendingPatterns(userId: $userId, startDate: $startDate, endDate: $endDate) {
    patternType
    description
    frequency
    averageAmount
    category
  }
}"#;

const FORECAST_QUERY: &str = r#"
query GenerateForecast($userId: ID!, $months: Int!) {
  generateForecast(userId: $userId, months: $months) {
    forecastMonth
    forecastYear
    predictedAmount
    trend
    category
  }
}"#;

const PREDICTIONS_QUERY: &str = r#"
query GetPredictions($limit: Int, $offset: Int) {
  predictions(limit: $limit, offset: $offset) {
    id
    inputText
    predictedCategory
    confidence
  }
}"#;

/// Typed view of the gateway used by the orchestrator.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn user_budgets(&self, user_id: &str) -> Result<Vec<Budget>>;
    async fn recent_transactions(&self, user_id: &str, limit: u32) -> Result<Vec<Transaction>>;
    async fn user_accounts(&self, user_id: &str) -> Result<Vec<Account>>;
    async fn user_goals(&self, user_id: &str) -> Result<Vec<Goal>>;
    async fn register_transaction(&self, transaction: &NewTransaction) -> Result<RegisteredTransaction>;
    async fn classify_transaction(&self, text: &str, amount: f64) -> Result<Classification>;
    async fn spending_patterns(&self, start_date: &str, end_date: &str) -> Result<Vec<SpendingPattern>>;
    async fn forecast(&self, months: u32) -> Result<Vec<ForecastPoint>>;
    async fn predictions(&self, limit: u32, offset: u32) -> Result<Vec<Prediction>>;
}

/// Shared, pooled HTTP client for gateway calls.
pub fn build_http_client() -> Result<Client> {
    Ok(Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .timeout(GATEWAY_TIMEOUT)
        .build()?)
}

/// Normalise a caller-supplied token into an `Authorization` header value.
pub fn authorization_header(token: Option<&str>) -> Option<String> {
    let token = token.map(str::trim).filter(|t| !t.is_empty())?;
    if token.starts_with("Bearer ") {
        Some(token.to_string())
    } else {
        Some(format!("Bearer {}", token))
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    url: String,
    user_id: String,
    authorization: Option<String>,
}

impl GatewayClient {
    pub fn new(client: Client, url: &str, user_id: &str, token: Option<&str>) -> Self {
        Self {
            client,
            url: url.to_string(),
            user_id: user_id.to_string(),
            authorization: authorization_header(token),
        }
    }

    /// Run an arbitrary query or mutation and return its `data` object.
    pub async fn execute(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let mut payload = json!({ "query": query });
        if let Some(variables) = variables {
            payload["variables"] = variables;
        }

        debug!(query = %query.trim().chars().take(80).collect::<String>(), "Executing gateway query");

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(authorization) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| {
            error!("Gateway request failed: {}", e);
            OrchestrationError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gateway returned {}: {}", status, body);
            return Err(OrchestrationError::Upstream {
                service: "gateway",
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        unwrap_envelope(envelope)
    }

    async fn fetch<T>(&self, query: &str, variables: Value, field: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let data = self.execute(query, Some(variables)).await?;
        take_field(data, field)
    }
}

/// Turn a GraphQL envelope into its `data`, failing on a non-empty `errors` array.
fn unwrap_envelope(mut envelope: Value) -> Result<Value> {
    if let Some(errors) = envelope.get("errors") {
        let has_errors = errors.as_array().map(|e| !e.is_empty()).unwrap_or(!errors.is_null());
        if has_errors {
            error!("GraphQL errors: {}", errors);
            return Err(OrchestrationError::Graphql(errors.to_string()));
        }
    }

    Ok(match envelope.get_mut("data").map(Value::take) {
        Some(Value::Null) | None => json!({}),
        Some(data) => data,
    })
}

fn take_field<T>(mut data: Value, field: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match data.get_mut(field).map(Value::take) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[async_trait]
impl DataGateway for GatewayClient {
    async fn user_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.fetch(BUDGETS_QUERY, json!({ "userId": user_id }), "budgetsByUser")
            .await
    }

    async fn recent_transactions(&self, user_id: &str, limit: u32) -> Result<Vec<Transaction>> {
        self.fetch(
            TRANSACTIONS_QUERY,
            json!({ "userId": user_id, "limit": limit }),
            "transactionsByUser",
        )
        .await
    }

    async fn user_accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        self.fetch(ACCOUNTS_QUERY, json!({ "userId": user_id }), "accountsByUser")
            .await
    }

    async fn user_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        self.fetch(GOALS_QUERY, json!({ "userId": user_id }), "goals")
            .await
    }

    async fn register_transaction(&self, transaction: &NewTransaction) -> Result<RegisteredTransaction> {
        self.fetch(
            REGISTER_TRANSACTION_MUTATION,
            json!({ "input": transaction }),
            "registerTransaction",
        )
        .await
    }

    async fn classify_transaction(&self, text: &str, amount: f64) -> Result<Classification> {
        self.fetch(
            CLASSIFY_TRANSACTION_MUTATION,
            json!({ "input": { "text": text, "amount": amount } }),
            "classifyTransaction",
        )
        .await
    }

    async fn spending_patterns(&self, start_date: &str, end_date: &str) -> Result<Vec<SpendingPattern>> {
        self.fetch(
            SPENDING_PATTERNS_QUERY,
            json!({ "userId": self.user_id, "startDate": start_date, "endDate": end_date }),
            "analyzeSpendingPatterns",
        )
        .await
    }

    async fn forecast(&self, months: u32) -> Result<Vec<ForecastPoint>> {
        self.fetch(
            FORECAST_QUERY,
            json!({ "userId": self.user_id, "months": months }),
            "generateForecast",
        )
        .await
    }

    async fn predictions(&self, limit: u32, offset: u32) -> Result<Vec<Prediction>> {
        self.fetch(
            PREDICTIONS_QUERY,
            json!({ "limit": limit, "offset": offset }),
            "predictions",
        )
        .await
    }
}
