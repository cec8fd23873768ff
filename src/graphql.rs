//! GraphQL transport
//!
//! Mirrors the REST surface: a `health` query plus one mutation per agent
//! operation. Every resolver goes through `ApiState`, so both transports
//! share the same fallback policy.

use async_graphql::http::GraphiQLSource;
use async_graphql::{
    Context, EmptySubscription, InputObject, Json as GqlJson, Object, Schema, SimpleObject,
};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    response::Html,
    routing::post,
    Json, Router,
};
use tracing::{error, info};

use crate::agent::outcome::{
    BudgetAuditOutcome, CategorizationOutcome, DocumentOutcome, InsightsOutcome,
    SavingsPlanOutcome, SpendingAlertOutcome,
};
use crate::api::ApiState;
use crate::config::SERVICE_VERSION;
use crate::conversational::{ChatRequest, IncomingMessage};
use crate::error::OrchestrationError;
use crate::models::{ForecastPoint, SpendingPattern};

pub type FinanceSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Caller's `Authorization` header, forwarded to the gateway.
pub struct AuthToken(pub String);

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn field_error(operation: &str, e: OrchestrationError) -> async_graphql::Error {
    error!("GraphQL {} failed: {}", operation, e);
    async_graphql::Error::new(e.to_string())
}

//
// ================= Types =================
//

#[derive(SimpleObject)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub integrations: Vec<String>,
}

#[derive(SimpleObject)]
pub struct GeminiMessage {
    pub role: String,
    pub content: String,
}

#[derive(InputObject)]
pub struct ChatMessageInput {
    pub role: String,
    pub content: String,
}

#[derive(SimpleObject)]
pub struct ChatResponse {
    pub messages: Vec<GeminiMessage>,
    /// Upstream reply as a JSON string.
    pub raw: Option<String>,
}

#[derive(SimpleObject)]
#[graphql(name = "OCRResult")]
pub struct OcrResultObject {
    pub text: String,
    pub confidence: Option<f64>,
    pub raw: Option<String>,
}

#[derive(SimpleObject)]
pub struct BudgetAuditResult {
    pub status: String,
    pub analysis: Option<String>,
    pub budgets_reviewed: Option<i32>,
    pub message: Option<String>,
}

impl From<BudgetAuditOutcome> for BudgetAuditResult {
    fn from(outcome: BudgetAuditOutcome) -> Self {
        match outcome {
            BudgetAuditOutcome::Completed {
                analysis,
                budgets_reviewed,
                ..
            } => Self {
                status: "completed".into(),
                analysis: Some(analysis),
                budgets_reviewed: Some(count(budgets_reviewed)),
                message: None,
            },
            BudgetAuditOutcome::NoBudgets { message } => Self {
                status: "no_budgets".into(),
                analysis: None,
                budgets_reviewed: None,
                message: Some(message),
            },
        }
    }
}

#[derive(InputObject)]
pub struct ProcessDocumentInput {
    pub document_url: String,
    pub account_id: String,
}

#[derive(SimpleObject)]
pub struct ProcessDocumentResult {
    pub status: String,
    pub transaction_id: Option<String>,
    pub ocr_text: Option<String>,
    pub message: Option<String>,
}

impl From<DocumentOutcome> for ProcessDocumentResult {
    fn from(outcome: DocumentOutcome) -> Self {
        match outcome {
            DocumentOutcome::Success {
                transaction,
                ocr_text,
                ..
            } => Self {
                status: "success".into(),
                transaction_id: transaction.id,
                ocr_text: Some(ocr_text),
                message: None,
            },
            DocumentOutcome::Error { message } => Self {
                status: "error".into(),
                transaction_id: None,
                ocr_text: None,
                message: Some(message),
            },
        }
    }
}

#[derive(InputObject)]
pub struct SavingsPlanInput {
    pub target_amount: f64,
    pub months: i32,
}

#[derive(SimpleObject)]
pub struct SavingsPlanResult {
    pub status: String,
    pub plan: Option<String>,
    pub target: Option<f64>,
    pub months: Option<i32>,
    pub monthly_amount: Option<f64>,
}

impl From<SavingsPlanOutcome> for SavingsPlanResult {
    fn from(outcome: SavingsPlanOutcome) -> Self {
        let SavingsPlanOutcome::Success {
            plan,
            target,
            months,
            monthly_amount,
            ..
        } = outcome;
        Self {
            status: "success".into(),
            plan: Some(plan),
            target: Some(target),
            months: Some(i32::try_from(months).unwrap_or(i32::MAX)),
            monthly_amount: Some(monthly_amount),
        }
    }
}

#[derive(InputObject)]
pub struct SmartCategorizeInput {
    pub transaction_text: String,
    pub account_id: String,
    pub amount: f64,
}

#[derive(SimpleObject)]
pub struct CategorizationResult {
    pub status: String,
    pub transaction_id: Option<String>,
    pub category: String,
    pub ml_confidence: f64,
    pub method: String,
}

impl From<CategorizationOutcome> for CategorizationResult {
    fn from(outcome: CategorizationOutcome) -> Self {
        let CategorizationOutcome::Success {
            transaction,
            category,
            ml_confidence,
            method,
            ..
        } = outcome;
        Self {
            status: "success".into(),
            transaction_id: transaction.id,
            category,
            ml_confidence,
            method: method.as_str().to_string(),
        }
    }
}

#[derive(SimpleObject)]
pub struct FinancialInsightsResult {
    pub status: String,
    pub analysis: String,
    pub patterns: GqlJson<Vec<SpendingPattern>>,
    pub forecast: GqlJson<Vec<ForecastPoint>>,
    pub generated_at: String,
}

impl From<InsightsOutcome> for FinancialInsightsResult {
    fn from(outcome: InsightsOutcome) -> Self {
        let InsightsOutcome::Success {
            patterns,
            forecast,
            analysis,
            generated_at,
            ..
        } = outcome;
        Self {
            status: "success".into(),
            analysis,
            patterns: GqlJson(patterns),
            forecast: GqlJson(forecast),
            generated_at: generated_at.to_rfc3339(),
        }
    }
}

#[derive(SimpleObject)]
pub struct SpendingAlertResult {
    pub status: String,
    pub message: Option<String>,
    pub anomalies: i32,
}

impl From<SpendingAlertOutcome> for SpendingAlertResult {
    fn from(outcome: SpendingAlertOutcome) -> Self {
        match outcome {
            SpendingAlertOutcome::AlertSent {
                message, anomalies, ..
            } => Self {
                status: "alert_sent".into(),
                message: Some(message),
                anomalies: count(anomalies),
            },
            SpendingAlertOutcome::NoAlerts { anomalies_detected } => Self {
                status: "no_alerts".into(),
                message: None,
                anomalies: count(anomalies_detected),
            },
        }
    }
}

//
// ================= Resolvers =================
//

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn health(&self, ctx: &Context<'_>) -> async_graphql::Result<HealthStatus> {
        let state = ctx.data::<ApiState>()?;
        Ok(HealthStatus {
            status: "OK".to_string(),
            version: SERVICE_VERSION.to_string(),
            integrations: state.settings.integrations(),
        })
    }
}

pub struct MutationRoot;

fn token<'a>(ctx: &'a Context<'_>) -> Option<&'a str> {
    ctx.data_opt::<AuthToken>().map(|t| t.0.as_str())
}

#[Object]
impl MutationRoot {
    async fn chat(
        &self,
        ctx: &Context<'_>,
        messages: Vec<ChatMessageInput>,
    ) -> async_graphql::Result<ChatResponse> {
        let state = ctx.data::<ApiState>()?;
        let request = ChatRequest {
            messages: Some(
                messages
                    .into_iter()
                    .map(|m| IncomingMessage {
                        role: m.role,
                        content: m.content,
                    })
                    .collect(),
            ),
            prompt: None,
        };

        let reply = state.chat(request).await.map_err(|e| field_error("chat", e))?;
        Ok(ChatResponse {
            messages: reply
                .messages
                .into_iter()
                .map(|m| GeminiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content,
                })
                .collect(),
            raw: Some(reply.raw.to_string()),
        })
    }

    async fn analyze_document(
        &self,
        ctx: &Context<'_>,
        document_url: String,
    ) -> async_graphql::Result<OcrResultObject> {
        let state = ctx.data::<ApiState>()?;
        let result = state
            .analyze_document(&document_url)
            .await
            .map_err(|e| field_error("analyzeDocument", e))?;
        Ok(OcrResultObject {
            text: result.text,
            confidence: result.confidence,
            raw: Some(result.raw.to_string()),
        })
    }

    async fn audit_budget(
        &self,
        ctx: &Context<'_>,
        user_id: String,
    ) -> async_graphql::Result<BudgetAuditResult> {
        let state = ctx.data::<ApiState>()?;
        info!(%user_id, "GraphQL auditBudget");
        Ok(state.audit_budget(&user_id, token(ctx)).await.into())
    }

    async fn process_document(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        input: ProcessDocumentInput,
    ) -> async_graphql::Result<ProcessDocumentResult> {
        let state = ctx.data::<ApiState>()?;
        info!(%user_id, "GraphQL processDocument");
        let outcome = state
            .process_document(&user_id, token(ctx), &input.document_url, &input.account_id)
            .await
            .map_err(|e| field_error("processDocument", e))?;
        Ok(outcome.into())
    }

    async fn generate_savings_plan(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        input: SavingsPlanInput,
    ) -> async_graphql::Result<SavingsPlanResult> {
        let state = ctx.data::<ApiState>()?;
        let months = u32::try_from(input.months).map_err(|_| {
            field_error(
                "generateSavingsPlan",
                OrchestrationError::Validation("months must not be negative".to_string()),
            )
        })?;
        info!(%user_id, "GraphQL generateSavingsPlan");
        Ok(state
            .savings_plan(&user_id, token(ctx), input.target_amount, months)
            .await
            .into())
    }

    async fn smart_categorize(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        input: SmartCategorizeInput,
    ) -> async_graphql::Result<CategorizationResult> {
        let state = ctx.data::<ApiState>()?;
        info!(%user_id, "GraphQL smartCategorize");
        let outcome = state
            .smart_categorize(
                &user_id,
                token(ctx),
                &input.transaction_text,
                &input.account_id,
                input.amount,
            )
            .await
            .map_err(|e| field_error("smartCategorize", e))?;
        Ok(outcome.into())
    }

    async fn financial_insights(
        &self,
        ctx: &Context<'_>,
        user_id: String,
    ) -> async_graphql::Result<FinancialInsightsResult> {
        let state = ctx.data::<ApiState>()?;
        info!(%user_id, "GraphQL financialInsights");
        let outcome = state
            .financial_insights(&user_id, token(ctx))
            .await
            .map_err(|e| field_error("financialInsights", e))?;
        Ok(outcome.into())
    }

    async fn spending_alert(
        &self,
        ctx: &Context<'_>,
        user_id: String,
    ) -> async_graphql::Result<SpendingAlertResult> {
        let state = ctx.data::<ApiState>()?;
        info!(%user_id, "GraphQL spendingAlert");
        let outcome = state
            .spending_alert(&user_id, token(ctx))
            .await
            .map_err(|e| field_error("spendingAlert", e))?;
        Ok(outcome.into())
    }
}

//
// ================= HTTP =================
//

pub fn build_schema(state: ApiState) -> FinanceSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .enable_federation()
        .finish()
}

async fn graphql_handler(
    State(schema): State<FinanceSchema>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let mut request = request;
    if let Some(authorization) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        request = request.data(AuthToken(authorization.to_string()));
    }
    Json(schema.execute(request).await)
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// `/graphql` routes; GraphiQL is served on GET when enabled.
pub fn router(state: ApiState) -> Router {
    let graphiql_enabled = state.settings.graphiql_enabled;
    let schema = build_schema(state);

    let route = if graphiql_enabled {
        post(graphql_handler).get(graphiql)
    } else {
        post(graphql_handler)
    };

    Router::new().route("/graphql", route).with_state(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{state_with, FixedUpstreams};
    use crate::config::Settings;
    use crate::mock::{MockGateway, MockModel, MockNotifier, MockOcr};
    use async_graphql::{Request, Variables};
    use serde_json::json;
    use std::sync::Arc;

    async fn run(schema: &FinanceSchema, request: Request) -> serde_json::Value {
        let response = schema.execute(request).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        response.data.into_json().unwrap()
    }

    #[tokio::test]
    async fn test_health_lists_configured_integrations() {
        let settings = Settings {
            gemini_api_key: Some("dummy".into()),
            mistral_ocr_api_key: Some("dummy".into()),
            ..Settings::default()
        };
        let upstreams = FixedUpstreams {
            model: Arc::new(MockModel::failing()),
            ocr: Arc::new(MockOcr::failing()),
            gateway: Arc::new(MockGateway::new()),
            notifier: Arc::new(MockNotifier::new()),
        };
        let schema = build_schema(ApiState::new(Arc::new(settings), Arc::new(upstreams)));

        let data = run(&schema, Request::new("{ health { status version integrations } }")).await;

        assert_eq!(data["health"]["status"], "OK");
        assert_eq!(data["health"]["integrations"], json!(["gemini", "mistral_ocr"]));
    }

    #[tokio::test]
    async fn test_schema_is_a_federated_subgraph() {
        let schema = build_schema(state_with(
            MockModel::failing(),
            MockOcr::failing(),
            MockGateway::new(),
        ));

        let data = run(&schema, Request::new("{ _service { sdl } }")).await;

        let sdl = data["_service"]["sdl"].as_str().unwrap();
        assert!(sdl.contains("health"));
        assert!(sdl.contains("generateSavingsPlan"));
    }

    #[tokio::test]
    async fn test_chat_mutation() {
        let schema = build_schema(state_with(
            MockModel::new(["Respuesta simulada"]),
            MockOcr::failing(),
            MockGateway::new(),
        ));
        let query = r#"
            mutation Chat($messages: [ChatMessageInput!]!) {
              chat(messages: $messages) { messages { role content } raw }
            }"#;
        let variables = Variables::from_json(json!({
            "messages": [ { "role": "user", "content": "Hola" } ]
        }));

        let data = run(&schema, Request::new(query).variables(variables)).await;

        assert_eq!(data["chat"]["messages"][0]["content"], "Respuesta simulada");
        assert_eq!(data["chat"]["messages"][0]["role"], "model");
        let raw: serde_json::Value =
            serde_json::from_str(data["chat"]["raw"].as_str().unwrap()).unwrap();
        assert!(raw["candidates"].is_array());
    }

    #[tokio::test]
    async fn test_analyze_document_mutation() {
        let schema = build_schema(state_with(
            MockModel::failing(),
            MockOcr::new("Contenido OCR"),
            MockGateway::new(),
        ));
        let query = r#"
            mutation Analyze($url: String!) {
              analyzeDocument(documentUrl: $url) { text confidence raw }
            }"#;
        let variables = Variables::from_json(json!({ "url": "https://example.com/doc.pdf" }));

        let data = run(&schema, Request::new(query).variables(variables)).await;

        assert_eq!(data["analyzeDocument"]["text"], "Contenido OCR");
    }

    #[tokio::test]
    async fn test_audit_budget_without_budgets() {
        let schema = build_schema(state_with(MockModel::failing(), MockOcr::failing(), MockGateway::new()));

        let data = run(
            &schema,
            Request::new(r#"mutation { auditBudget(userId: "user123") { status message budgetsReviewed } }"#),
        )
        .await;

        assert_eq!(data["auditBudget"]["status"], "no_budgets");
        assert_eq!(data["auditBudget"]["budgetsReviewed"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_failed_workflow_is_field_error() {
        let schema = build_schema(state_with(MockModel::failing(), MockOcr::failing(), MockGateway::failing()));

        let response = schema
            .execute(r#"mutation { spendingAlert(userId: "user123") { status } }"#)
            .await;

        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("gateway"));
    }

    #[tokio::test]
    async fn test_savings_plan_input_is_camel_case() {
        let schema = build_schema(state_with(MockModel::new(["plan"]), MockOcr::failing(), MockGateway::new()));

        let data = run(
            &schema,
            Request::new(
                r#"mutation {
                  generateSavingsPlan(userId: "user123", input: { targetAmount: 1200, months: 12 }) {
                    status target months monthlyAmount
                  }
                }"#,
            ),
        )
        .await;

        assert_eq!(data["generateSavingsPlan"]["status"], "success");
        assert_eq!(data["generateSavingsPlan"]["monthlyAmount"], 100.0);
    }
}
