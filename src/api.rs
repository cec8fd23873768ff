//! REST API server for the agents service
//!
//! Exposes chat, OCR and the six orchestrator workflows over HTTP, and mounts
//! the GraphQL endpoint next to them. Both transports share `ApiState`, which
//! also owns the fallback policy.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::agent::outcome::{
    BudgetAuditOutcome, CategorizationOutcome, DocumentOutcome, InsightsOutcome,
    SavingsPlanOutcome, SpendingAlertOutcome,
};
use crate::agent::{Orchestrator, Services};
use crate::config::{Settings, SERVICE_NAME, SERVICE_VERSION};
use crate::conversational::{self, ChatReply, ChatRequest};
use crate::error::OrchestrationError;
use crate::fallback::FallbackAgent;
use crate::gateway::{build_http_client, DataGateway, GatewayClient};
use crate::gemini::{GeminiClient, LanguageModel};
use crate::graphql;
use crate::models::OcrResult;
use crate::notifier::{NotificationClient, Notifier};
use crate::ocr::{MistralOcrClient, OcrProvider};
use crate::Result;

/// =============================
/// Upstream Wiring
/// =============================

/// Hands out upstream clients. The gateway client is bound per user and token.
pub trait UpstreamProvider: Send + Sync {
    fn model(&self) -> Arc<dyn LanguageModel>;
    fn ocr(&self) -> Arc<dyn OcrProvider>;
    fn notifier(&self) -> Arc<dyn Notifier>;
    fn gateway(&self, user_id: &str, token: Option<&str>) -> Arc<dyn DataGateway>;
}

/// Real HTTP clients, each built once so connections are pooled.
pub struct HttpUpstreams {
    gateway_url: String,
    gateway_http: reqwest::Client,
    model: Arc<GeminiClient>,
    ocr: Arc<MistralOcrClient>,
    notifier: Arc<NotificationClient>,
}

impl HttpUpstreams {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            gateway_url: settings.gateway_url.clone(),
            gateway_http: build_http_client()?,
            model: Arc::new(GeminiClient::new(settings)?),
            ocr: Arc::new(MistralOcrClient::new(settings)?),
            notifier: Arc::new(NotificationClient::new(settings)?),
        })
    }
}

impl UpstreamProvider for HttpUpstreams {
    fn model(&self) -> Arc<dyn LanguageModel> {
        self.model.clone()
    }

    fn ocr(&self) -> Arc<dyn OcrProvider> {
        self.ocr.clone()
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    fn gateway(&self, user_id: &str, token: Option<&str>) -> Arc<dyn DataGateway> {
        Arc::new(GatewayClient::new(
            self.gateway_http.clone(),
            &self.gateway_url,
            user_id,
            token,
        ))
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<Settings>,
    upstreams: Arc<dyn UpstreamProvider>,
    fallback: FallbackAgent,
}

impl ApiState {
    pub fn new(settings: Arc<Settings>, upstreams: Arc<dyn UpstreamProvider>) -> Self {
        Self {
            settings,
            upstreams,
            fallback: FallbackAgent::new(),
        }
    }

    /// State wired to the real upstream services.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let upstreams = HttpUpstreams::new(&settings)?;
        Ok(Self::new(Arc::new(settings), Arc::new(upstreams)))
    }

    pub fn orchestrator(&self, user_id: &str, token: Option<&str>) -> Orchestrator {
        Orchestrator::new(
            user_id,
            Services {
                model: self.upstreams.model(),
                ocr: self.upstreams.ocr(),
                gateway: self.upstreams.gateway(user_id, token),
                notifier: self.upstreams.notifier(),
            },
        )
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let messages = request.into_messages()?;
        let model = self.upstreams.model();
        Ok(conversational::respond(model.as_ref(), &self.fallback, &messages).await)
    }

    /// OCR a document, answering with the sample receipt if the provider fails.
    pub async fn analyze_document(&self, document_url: &str) -> Result<OcrResult> {
        validate_document_url(document_url)?;

        match self.upstreams.ocr().extract_text(document_url).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("OCR unavailable, answering with fallback agent: {}", e);
                Ok(FallbackAgent::receipt())
            }
        }
    }

    pub async fn audit_budget(&self, user_id: &str, token: Option<&str>) -> BudgetAuditOutcome {
        match self.orchestrator(user_id, token).run_budget_audit().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Budget audit failed, using fallback agent: {}", e);
                self.fallback.analyze_budget(user_id)
            }
        }
    }

    pub async fn process_document(
        &self,
        user_id: &str,
        token: Option<&str>,
        document_url: &str,
        account_id: &str,
    ) -> Result<DocumentOutcome> {
        validate_document_url(document_url)?;
        self.orchestrator(user_id, token)
            .process_document_and_register(document_url, account_id)
            .await
    }

    pub async fn savings_plan(
        &self,
        user_id: &str,
        token: Option<&str>,
        target_amount: f64,
        months: u32,
    ) -> SavingsPlanOutcome {
        match self
            .orchestrator(user_id, token)
            .generate_savings_plan(target_amount, months)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Savings plan failed, using fallback agent: {}", e);
                self.fallback.generate_savings_plan(target_amount, months)
            }
        }
    }

    pub async fn smart_categorize(
        &self,
        user_id: &str,
        token: Option<&str>,
        transaction_text: &str,
        account_id: &str,
        amount: f64,
    ) -> Result<CategorizationOutcome> {
        if transaction_text.trim().is_empty() {
            return Err(OrchestrationError::Validation(
                "transaction_text must not be empty".to_string(),
            ));
        }
        self.orchestrator(user_id, token)
            .smart_categorize_transaction(transaction_text, account_id, amount)
            .await
    }

    pub async fn financial_insights(&self, user_id: &str, token: Option<&str>) -> Result<InsightsOutcome> {
        self.orchestrator(user_id, token)
            .generate_financial_insights()
            .await
    }

    pub async fn spending_alert(&self, user_id: &str, token: Option<&str>) -> Result<SpendingAlertOutcome> {
        self.orchestrator(user_id, token)
            .proactive_spending_alert()
            .await
    }
}

/// Only absolute http(s) URLs are accepted as documents.
pub fn validate_document_url(document_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(document_url.trim()).map_err(|e| {
        OrchestrationError::Validation(format!("document_url is not a valid URL: {}", e))
    })?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        scheme => Err(OrchestrationError::Validation(format!(
            "document_url must be an http(s) URL, got scheme '{}'",
            scheme
        ))),
    }
}

/// =============================
/// Error Mapping
/// =============================

pub struct ApiError(OrchestrationError);

impl From<OrchestrationError> for ApiError {
    fn from(error: OrchestrationError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(OrchestrationError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(OrchestrationError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestrationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status != StatusCode::UNPROCESSABLE_ENTITY {
            error!("Request failed ({}): {}", status, self.0);
        }

        (status, Json(serde_json::json!({ "detail": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Extractors whose rejection is answered with the `{"detail"}` 422 body.
type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type UserParams = std::result::Result<Query<UserQuery>, QueryRejection>;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OcrRequest {
    pub document_url: String,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub text: String,
    pub confidence: Option<f64>,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProcessDocumentRequest {
    pub document_url: String,
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SavingsPlanRequest {
    pub target_amount: f64,
    pub months: u32,
}

#[derive(Debug, Deserialize)]
pub struct SmartCategorizeRequest {
    pub transaction_text: String,
    pub account_id: String,
    pub amount: f64,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
    }))
}

async fn chat_handler(
    State(state): State<ApiState>,
    payload: JsonBody<ChatRequest>,
) -> ApiResult<ChatReply> {
    let Json(req) = payload?;
    Ok(Json(state.chat(req).await?))
}

async fn ocr_handler(
    State(state): State<ApiState>,
    payload: JsonBody<OcrRequest>,
) -> ApiResult<OcrResponse> {
    let Json(req) = payload?;
    let result = state.analyze_document(&req.document_url).await?;
    Ok(Json(OcrResponse {
        text: result.text,
        confidence: result.confidence,
        raw: result.raw,
    }))
}

async fn audit_budget_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
) -> ApiResult<BudgetAuditOutcome> {
    let Query(query) = params?;
    info!(user_id = %query.user_id, "POST /agent/audit-budget");
    Ok(Json(state.audit_budget(&query.user_id, bearer_token(&headers)).await))
}

async fn process_document_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
    payload: JsonBody<ProcessDocumentRequest>,
) -> ApiResult<DocumentOutcome> {
    let Query(query) = params?;
    let Json(req) = payload?;
    info!(user_id = %query.user_id, "POST /agent/process-document");
    let outcome = state
        .process_document(
            &query.user_id,
            bearer_token(&headers),
            &req.document_url,
            &req.account_id,
        )
        .await?;
    Ok(Json(outcome))
}

async fn savings_plan_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
    payload: JsonBody<SavingsPlanRequest>,
) -> ApiResult<SavingsPlanOutcome> {
    let Query(query) = params?;
    let Json(req) = payload?;
    info!(user_id = %query.user_id, "POST /agent/savings-plan");
    Ok(Json(
        state
            .savings_plan(&query.user_id, bearer_token(&headers), req.target_amount, req.months)
            .await,
    ))
}

async fn smart_categorize_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
    payload: JsonBody<SmartCategorizeRequest>,
) -> ApiResult<CategorizationOutcome> {
    let Query(query) = params?;
    let Json(req) = payload?;
    info!(user_id = %query.user_id, "POST /agent/smart-categorize");
    let outcome = state
        .smart_categorize(
            &query.user_id,
            bearer_token(&headers),
            &req.transaction_text,
            &req.account_id,
            req.amount,
        )
        .await?;
    Ok(Json(outcome))
}

async fn financial_insights_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
) -> ApiResult<InsightsOutcome> {
    let Query(query) = params?;
    info!(user_id = %query.user_id, "POST /agent/financial-insights");
    Ok(Json(
        state
            .financial_insights(&query.user_id, bearer_token(&headers))
            .await?,
    ))
}

async fn spending_alert_handler(
    State(state): State<ApiState>,
    params: UserParams,
    headers: HeaderMap,
) -> ApiResult<SpendingAlertOutcome> {
    let Query(query) = params?;
    info!(user_id = %query.user_id, "POST /agent/spending-alert");
    Ok(Json(
        state
            .spending_alert(&query.user_id, bearer_token(&headers))
            .await?,
    ))
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    let graphql_router = graphql::router(state.clone());

    Router::new()
        .route("/health", get(health))
        .route("/agent/chat", post(chat_handler))
        .route("/agent/ocr", post(ocr_handler))
        .route("/agent/audit-budget", post(audit_budget_handler))
        .route("/agent/process-document", post(process_document_handler))
        .route("/agent/savings-plan", post(savings_plan_handler))
        .route("/agent/smart-categorize", post(smart_categorize_handler))
        .route("/agent/financial-insights", post(financial_insights_handler))
        .route("/agent/spending-alert", post(spending_alert_handler))
        .with_state(state)
        .merge(graphql_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(state: ApiState) -> Result<()> {
    let address = state.settings.bind_address();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(address.as_str()).await?;

    info!("API Server listening on http://{}", address);
    info!("GraphQL endpoint: http://{}/graphql", address);

    axum::serve(listener, router).await?;

    Ok(())
}
