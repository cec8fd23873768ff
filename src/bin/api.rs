use finance_agents_service::{api::start_server, api::ApiState, config::Settings};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    // Initialize tracing
    let level = settings.tracing_level();
    tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(Level::INFO))
        .init();
    if level.is_none() {
        warn!("Unknown LOG_LEVEL '{}', using INFO", settings.log_level);
    }

    info!("🚀 FinWise Agents Service - API Server");
    info!("📍 Address: {}", settings.bind_address());
    info!("🔌 Integrations: {:?}", settings.integrations());
    info!("🌐 Locale: {}", settings.default_locale);
    if settings.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, chat will answer with the fallback agent");
    }
    if settings.mistral_ocr_api_key.is_none() {
        warn!("MISTRAL_OCR_API_KEY not set, OCR will answer with the fallback agent");
    }

    let state = ApiState::from_settings(settings)?;

    info!("📡 Starting API server...");
    start_server(state).await?;

    Ok(())
}
