//! Process-wide service configuration
//!
//! Loaded once at startup from the environment (and an optional `.env`
//! file), then shared read-only as `Arc<Settings>` with every client.

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use tracing::Level;

pub const SERVICE_NAME: &str = "agents-service";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub mistral_ocr_api_key: Option<String>,
    pub default_locale: String,
    pub log_level: String,
    pub graphiql_enabled: bool,
    pub gateway_url: String,
    pub notification_service_url: String,
    pub service_jwt_secret: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5020,
            gemini_api_key: None,
            gemini_model: "gemini-2.5-pro".to_string(),
            mistral_ocr_api_key: None,
            default_locale: "es-BO".to_string(),
            log_level: "INFO".to_string(),
            graphiql_enabled: true,
            gateway_url: "http://localhost:4000/graphql".to_string(),
            notification_service_url: "http://localhost:5025/graphql".to_string(),
            service_jwt_secret: "WERWRWERWERW".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| {
            env::var(key)
                .or_else(|_| env::var(key.to_lowercase()))
                .ok()
        })
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let port = match get("AGENTS_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                OrchestrationError::Config(format!("AGENTS_PORT '{}' is not a port: {}", raw, e))
            })?,
            None => defaults.port,
        };

        let graphiql_enabled = match get("GRAPHIQL_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                OrchestrationError::Config(format!("GRAPHIQL_ENABLED '{}' is not a boolean", raw))
            })?,
            None => defaults.graphiql_enabled,
        };

        Ok(Self {
            host: get("AGENTS_HOST").unwrap_or(defaults.host),
            port,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            mistral_ocr_api_key: get("MISTRAL_OCR_API_KEY"),
            default_locale: get("DEFAULT_LOCALE").unwrap_or(defaults.default_locale),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            graphiql_enabled,
            gateway_url: get("GATEWAY_URL").unwrap_or(defaults.gateway_url),
            notification_service_url: get("NOTIFICATION_SERVICE_URL")
                .unwrap_or(defaults.notification_service_url),
            service_jwt_secret: get("SERVICE_JWT_SECRET").unwrap_or(defaults.service_jwt_secret),
        })
    }

    /// Tracing level for `log_level`, or `None` when it is not a known level.
    pub fn tracing_level(&self) -> Option<Level> {
        match self.log_level.trim().to_uppercase().as_str() {
            "WARNING" => Some(Level::WARN),
            "CRITICAL" => Some(Level::ERROR),
            other => Level::from_str(other).ok(),
        }
    }

    /// Upstream integrations with a configured API key.
    pub fn integrations(&self) -> Vec<String> {
        let mut integrations = Vec::new();
        if self.gemini_api_key.is_some() {
            integrations.push("gemini".to_string());
        }
        if self.mistral_ocr_api_key.is_some() {
            integrations.push("mistral_ocr".to_string());
        }
        integrations
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
