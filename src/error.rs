//! Error types for the agents service

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Service Errors
    // =============================

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("GraphQL errors: {0}")]
    Graphql(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Failures caused by (or surfaced at) an upstream dependency.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Upstream { .. } | Self::Graphql(_) | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        let upstream = OrchestrationError::Upstream {
            service: "gateway",
            status: 500,
            body: "boom".to_string(),
        };
        assert!(upstream.is_upstream());
        assert_eq!(upstream.to_string(), "gateway returned 500: boom");

        assert!(OrchestrationError::Config("missing key".into()).is_upstream());
        assert!(!OrchestrationError::Validation("empty".into()).is_upstream());
    }
}
