//! FinWise agents service
//!
//! Composes a language model, an OCR provider, a GraphQL data gateway and a
//! notification service into fixed financial workflows, served over REST and
//! GraphQL.
//!
//! WORKFLOW SHAPE:
//! FETCH → PROMPT → MODEL → PARSE? → WRITE BACK? → NOTIFY

pub mod agent;
pub mod api;
pub mod config;
pub mod conversational;
pub mod error;
pub mod extraction;
pub mod fallback;
pub mod gateway;
pub mod gemini;
pub mod graphql;
#[cfg(test)]
mod mock;
pub mod models;
pub mod notifier;
pub mod ocr;

pub use error::Result;

// Re-export common types
pub use agent::{Orchestrator, Services};
pub use config::Settings;
pub use error::OrchestrationError;
pub use models::*;
