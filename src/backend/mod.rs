//! Backend Gateway
//!
//! The request/response contract with the language-model service and the
//! taxonomy of failures the assistant apologizes for.

pub mod http;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::conversation::Utterance;
use crate::i18n::{Language, Message};

pub use http::HttpGateway;
pub use ollama::OllamaGateway;

/// Marker the backend uses when its credentials are missing
const MISSING_KEY_MARKER: &str = "API key not configured";

/// Request sent for one finalized command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Utterance>,
    pub language: Language,
}

/// Successful reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Why a command produced no reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("no network connectivity")]
    Offline,

    #[error("backend not configured: {0}")]
    Configuration(String),

    #[error("rate limited by backend")]
    RateLimited,

    #[error("backend failure (status {status})")]
    Service { status: u16 },

    #[error("unusable backend response: {0}")]
    MalformedResponse(String),

    #[error("request failed: {0}")]
    Network(String),
}

impl BackendError {
    /// Catalog entry spoken in place of a reply
    pub fn apology(&self) -> Message {
        match self {
            BackendError::Offline => Message::ApologyOffline,
            BackendError::Configuration(_) => Message::ApologyConfiguration,
            BackendError::RateLimited => Message::ApologyRateLimited,
            BackendError::Service { .. } => Message::ApologyService,
            BackendError::MalformedResponse(_) => Message::ApologyMalformed,
            BackendError::Network(_) => Message::ApologyNetwork,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    response: Option<serde_json::Value>,
    error: Option<String>,
}

/// Classify a non-2xx response
pub fn classify_failure(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| format!("API request failed: {status}"));

    if message.contains(MISSING_KEY_MARKER) {
        return BackendError::Configuration(message);
    }
    match status {
        429 => BackendError::RateLimited,
        500..=599 => BackendError::Service { status },
        _ => BackendError::MalformedResponse(message),
    }
}

/// Parse a 2xx response body
pub fn parse_reply(body: &str) -> Result<ChatReply, BackendError> {
    let parsed: ReplyBody = serde_json::from_str(body)
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(BackendError::MalformedResponse(error));
    }
    match parsed.response {
        Some(serde_json::Value::String(text)) if !text.trim().is_empty() => {
            Ok(ChatReply { response: text })
        }
        _ => Err(BackendError::MalformedResponse(
            "Invalid response format from AI service".to_string(),
        )),
    }
}

/// Trait for language-model backends
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Send one command and wait for the reply
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, BackendError>;

    /// Whether the backend is reachable
    async fn health_check(&self) -> bool {
        true
    }

    /// Get the gateway name
    fn name(&self) -> &str;
}

/// Factory to create the configured gateway
pub fn create_gateway(config: &Config) -> Arc<dyn BackendGateway> {
    let gateway: Arc<dyn BackendGateway> = match config.backend.as_str() {
        "ollama" => Arc::new(OllamaGateway::new(config)),
        _ => Arc::new(HttpGateway::new(config)),
    };
    info!("🧠 Backend gateway: {}", gateway.name());
    gateway
}
