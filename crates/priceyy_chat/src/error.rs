//! Error types for the chat system.

use thiserror::Error;

/// One failed attempt against a candidate model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAttempt {
    pub model: String,
    pub error: String,
}

/// Chat system errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("LLM not configured. Set OPENROUTER_API_KEY or add apiKey to .priceyy/settings.json")]
    LlmNotConfigured,

    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("All {} candidate models failed: {}", .attempts.len(), format_attempts(.attempts))]
    AllModelsFailed { attempts: Vec<ModelAttempt> },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Round cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pricing error: {0}")]
    Pricing(#[from] priceyy_pricing::PricingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// HTTP 429 from the model router.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

fn format_attempts(attempts: &[ModelAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.model, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;
