//! LLM gateway: the boundary around the external generative-AI call.
//!
//! Everything above this module talks to `dyn LlmGateway`; only
//! `GeminiGateway` knows about HTTP.

pub mod gemini;
pub mod usage;

use std::sync::Mutex;

use thiserror::Error;

pub use gemini::{GeminiGateway, EMPTY_RESPONSE_MESSAGE};
pub use usage::{word_count, UsageSnapshot, UsageStats};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("API key not configured: set the {0} environment variable")]
    MissingCredential(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM API returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl GatewayError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Single-prompt text generation.
pub trait LlmGateway: Send + Sync {
    /// Send `prompt` as the sole input and return the trimmed response text.
    fn call(&self, prompt: &str) -> Result<String, GatewayError>;

    fn model_name(&self) -> &str;
}

type Responder = Box<dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync>;

/// Mock gateway for testing. Answers from a closure and records prompts.
pub struct MockGateway {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl MockGateway {
    /// Always answers `response`.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Always fails with `error`.
    pub fn failing(error: GatewayError) -> Self {
        Self::from_fn(move |_| Err(error.clone()))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl LlmGateway for MockGateway {
    fn call(&self, prompt: &str) -> Result<String, GatewayError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        (self.responder)(prompt)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
