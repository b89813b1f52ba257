use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{GatewayError, LlmGateway};
use crate::config::ApiConfig;

/// Returned instead of an error when the model answers with no text.
pub const EMPTY_RESPONSE_MESSAGE: &str = "The model returned an empty response. Please try again.";

/// Base delay between retries; doubled on every attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;
/// Longest wait between two attempts.
const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Gemini `generateContent` client.
pub struct GeminiGateway {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    max_retries: u32,
}

impl GeminiGateway {
    pub fn new(api_key: impl Into<String>, config: &ApiConfig) -> Result<Self, GatewayError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    /// Resolve the API key from the environment variable named in `config`.
    /// Fails here, at construction, rather than on the first call.
    pub fn from_env(config: &ApiConfig) -> Result<Self, GatewayError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingCredential(config.api_key_env.clone()))?;
        Self::new(api_key, config)
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn generate_once(&self, prompt: &str) -> Result<String, GatewayError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout_secs)
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GatewayError::ResponseParsing(e.to_string()))?;

        Ok(response_text(parsed))
    }
}

impl LlmGateway for GeminiGateway {
    fn call(&self, prompt: &str) -> Result<String, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.generate_once(prompt) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = retry_delay_ms(attempt);
                    tracing::warn!(
                        model = %self.model,
                        attempt = attempt + 1,
                        delay_ms = delay,
                        error = %e,
                        "Gemini call failed, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(delay));
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(model = %self.model, error = %e, "Gemini call failed");
                    return Err(e);
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Exponential backoff, saturating at `RETRY_MAX_DELAY_MS`.
fn retry_delay_ms(attempt: u32) -> u64 {
    2u64.checked_pow(attempt)
        .and_then(|factor| RETRY_BASE_DELAY_MS.checked_mul(factor))
        .map_or(RETRY_MAX_DELAY_MS, |delay| delay.min(RETRY_MAX_DELAY_MS))
}

/// Request body for `generateContent`
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Response body from `generateContent`
#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Text of the first candidate, trimmed; the empty-response sentinel if none.
fn response_text(response: GenerateResponse) -> String {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let trimmed = text.trim();
    if trimmed.is_empty() {
        EMPTY_RESPONSE_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}
