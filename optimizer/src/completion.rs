//! Completion-service abstraction and HTTP implementation.
//!
//! The search engine only depends on the request/response contract in
//! [`CompletionService`]; the production implementation speaks the
//! OpenAI-compatible `/chat/completions` shape but tolerates several
//! provider response schemas.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::OptimizerConfig;
use crate::prompts::PROBE_PROMPT;

/// Errors from a single completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API key required")]
    MissingApiKey,

    #[error("API {code}: {body}")]
    Status { code: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unrecognized response: {0}")]
    UnrecognizedResponse(String),
}

impl CompletionError {
    /// Whether a retry could plausibly succeed. Rate limiting and upstream
    /// 5xx hiccups are transient; everything else is terminal for the call.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Status { code, .. } => matches!(code, 429 | 500 | 502 | 503),
            CompletionError::Timeout | CompletionError::Transport(_) => true,
            _ => false,
        }
    }
}

/// Text-completion service contract: one prompt in, generated text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// OpenAI-compatible HTTP completion client.
pub struct HttpCompletionService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpCompletionService {
    /// Build a client from the run configuration. Fails fast when the API
    /// key is missing; the per-request timeout comes from the config.
    pub fn new(config: &OptimizerConfig) -> Result<Self, CompletionError> {
        if config.api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.thinking_model.clone(),
        })
    }

    /// Pull generated text out of any of the response shapes providers use.
    fn extract_text(value: &Value) -> Option<String> {
        let candidates = [
            value.pointer("/choices/0/message/content"),
            value.pointer("/choices/0/text"),
            value.get("output"),
            value.get("content"),
            value.get("response"),
        ];

        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        None
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.7,
            "max_tokens": 4096,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "https://openwebui.com/")
            .header("X-Title", "MCTS Optimizer")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                code: status.as_u16(),
                body: clip(&body, 200),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|_| CompletionError::UnrecognizedResponse(clip(&body, 200)))?;

        Self::extract_text(&value).ok_or_else(|| CompletionError::UnrecognizedResponse(clip(&body, 200)))
    }
}

/// Run one logical completion call with retries.
///
/// Retryable failures back off `2^attempt + random(0,1)` seconds between
/// attempts; terminal failures return immediately. Exhausting `max_retries`
/// surfaces the last error.
pub async fn complete_with_retries(
    service: &dyn CompletionService,
    prompt: &str,
    max_retries: u32,
) -> Result<String, CompletionError> {
    let mut last_error = CompletionError::Transport("no attempts were made".to_string());

    for attempt in 0..max_retries.max(1) {
        match service.complete(prompt).await {
            Ok(text) => {
                debug!(attempt, chars = text.len(), "completion call succeeded");
                return Ok(text);
            }
            Err(err) if err.is_retryable() => {
                warn!(attempt, error = %err, "completion call failed");
                last_error = err;
                if attempt + 1 < max_retries {
                    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
                    let delay = f64::from(2u32.saturating_pow(attempt)) + jitter;
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error)
}

/// Connectivity check run during validation, before any search work starts.
pub(crate) async fn probe(service: &dyn CompletionService) -> Result<(), CompletionError> {
    service.complete(PROBE_PROMPT).await.map(|_| ())
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
