//! LLM API interaction and failure classification.
//!
//! - [`AskAsync`]: the seam between the summarizer and any completion backend
//! - [`ChatCompletionsClient`]: an OpenAI-compatible `/chat/completions` client
//! - [`SummarizeError`]: backend failures sorted into rate-limit,
//!   safety-block and everything else
//!
//! Classification reads structured signals first: the HTTP status, the
//! `error.code` / `error.type` fields of the error body, and the
//! `finish_reason` of a returned choice. Only when none of those is present
//! does [`SummarizeError::from_message`] fall back to substring matching on
//! the free-form text. That fallback is a heuristic and may misfile errors
//! from providers with unusual wording.

use crate::utils::truncate_for_log;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Error codes and types that mean "slow down".
const RATE_LIMIT_CODES: &[&str] = &["rate_limit_exceeded", "insufficient_quota", "resource_exhausted"];

/// Error codes, types and finish reasons that mean the output was withheld.
const SAFETY_CODES: &[&str] = &["content_filter", "content_policy_violation", "safety"];

/// A failed completion call, already classified.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SummarizeError {
    /// The backend asked us to slow down (HTTP 429 or equivalent).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The backend withheld its output for policy reasons. Retrying the same
    /// input will not help.
    #[error("content safety blocked: {0}")]
    SafetyBlocked(String),

    /// Anything else: transport errors, 5xx, malformed or empty responses.
    #[error("{0}")]
    Other(String),
}

impl SummarizeError {
    /// Classify an error from its text alone.
    ///
    /// Fallback heuristic for when the backend gives no structured signal.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("rate limit")
            || lower.contains("resource_exhausted")
        {
            SummarizeError::RateLimited(message)
        } else if lower.contains("safety")
            || lower.contains("content_filter")
            || lower.contains("finish_reason")
        {
            SummarizeError::SafetyBlocked(message)
        } else {
            SummarizeError::Other(message)
        }
    }
}

/// Async text completion.
///
/// Implementors send a prompt to a language model and return its raw reply.
/// Failures must come back already classified so the caller can decide
/// whether to retry.
pub trait AskAsync {
    /// Send one prompt and wait for the model's reply.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The complete prompt, instructions and article text included
    ///
    /// # Returns
    ///
    /// The reply text, or a [`SummarizeError`] telling a rate limit or a
    /// safety block apart from any other failure.
    async fn ask(&self, prompt: &str) -> Result<String, SummarizeError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    // Some providers send a string, others a number
    code: Option<serde_json::Value>,
    status: Option<String>,
}

impl ApiErrorDetail {
    fn signals(&self) -> Vec<String> {
        let code = self.code.as_ref().map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        [code, self.kind.clone(), self.status.clone()]
            .into_iter()
            .flatten()
            .map(|s| s.to_lowercase())
            .collect()
    }
}

/// Classify a non-success HTTP response.
pub(crate) fn classify_http_error(status: StatusCode, body: &str) -> SummarizeError {
    let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| truncate_for_log(body.trim(), 200));
    let message = format!("HTTP {}: {}", status.as_u16(), message);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return SummarizeError::RateLimited(message);
    }

    match detail {
        Some(detail) => {
            let signals = detail.signals();
            if signals.iter().any(|s| RATE_LIMIT_CODES.contains(&s.as_str())) {
                SummarizeError::RateLimited(message)
            } else if signals.iter().any(|s| SAFETY_CODES.contains(&s.as_str())) {
                SummarizeError::SafetyBlocked(message)
            } else {
                SummarizeError::Other(message)
            }
        }
        None => SummarizeError::from_message(message),
    }
}

/// Pull the reply text out of a successful completion response.
fn completion_text(response: ChatResponse) -> Result<String, SummarizeError> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(SummarizeError::Other("response contained no choices".to_string()));
    };

    if let Some(reason) = choice.finish_reason.as_deref() {
        if SAFETY_CODES.contains(&reason.to_lowercase().as_str()) {
            return Err(SummarizeError::SafetyBlocked(format!("finish_reason={reason}")));
        }
    }

    match choice.message.and_then(|m| m.content) {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(SummarizeError::Other("empty completion".to_string())),
    }
}

/// Settings for [`ChatCompletionsClient`].
#[derive(Debug, Clone)]
pub struct ChatBackendConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
///
/// Holds its own credential and HTTP client; nothing is read from process
/// state after construction.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsClient {
    /// Create a client for `{api_base}/chat/completions`.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, credential, model and request timeout
    ///
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be built.
    pub fn new(config: ChatBackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let endpoint = format!("{}/chat/completions", config.api_base.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
            model: config.model,
        })
    }
}

impl AskAsync for ChatCompletionsClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, SummarizeError> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizeError::Other(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SummarizeError::Other(format!("failed reading response body: {e}")))?;
        let dt = t0.elapsed();

        if !status.is_success() {
            let err = classify_http_error(status, &body);
            warn!(elapsed_ms = dt.as_millis() as u64, %status, error = %err, "API call failed");
            return Err(err);
        }

        debug!(elapsed_ms = dt.as_millis() as u64, bytes = body.len(), "API call succeeded");
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            SummarizeError::Other(format!(
                "malformed response ({e}): {}",
                truncate_for_log(&body, 200)
            ))
        })?;
        completion_text(parsed)
    }
}
