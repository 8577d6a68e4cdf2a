//! One-sentence summaries with bounded, classified retries.
//!
//! [`Summarizer`] wraps any [`AskAsync`] backend and never returns an error:
//! every call ends in a [`SummaryOutcome`], which is either the model's
//! sentence or a failure marker that is written into the record as-is.
//!
//! # Retry Strategy
//!
//! - At most `max_attempts` calls per article (3 by default)
//! - Rate limits sleep `rate_limit_backoff` plus `0..=jitter` before retrying
//! - Safety blocks are final after the first call
//! - Other errors retry immediately until the last attempt

use crate::api::{AskAsync, SummarizeError};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Every failure marker starts with this, so consumers can filter them out.
pub const FAILURE_MARKER_PREFIX: &str = "summary unavailable: ";

/// Why no summary was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryFailure {
    CredentialMissing,
    NoTextExtracted,
    RateLimitExceeded,
    ContentSafetyBlocked,
    Backend(String),
}

impl fmt::Display for SummaryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFailure::CredentialMissing => f.write_str("credential missing"),
            SummaryFailure::NoTextExtracted => f.write_str("no text extracted"),
            SummaryFailure::RateLimitExceeded => f.write_str("rate limit exceeded"),
            SummaryFailure::ContentSafetyBlocked => f.write_str("content safety blocked"),
            SummaryFailure::Backend(detail) => write!(f, "backend error: {detail}"),
        }
    }
}

/// Result of summarizing one article.
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    Summary(String),
    Failed(SummaryFailure),
}

impl SummaryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SummaryOutcome::Failed(_))
    }
}

/// Renders the `summary_ai` field.
impl fmt::Display for SummaryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryOutcome::Summary(text) => f.write_str(text),
            SummaryOutcome::Failed(reason) => write!(f, "{FAILURE_MARKER_PREFIX}{reason}"),
        }
    }
}

/// Prompt and retry settings.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Language the summary sentence is written in.
    pub language: String,
    pub max_attempts: usize,
    pub rate_limit_backoff: Duration,
    /// Upper bound of the random extra delay added to each backoff.
    pub jitter: Duration,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            language: "Arabic".to_string(),
            max_attempts: 3,
            rate_limit_backoff: Duration::from_secs(20),
            jitter: Duration::from_millis(1000),
        }
    }
}

impl SummarizerConfig {
    fn prompt_for(&self, text: &str) -> String {
        format!(
            "Summarize this news article into exactly one professional {} sentence (media style). \
             Reply with the sentence only.\n\n{}",
            self.language, text
        )
    }

    fn backoff_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        self.rate_limit_backoff + Duration::from_millis(extra)
    }
}

/// Summarizes extracted article text through a completion backend.
///
/// A summarizer without a backend (no credential configured) still works:
/// it answers every call with the "credential missing" marker.
pub struct Summarizer<B> {
    backend: Option<B>,
    config: SummarizerConfig,
}

impl<B> fmt::Debug for Summarizer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("configured", &self.backend.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<B> Summarizer<B> {
    #[cfg(test)]
    pub(crate) fn backend_ref(&self) -> Option<&B> {
        self.backend.as_ref()
    }
}

impl<B> Summarizer<B>
where
    B: AskAsync,
{
    /// Create a summarizer that calls `backend`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The completion client, usually a [`ChatCompletionsClient`](crate::api::ChatCompletionsClient)
    /// * `config` - Output language, attempt limit and rate-limit backoff
    pub fn new(backend: B, config: SummarizerConfig) -> Self {
        Self {
            backend: Some(backend),
            config,
        }
    }

    /// A summarizer with no credential; no network calls are ever made.
    pub fn unconfigured(config: SummarizerConfig) -> Self {
        Self {
            backend: None,
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Summarize `text`, where `None` means extraction found nothing.
    ///
    /// # Arguments
    ///
    /// * `text` - Extracted article text, already cut to the character budget
    ///
    /// # Returns
    ///
    /// A one-sentence summary, or the failure that replaced it. Missing
    /// credentials and missing text return at once without calling the
    /// backend. A safety block is never retried; rate limits wait
    /// `rate_limit_backoff` plus jitter before the next attempt.
    #[instrument(level = "info", skip_all)]
    pub async fn summarize(&self, text: Option<&str>) -> SummaryOutcome {
        let Some(backend) = &self.backend else {
            return SummaryOutcome::Failed(SummaryFailure::CredentialMissing);
        };
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return SummaryOutcome::Failed(SummaryFailure::NoTextExtracted);
        };

        let prompt = self.config.prompt_for(text);
        let max_attempts = self.config.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let err = match backend.ask(&prompt).await {
                Ok(reply) => {
                    info!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Summary produced"
                    );
                    return SummaryOutcome::Summary(reply.trim().to_string());
                }
                Err(e) => e,
            };

            let last = attempt >= max_attempts;
            match err {
                SummarizeError::SafetyBlocked(detail) => {
                    warn!(attempt, %detail, "Content safety block; not retrying");
                    return SummaryOutcome::Failed(SummaryFailure::ContentSafetyBlocked);
                }
                SummarizeError::RateLimited(detail) if last => {
                    error!(attempt, max = max_attempts, %detail, "Still rate limited; giving up");
                    return SummaryOutcome::Failed(SummaryFailure::RateLimitExceeded);
                }
                SummarizeError::RateLimited(detail) => {
                    let delay = self.config.backoff_delay();
                    warn!(attempt, max = max_attempts, ?delay, %detail, "Rate limited; backing off");
                    sleep(delay).await;
                }
                SummarizeError::Other(detail) if last => {
                    error!(attempt, max = max_attempts, %detail, "Summarization exhausted retries");
                    return SummaryOutcome::Failed(SummaryFailure::Backend(detail));
                }
                SummarizeError::Other(detail) => {
                    warn!(attempt, max = max_attempts, %detail, "Summarization attempt failed; retrying");
                }
            }
        }
    }
}
