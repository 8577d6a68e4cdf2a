//! Command-line interface definitions for News Digest.
//!
//! Every option has a default, and the credential-related ones can also be
//! provided through environment variables.

use crate::api::ChatBackendConfig;
use crate::pipeline::PipelineSettings;
use crate::scrapers::{BROWSER_USER_AGENT, FetchSettings};
use crate::summarizer::SummarizerConfig;
use clap::Parser;
use std::time::Duration;

/// Command-line arguments for one aggregation run.
///
/// # Examples
///
/// ```sh
/// # Default feeds, archive under ./archive, no summaries (no key)
/// news_digest
///
/// # Custom feeds and a key from the environment
/// SUMMARIZER_API_KEY=sk-... news_digest -s sources.yaml -a /srv/news/archive
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Archive directory holding <YYYY-MM-DD>/records.json and latest.json
    #[arg(short, long, default_value = "archive")]
    pub archive_dir: String,

    /// YAML file listing categories and their feed URLs (built-in list if omitted)
    #[arg(short, long)]
    pub sources: Option<String>,

    /// Days of past archives consulted for deduplication
    #[arg(long, default_value_t = 3)]
    pub lookback_days: u32,

    /// Entries taken from the top of each feed
    #[arg(long, default_value_t = 2)]
    pub entries_per_source: usize,

    /// Character budget for extracted article text
    #[arg(long, default_value_t = 2000)]
    pub max_text_chars: usize,

    /// Feed bodies smaller than this many bytes are treated as blocked
    #[arg(long, default_value_t = 200)]
    pub min_feed_bytes: usize,

    /// HTTP timeout in seconds for feeds, articles and the summarizer
    #[arg(long, default_value_t = 20)]
    pub timeout_secs: u64,

    /// Pause between processed articles, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub politeness_delay_ms: u64,

    /// User agent sent to feeds and article pages
    #[arg(long, default_value = BROWSER_USER_AGENT)]
    pub user_agent: String,

    /// API key for the summarization backend; summaries are skipped without it
    #[arg(long, env = "SUMMARIZER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "SUMMARIZER_API_BASE", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    /// Model used for summaries
    #[arg(long, env = "SUMMARIZER_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Language the one-sentence summary is written in
    #[arg(long, default_value = "Arabic")]
    pub language: String,

    /// Maximum summarization attempts per article
    #[arg(long, default_value_t = 3)]
    pub max_attempts: usize,

    /// Wait after a rate-limit response, in seconds
    #[arg(long, default_value_t = 20)]
    pub rate_limit_backoff_secs: u64,
}

impl Cli {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            lookback_days: self.lookback_days,
            politeness_delay: Duration::from_millis(self.politeness_delay_ms),
        }
    }

    pub fn summarizer_config(&self) -> SummarizerConfig {
        SummarizerConfig {
            language: self.language.clone(),
            max_attempts: self.max_attempts,
            rate_limit_backoff: Duration::from_secs(self.rate_limit_backoff_secs),
            ..SummarizerConfig::default()
        }
    }

    /// Backend settings, or `None` when no (non-blank) API key was given.
    pub fn backend_config(&self) -> Option<ChatBackendConfig> {
        let api_key = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(ChatBackendConfig {
            api_base: self.api_base.clone(),
            api_key: api_key.to_string(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["news_digest", "--api-key", ""]);

        assert_eq!(cli.archive_dir, "archive");
        assert_eq!(cli.sources, None);
        assert_eq!(cli.lookback_days, 3);
        assert_eq!(cli.entries_per_source, 2);
        assert_eq!(cli.max_text_chars, 2000);
        assert_eq!(cli.pipeline_settings().politeness_delay, Duration::from_secs(1));
        assert_eq!(cli.summarizer_config().max_attempts, 3);
        assert_eq!(
            cli.summarizer_config().rate_limit_backoff,
            Duration::from_secs(20)
        );
        assert_eq!(cli.fetch_settings().user_agent, BROWSER_USER_AGENT);
        // Blank key counts as no key
        assert!(cli.backend_config().is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "news_digest",
            "-a",
            "/tmp/archive",
            "-s",
            "/tmp/sources.yaml",
        ]);

        assert_eq!(cli.archive_dir, "/tmp/archive");
        assert_eq!(cli.sources.as_deref(), Some("/tmp/sources.yaml"));
    }

    #[test]
    fn test_backend_config_from_flags() {
        let cli = Cli::parse_from([
            "news_digest",
            "--api-key",
            " sk-test ",
            "--api-base",
            "http://localhost:11434/v1",
            "--model",
            "llama3",
            "--timeout-secs",
            "5",
        ]);

        let backend = cli.backend_config().unwrap();
        assert_eq!(backend.api_key, "sk-test");
        assert_eq!(backend.api_base, "http://localhost:11434/v1");
        assert_eq!(backend.model, "llama3");
        assert_eq!(backend.timeout, Duration::from_secs(5));
    }
}
