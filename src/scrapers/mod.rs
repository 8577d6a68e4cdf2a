//! Network-facing readers: feeds in, article text out.
//!
//! | Reader | Module | Library | Failure signal |
//! |--------|--------|---------|----------------|
//! | Feed entries | [`feed`] | `feed-rs` | empty list, source skipped |
//! | Article body | [`article`] | `dom_smoothie`, `scraper` fallback | `None` |
//!
//! Both readers share one HTTP client identity. Many news sites reject
//! requests that do not look like a browser, so the client sends a desktop
//! browser user agent and the matching `Accept` headers.
//!
//! Neither reader returns errors to its caller. Failures are logged here and
//! turned into "nothing for this source" or "no text for this article".

pub mod article;
pub mod feed;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP identity and limits shared by the feed and article readers.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Build the browser-like HTTP client used by all readers.
pub fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,ar;q=0.8"));

    reqwest::Client::builder()
        .user_agent(&settings.user_agent)
        .default_headers(headers)
        .timeout(settings.timeout)
        .build()
}
