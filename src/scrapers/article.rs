//! Article body extraction.
//!
//! Downloads an article page and pulls out its readable text with
//! `dom_smoothie` (a port of Mozilla Readability). When readability finds
//! nothing, the text of every `<p>` element is used instead. The result is
//! whitespace-normalized and cut to a fixed character budget so prompts stay
//! small.
//!
//! Paywalls, script-only pages and blocked requests are ordinary here: they
//! produce `None`, never an error.

use crate::utils::{collapse_whitespace, truncate_chars};
use dom_smoothie::{Config, Readability};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Something that can turn an article URL into plain text.
///
/// `None` means no text could be found; it is not an error.
pub trait ArticleExtractor {
    /// Download `url` and return its readable text, if any.
    async fn extract(&self, url: &str) -> Option<String>;
}

/// Downloads pages over HTTP and runs readability extraction on them.
#[derive(Debug, Clone)]
pub struct ReadabilityExtractor {
    client: reqwest::Client,
    max_chars: usize,
}

impl ReadabilityExtractor {
    pub fn new(client: reqwest::Client, max_chars: usize) -> Self {
        Self { client, max_chars }
    }

    async fn download(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}").into());
        }
        Ok(response.text().await?)
    }
}

impl ArticleExtractor for ReadabilityExtractor {
    #[instrument(level = "info", skip(self))]
    async fn extract(&self, url: &str) -> Option<String> {
        let html = match self.download(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Article download failed");
                return None;
            }
        };

        let text = extract_text(&html, url, self.max_chars);
        match &text {
            Some(t) => info!(chars = t.chars().count(), "Extracted article text"),
            None => warn!(bytes = html.len(), "No readable text in article"),
        }
        text
    }
}

/// Extract at most `max_chars` characters of body text from `html`.
pub(crate) fn extract_text(html: &str, url: &str, max_chars: usize) -> Option<String> {
    let text = readability_text(html, url).or_else(|| {
        debug!("Readability found nothing; falling back to paragraphs");
        paragraph_text(html)
    })?;

    let text = truncate_chars(&text, max_chars).trim_end();
    (!text.is_empty()).then(|| text.to_string())
}

fn readability_text(html: &str, url: &str) -> Option<String> {
    let cfg = Config {
        max_elements_to_parse: 9000,
        ..Default::default()
    };
    let mut readability = Readability::new(html, Some(url), Some(cfg)).ok()?;
    let article = readability.parse().ok()?;
    let text = collapse_whitespace(&article.text_content);
    (!text.is_empty()).then_some(text)
}

fn paragraph_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text = document
        .select(&PARAGRAPH)
        .map(|p| collapse_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}
