//! RSS and Atom feed reader.
//!
//! Fetches one feed URL and turns its first few entries into
//! [`CandidateEntry`] values. Anything that goes wrong with a source (bad
//! status, tiny body, unparseable XML, no entries) is logged and the source
//! yields no entries; the caller moves on to the next one.

use crate::models::CandidateEntry;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Fallback for feeds without a title.
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Fallback for entries without a title.
pub const UNTITLED: &str = "(untitled)";

/// Why a source produced no entries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("body too small ({bytes} bytes, need at least {min}); likely blocked")]
    BodyTooSmall { bytes: usize, min: usize },

    #[error("feed parse error: {0}")]
    Parse(#[from] ParseFeedError),

    #[error("feed contains no entries")]
    NoEntries,
}

/// Something that can list the entries of one feed.
///
/// Implementations swallow their own failures and return an empty list.
pub trait FeedSource {
    /// Read the first entries of the feed at `url`.
    ///
    /// # Arguments
    ///
    /// * `category` - Category label copied onto every entry
    /// * `url` - Feed URL
    ///
    /// # Returns
    ///
    /// Entries in feed order, or an empty list if the source failed.
    async fn fetch(&self, category: &str, url: &str) -> Vec<CandidateEntry>;
}

/// Reads feeds over HTTP and parses them with `feed-rs`.
#[derive(Debug, Clone)]
pub struct FeedReader {
    client: reqwest::Client,
    /// Only the first `max_entries` entries of each feed are considered.
    max_entries: usize,
    /// Bodies shorter than this are treated as a block page or outage.
    min_body_bytes: usize,
}

impl FeedReader {
    pub fn new(client: reqwest::Client, max_entries: usize, min_body_bytes: usize) -> Self {
        Self {
            client,
            max_entries,
            min_body_bytes,
        }
    }

    async fn try_fetch(&self, category: &str, url: &str) -> Result<Vec<CandidateEntry>, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        if body.len() < self.min_body_bytes {
            return Err(FeedError::BodyTooSmall {
                bytes: body.len(),
                min: self.min_body_bytes,
            });
        }
        debug!(bytes = body.len(), "Downloaded feed");

        entries_from_bytes(&body, category, self.max_entries, Utc::now())
    }
}

impl FeedSource for FeedReader {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, category: &str, url: &str) -> Vec<CandidateEntry> {
        match self.try_fetch(category, url).await {
            Ok(entries) => {
                info!(count = entries.len(), "Read feed entries");
                entries
            }
            Err(e) => {
                warn!(error = %e, "Skipping source");
                Vec::new()
            }
        }
    }
}

/// Parse raw feed bytes into at most `limit` candidate entries.
///
/// `now` stands in for entries that carry no publish or update time.
pub(crate) fn entries_from_bytes(
    bytes: &[u8],
    category: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateEntry>, FeedError> {
    let feed = parser::parse(bytes)?;
    if feed.entries.is_empty() {
        return Err(FeedError::NoEntries);
    }

    let source = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let entries = feed
        .entries
        .into_iter()
        .take(limit)
        .filter_map(|entry| {
            let Some(link) = select_entry_link(&entry) else {
                debug!(entry_id = %entry.id, "Entry has no usable link; skipping");
                return None;
            };
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            Some(CandidateEntry {
                id: link.clone(),
                title,
                link,
                published: entry.published.or(entry.updated).unwrap_or(now),
                category: category.to_string(),
                source: source.clone(),
            })
        })
        .unique_by(|e| e.id.clone())
        .collect();

    Ok(entries)
}

/// Pick the article URL for an entry.
///
/// Prefers an `alternate` (or rel-less) link, then any link, then an entry id
/// that is itself an http(s) URL.
fn select_entry_link(entry: &Entry) -> Option<String> {
    let non_empty = || entry.links.iter().filter(|l| !l.href.trim().is_empty());

    let alternate = non_empty().find(|l| {
        l.rel
            .as_deref()
            .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| non_empty().next()) {
        return Some(link.href.trim().to_string());
    }

    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{FetchSettings, build_client, canned};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Arab News</title>
    <link>https://www.arabnews.com</link>
    <description>Latest</description>
    <item>
      <title>First story</title>
      <link>https://www.arabnews.com/node/1</link>
      <pubDate>Tue, 06 May 2025 09:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://www.arabnews.com/node/2</link>
    </item>
    <item>
      <title>Third story</title>
      <link>https://www.arabnews.com/node/3</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_entries_capped_and_ordered() {
        let entries = entries_from_bytes(RSS.as_bytes(), "saudi_general", 2, now()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "https://www.arabnews.com/node/1");
        assert_eq!(entries[0].link, entries[0].id);
        assert_eq!(entries[0].title, "First story");
        assert_eq!(entries[0].source, "Arab News");
        assert_eq!(entries[0].category, "saudi_general");
        assert_eq!(
            entries[0].published,
            Utc.with_ymd_and_hms(2025, 5, 6, 9, 30, 0).unwrap()
        );
        assert_eq!(entries[1].id, "https://www.arabnews.com/node/2");
    }

    #[test]
    fn test_missing_publish_date_falls_back_to_now() {
        let entries = entries_from_bytes(RSS.as_bytes(), "saudi_general", 2, now()).unwrap();
        assert_eq!(entries[1].published, now());
    }

    #[test]
    fn test_entry_without_link_is_skipped_individually() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Gazette</title>
  <item><title>No link here</title></item>
  <item><title>Linked</title><link>https://saudigazette.com.sa/article/9</link></item>
</channel></rss>"#;
        let entries = entries_from_bytes(rss.as_bytes(), "saudi_general", 2, now()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Linked");
    }

    #[test]
    fn test_repeated_link_within_feed_is_dropped() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Echo</title>
  <item><title>One</title><link>https://example.com/a</link></item>
  <item><title>One again</title><link>https://example.com/a</link></item>
</channel></rss>"#;
        let entries = entries_from_bytes(rss.as_bytes(), "c", 5, now()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "One");
    }

    #[test]
    fn test_atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>The Verge</title>
  <id>urn:verge</id>
  <updated>2025-05-06T10:00:00Z</updated>
  <entry>
    <title>Gadget</title>
    <id>urn:entry:1</id>
    <updated>2025-05-06T08:00:00Z</updated>
    <link rel="enclosure" href="https://cdn.example.com/img.jpg"/>
    <link rel="alternate" href="https://www.theverge.com/gadget"/>
  </entry>
</feed>"#;
        let entries = entries_from_bytes(atom.as_bytes(), "global_tech", 2, now()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://www.theverge.com/gadget");
        assert_eq!(entries[0].source, "The Verge");
        assert_eq!(
            entries[0].published,
            Utc.with_ymd_and_hms(2025, 5, 6, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_feed_without_title_uses_unknown_source() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><title>T</title><link>https://example.com/x</link></item>
</channel></rss>"#;
        let entries = entries_from_bytes(rss.as_bytes(), "c", 2, now()).unwrap();
        assert_eq!(entries[0].source, UNKNOWN_SOURCE);
    }

    #[test]
    fn test_empty_feed_is_an_error() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        let err = entries_from_bytes(rss.as_bytes(), "c", 2, now()).unwrap_err();
        assert!(matches!(err, FeedError::NoEntries));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let err = entries_from_bytes(b"<html>Access denied</html>", "c", 2, now()).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_nothing() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let reader = FeedReader::new(client, 2, 200);
        // Port 9 on localhost: nothing listens there
        let entries = reader.fetch("c", "http://127.0.0.1:9/feed.xml").await;
        assert!(entries.is_empty());
    }

    fn test_client() -> reqwest::Client {
        build_client(&FetchSettings {
            timeout: std::time::Duration::from_secs(5),
            ..FetchSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_small_body_skips_source() {
        let url = canned::serve("200 OK", "application/rss+xml", "<rss/>".to_string()).await;
        let reader = FeedReader::new(test_client(), 2, 200);
        assert!(reader.fetch("c", &format!("{url}/feed.xml")).await.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_skips_source() {
        let url = canned::serve("403 Forbidden", "application/rss+xml", RSS.to_string()).await;
        let reader = FeedReader::new(test_client(), 2, 200);
        assert!(reader.fetch("c", &format!("{url}/feed.xml")).await.is_empty());
    }

    #[tokio::test]
    async fn test_served_feed_yields_entries() {
        assert!(RSS.len() > 200);
        let url = canned::serve("200 OK", "application/rss+xml", RSS.to_string()).await;
        let reader = FeedReader::new(test_client(), 2, 200);
        let entries = reader.fetch("saudi_general", &format!("{url}/feed.xml")).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://www.arabnews.com/node/1");
        assert_eq!(entries[0].category, "saudi_general");
    }
}
