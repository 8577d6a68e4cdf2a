//! Feed source configuration.
//!
//! Sources are an ordered list of categories, each with an ordered list of
//! feed URLs. Order matters: it fixes the order of records in the output.
//!
//! ```yaml
//! - category: saudi_general
//!   feeds:
//!     - https://www.arabnews.com/cat/1/rss.xml
//!     - https://saudigazette.com.sa/rssFeed/74
//! - category: global_tech
//!   feeds:
//!     - https://www.theverge.com/rss/index.xml
//! ```

use serde::Deserialize;
use std::error::Error;
use tracing::{info, instrument, warn};
use url::Url;

/// One category and the feeds that belong to it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
    pub category: String,
    pub feeds: Vec<String>,
}

/// Feeds used when no sources file is given.
pub fn default_sources() -> Vec<Source> {
    vec![
        Source {
            category: "saudi_general".to_string(),
            feeds: vec![
                "https://www.arabnews.com/cat/1/rss.xml".to_string(),
                "https://saudigazette.com.sa/rssFeed/74".to_string(),
            ],
        },
        Source {
            category: "saudi_business_tech".to_string(),
            feeds: vec!["https://saudigazette.com.sa/rssFeed/72".to_string()],
        },
        Source {
            category: "global_tech".to_string(),
            feeds: vec![
                "https://www.theverge.com/rss/index.xml".to_string(),
                "https://www.wired.com/feed/rss".to_string(),
            ],
        },
    ]
}

/// Parse sources from YAML and drop feed URLs that are not valid http(s).
pub fn parse_sources(yaml: &str) -> Result<Vec<Source>, serde_yaml::Error> {
    let sources: Vec<Source> = serde_yaml::from_str(yaml)?;
    Ok(sources.into_iter().map(validated).collect())
}

/// Load sources from `path`, or fall back to [`default_sources`].
#[instrument(level = "info")]
pub async fn load_sources(path: Option<&str>) -> Result<Vec<Source>, Box<dyn Error>> {
    let sources = match path {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(path).await?;
            parse_sources(&yaml)?
        }
        None => default_sources(),
    };

    let feed_count: usize = sources.iter().map(|s| s.feeds.len()).sum();
    info!(categories = sources.len(), feeds = feed_count, "Loaded sources");
    Ok(sources)
}

fn validated(source: Source) -> Source {
    let feeds = source
        .feeds
        .into_iter()
        .filter(|feed| match Url::parse(feed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => true,
            Ok(url) => {
                warn!(category = %source.category, %feed, scheme = url.scheme(), "Unsupported feed scheme; dropping");
                false
            }
            Err(e) => {
                warn!(category = %source.category, %feed, error = %e, "Invalid feed URL; dropping");
                false
            }
        })
        .collect();
    Source {
        category: source.category,
        feeds,
    }
}
