//! Data models for feed entries and the archived records built from them.
//!
//! - [`CandidateEntry`]: one feed item as listed by a source, before any
//!   extraction or summarization
//! - [`ArticleRecord`]: the persisted unit written to the JSON archive
//! - [`RunResult`]: the ordered records produced by a single run
//!
//! Field names of [`ArticleRecord`] are part of the archive format and are
//! read back by the history lookup, so they must not be renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item listed by a feed.
///
/// The `id` is the entry's canonical link and doubles as the deduplication
/// key across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntry {
    /// Deduplication key; always equal to `link`.
    pub id: String,
    /// Headline as given by the feed.
    pub title: String,
    /// Canonical article URL.
    pub link: String,
    /// Publish time, or the time the feed was read when the feed omits it.
    pub published: DateTime<Utc>,
    /// Category label of the configured source.
    pub category: String,
    /// Title of the feed the entry came from.
    pub source: String,
}

/// An archived article with its one-sentence summary.
///
/// `summary_ai` holds either the model's summary or a failure marker
/// (see [`crate::summarizer::FAILURE_MARKER_PREFIX`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub category: String,
    pub published: DateTime<Utc>,
    pub summary_ai: String,
}

impl ArticleRecord {
    /// Build a record from a feed entry and its rendered summary.
    pub fn from_entry(entry: CandidateEntry, summary_ai: String) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            link: entry.link,
            source: entry.source,
            category: entry.category,
            published: entry.published,
            summary_ai,
        }
    }
}

/// Everything one pipeline run produced.
///
/// Only `records` is persisted; the counters feed the end-of-run log line.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Records in source iteration order.
    pub records: Vec<ArticleRecord>,
    /// Entries returned by all feeds, duplicates included.
    pub entries_seen: usize,
    /// Entries skipped because their id was already emitted.
    pub duplicates_skipped: usize,
    /// Records whose `summary_ai` is a failure marker.
    pub summary_failures: usize,
}

impl RunResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
