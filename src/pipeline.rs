//! The aggregation run: sources in, ordered records out.
//!
//! ```text
//! history ──► seen ids
//!                │
//! for each category, for each feed:
//!     entries ──► skip seen ──► extract text ──► summarize ──► record
//! ```
//!
//! Everything runs sequentially. Per-source and per-article failures are
//! absorbed by the components themselves, so a run always completes and the
//! only fatal step is persistence, which happens outside this module.

use crate::api::AskAsync;
use crate::config::Source;
use crate::history::HistoryStore;
use crate::models::{ArticleRecord, RunResult};
use crate::scrapers::article::ArticleExtractor;
use crate::scrapers::feed::FeedSource;
use crate::summarizer::Summarizer;
use crate::utils::truncate_for_log;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Run-level knobs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Days of archive consulted for deduplication.
    pub lookback_days: u32,
    /// Pause between two processed articles.
    pub politeness_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            lookback_days: 3,
            politeness_delay: Duration::from_secs(1),
        }
    }
}

/// Orchestrates one run over all configured sources.
pub struct PipelineRunner<F, E, B> {
    feeds: F,
    extractor: E,
    summarizer: Summarizer<B>,
    history: HistoryStore,
    settings: PipelineSettings,
}

impl<F, E, B> PipelineRunner<F, E, B>
where
    F: FeedSource,
    E: ArticleExtractor,
    B: AskAsync,
{
    /// Assemble a runner from its components.
    ///
    /// # Arguments
    ///
    /// * `feeds` - Lists the entries of one feed URL
    /// * `extractor` - Turns an article link into text
    /// * `summarizer` - Turns text into a summary or a failure marker
    /// * `history` - Past archives used to skip already emitted articles
    /// * `settings` - Lookback window and politeness delay
    pub fn new(
        feeds: F,
        extractor: E,
        summarizer: Summarizer<B>,
        history: HistoryStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            feeds,
            extractor,
            summarizer,
            history,
            settings,
        }
    }

    /// Run against the archive as seen on `today`.
    ///
    /// Never fails: sources that cannot be read contribute nothing, and
    /// articles whose text or summary fails still produce a record carrying
    /// the failure marker.
    #[instrument(level = "info", skip_all, fields(%today))]
    pub async fn run(&self, sources: &[Source], today: NaiveDate) -> RunResult {
        let seen = self
            .history
            .seen_ids_as_of(today, self.settings.lookback_days)
            .await;
        self.run_with_seen(sources, &seen).await
    }

    async fn run_with_seen(&self, sources: &[Source], seen: &HashSet<String>) -> RunResult {
        let mut result = RunResult::default();
        let mut emitted: HashSet<String> = HashSet::new();

        for source in sources {
            for feed_url in &source.feeds {
                info!(category = %source.category, feed = %feed_url, "Checking feed");
                let entries = self.feeds.fetch(&source.category, feed_url).await;
                result.entries_seen += entries.len();

                for entry in entries {
                    if seen.contains(&entry.id) || emitted.contains(&entry.id) {
                        debug!(id = %entry.id, "Already emitted; skipping duplicate");
                        result.duplicates_skipped += 1;
                        continue;
                    }

                    if !result.records.is_empty() && !self.settings.politeness_delay.is_zero() {
                        sleep(self.settings.politeness_delay).await;
                    }

                    info!(title = %truncate_for_log(&entry.title, 80), link = %entry.link, "Processing article");
                    let text = self.extractor.extract(&entry.link).await;
                    let outcome = self.summarizer.summarize(text.as_deref()).await;
                    if outcome.is_failure() {
                        result.summary_failures += 1;
                        info!(id = %entry.id, reason = %outcome, "Recording article without summary");
                    }

                    emitted.insert(entry.id.clone());
                    result
                        .records
                        .push(ArticleRecord::from_entry(entry, outcome.to_string()));
                }
            }
        }

        info!(
            records = result.records.len(),
            entries_seen = result.entries_seen,
            duplicates_skipped = result.duplicates_skipped,
            summary_failures = result.summary_failures,
            "Run complete"
        );
        result
    }
}
