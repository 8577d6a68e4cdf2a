//! # News Digest
//!
//! Pulls articles from a fixed set of RSS/Atom feeds, extracts their readable
//! text, asks an LLM for a one-sentence summary, skips anything already
//! published in the last few days, and writes the result as a dated JSON
//! archive plus a `latest.json` snapshot.
//!
//! ## Usage
//!
//! ```sh
//! SUMMARIZER_API_KEY=sk-... news_digest -a ./archive -s sources.yaml
//! ```
//!
//! ## Architecture
//!
//! One run is a straight pipeline:
//! 1. **History**: Collect ids from the previous days' archives
//! 2. **Feeds**: Read the top entries of every configured feed
//! 3. **Extraction**: Download each new article and pull out its text
//! 4. **Summarization**: One sentence per article, with classified retries
//! 5. **Output**: Write `archive/<date>/records.json` and `archive/latest.json`
//!
//! Individual feeds and articles may fail without affecting the run. The
//! process exits non-zero only when the archive cannot be written.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod history;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod summarizer;
mod utils;

use api::ChatCompletionsClient;
use cli::Cli;
use history::HistoryStore;
use outputs::json::ArchiveWriter;
use pipeline::PipelineRunner;
use scrapers::article::ReadabilityExtractor;
use scrapers::feed::FeedReader;
use summarizer::Summarizer;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_digest starting up");

    let args = Cli::parse();
    debug!(archive_dir = %args.archive_dir, sources = ?args.sources, "Parsed CLI arguments");

    // Fail before any network work if the archive can't be written
    let archive_dir = Path::new(&args.archive_dir);
    if let Err(e) = ensure_writable_dir(archive_dir).await {
        error!(
            path = %args.archive_dir,
            error = %e,
            "Archive directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let sources = config::load_sources(args.sources.as_deref()).await?;

    // ---- Build components ----
    let client = scrapers::build_client(&args.fetch_settings())?;
    let feeds = FeedReader::new(client.clone(), args.entries_per_source, args.min_feed_bytes);
    let extractor = ReadabilityExtractor::new(client, args.max_text_chars);

    let summarizer = match args.backend_config() {
        Some(backend) => {
            info!(model = %backend.model, api_base = %backend.api_base, "Summarizer configured");
            Summarizer::new(ChatCompletionsClient::new(backend)?, args.summarizer_config())
        }
        None => Summarizer::unconfigured(args.summarizer_config()),
    };
    if !summarizer.is_configured() {
        warn!("No API key found; records will carry the credential-missing marker instead of summaries");
    }

    let runner = PipelineRunner::new(
        feeds,
        extractor,
        summarizer,
        HistoryStore::new(archive_dir),
        args.pipeline_settings(),
    );

    // ---- Run ----
    let today = Local::now().date_naive();
    let run = runner.run(&sources, today).await;
    if run.is_empty() {
        info!("No new articles this run; writing an empty archive");
    }

    // ---- Persist ----
    let writer = ArchiveWriter::new(archive_dir);
    match writer.persist(&run, today).await {
        Ok(paths) => info!(
            records = run.len(),
            dated = %paths.dated.display(),
            latest = %paths.latest.display(),
            "Saved articles"
        ),
        Err(e) => {
            error!(error = %e, "Failed to write archive");
            return Err(e.into());
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        records = run.len(),
        duplicates_skipped = run.duplicates_skipped,
        summary_failures = run.summary_failures,
        "Execution complete"
    );

    Ok(())
}
