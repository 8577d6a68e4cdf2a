//! Recently emitted article ids, read back from the archive.
//!
//! The seen set is rebuilt from disk on every run: the archive files are the
//! only durable state. Today's file is never consulted, so re-running on the
//! same day replaces that day's output instead of filtering against it.

use crate::outputs::json::dated_archive_path;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// The only field the history needs from an archived record.
#[derive(Deserialize)]
struct SeenRecord {
    id: String,
}

/// Reads past archive files to build the deduplication set.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    archive_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    /// Ids emitted from `today - lookback_days` up to yesterday.
    ///
    /// Missing files are skipped quietly. Unreadable or malformed files are
    /// skipped with a warning; they never fail the run.
    #[instrument(level = "info", skip(self))]
    pub async fn seen_ids_as_of(&self, today: NaiveDate, lookback_days: u32) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut files_read = 0usize;

        for days_back in 1..=u64::from(lookback_days) {
            let Some(day) = today.checked_sub_days(Days::new(days_back)) else {
                break;
            };
            let path = dated_archive_path(&self.archive_dir, day);

            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "No archive for day");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable archive; ignoring");
                    continue;
                }
            };

            match serde_json::from_str::<Vec<SeenRecord>>(&contents) {
                Ok(records) => {
                    files_read += 1;
                    seen.extend(records.into_iter().map(|r| r.id));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt archive; ignoring");
                }
            }
        }

        info!(files_read, ids = seen.len(), "Loaded history");
        seen
    }
}
