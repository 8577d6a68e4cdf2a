//! JSON archive output.
//!
//! Each run writes its records twice: once under the run's date and once as
//! the "latest" snapshot.
//!
//! ```text
//! archive_dir/
//! ├── 2025-05-05/
//! │   └── records.json
//! ├── 2025-05-06/
//! │   └── records.json
//! └── latest.json
//! ```
//!
//! Both files are written to temporary siblings first and renamed into
//! place only after both writes succeed. The previous dated file is set
//! aside as a `.bak` while the pair is swapped in and restored if the
//! latest snapshot cannot be replaced, so a failed run never leaves one file
//! updated and the other stale.

use crate::models::{ArticleRecord, RunResult};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument};

pub const RECORDS_FILE: &str = "records.json";
pub const LATEST_FILE: &str = "latest.json";

/// Persistence failed; the run must exit non-zero.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `archive_dir/<YYYY-MM-DD>/records.json`
pub fn dated_archive_path(archive_dir: &Path, date: NaiveDate) -> PathBuf {
    archive_dir
        .join(date.format("%Y-%m-%d").to_string())
        .join(RECORDS_FILE)
}

/// `archive_dir/latest.json`
pub fn latest_archive_path(archive_dir: &Path) -> PathBuf {
    archive_dir.join(LATEST_FILE)
}

/// Where a successful [`ArchiveWriter::persist`] put its files.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivePaths {
    pub dated: PathBuf,
    pub latest: PathBuf,
}

/// Writes run results into the archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    archive_dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    /// Write `run` as the archive for `date` and as the latest snapshot.
    ///
    /// Replaces any existing file for the same date.
    #[instrument(level = "info", skip_all, fields(archive_dir = %self.archive_dir.display(), %date))]
    pub async fn persist(&self, run: &RunResult, date: NaiveDate) -> Result<ArchivePaths, ArchiveError> {
        let json = render_records(&run.records)?;
        let paths = ArchivePaths {
            dated: dated_archive_path(&self.archive_dir, date),
            latest: latest_archive_path(&self.archive_dir),
        };

        if let Some(parent) = paths.dated.parent() {
            info!(dir = %parent.display(), "Ensuring archive directory exists");
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::io(parent, e))?;
        }

        let dated_tmp = tmp_path(&paths.dated);
        let latest_tmp = tmp_path(&paths.latest);

        let staged = async {
            write_file(&dated_tmp, &json).await?;
            write_file(&latest_tmp, &json).await
        }
        .await;
        if let Err(e) = staged {
            error!(error = %e, "Failed to stage archive files; leaving previous archive untouched");
            discard(&[dated_tmp.as_path(), latest_tmp.as_path()]).await;
            return Err(e);
        }

        commit(&paths, &dated_tmp, &latest_tmp).await?;

        info!(
            records = run.records.len(),
            dated = %paths.dated.display(),
            latest = %paths.latest.display(),
            "Wrote archive"
        );
        Ok(paths)
    }
}

/// Swap both staged files into place, or neither.
async fn commit(paths: &ArchivePaths, dated_tmp: &Path, latest_tmp: &Path) -> Result<(), ArchiveError> {
    let backup = bak_path(&paths.dated);
    let had_previous = match fs::try_exists(&paths.dated).await {
        Ok(exists) => exists,
        Err(e) => {
            discard(&[dated_tmp, latest_tmp]).await;
            return Err(ArchiveError::io(&paths.dated, e));
        }
    };

    if had_previous {
        if let Err(e) = rename(&paths.dated, &backup).await {
            discard(&[dated_tmp, latest_tmp]).await;
            return Err(e);
        }
    }

    if let Err(e) = rename(dated_tmp, &paths.dated).await {
        discard(&[dated_tmp, latest_tmp]).await;
        if had_previous {
            restore_dated(&paths.dated, &backup, true).await;
        }
        return Err(e);
    }

    if let Err(e) = rename(latest_tmp, &paths.latest).await {
        error!(error = %e, "Failed to replace latest snapshot; rolling back dated archive");
        discard(&[latest_tmp]).await;
        restore_dated(&paths.dated, &backup, had_previous).await;
        return Err(e);
    }

    if had_previous {
        discard(&[backup.as_path()]).await;
    }
    Ok(())
}

/// Put the previous dated file back, or remove the new one if there was none.
async fn restore_dated(dated: &Path, backup: &Path, had_previous: bool) {
    let restored = if had_previous {
        fs::rename(backup, dated).await
    } else {
        fs::remove_file(dated).await
    };
    if let Err(e) = restored {
        error!(path = %dated.display(), error = %e, "Failed to roll back dated archive");
    }
}

async fn discard(paths: &[&Path]) {
    for path in paths {
        let _ = fs::remove_file(path).await;
    }
}

/// Pretty-printed UTF-8 JSON array; non-ASCII text is kept as-is.
pub fn render_records(records: &[ArticleRecord]) -> Result<String, ArchiveError> {
    Ok(serde_json::to_string_pretty(records)?)
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".tmp")
}

fn bak_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

async fn write_file(path: &Path, contents: &str) -> Result<(), ArchiveError> {
    fs::write(path, contents)
        .await
        .map_err(|e| ArchiveError::io(path, e))
}

async fn rename(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    fs::rename(from, to).await.map_err(|e| ArchiveError::io(to, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, summary: &str) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            title: "عنوان".to_string(),
            link: id.to_string(),
            source: "Saudi Gazette".to_string(),
            category: "saudi_business_tech".to_string(),
            published: Utc.with_ymd_and_hms(2025, 5, 6, 7, 0, 0).unwrap(),
            summary_ai: summary.to_string(),
        }
    }

    fn run_of(records: Vec<ArticleRecord>) -> RunResult {
        RunResult {
            records,
            ..RunResult::default()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/srv/archive");
        assert_eq!(
            dated_archive_path(dir, date()),
            PathBuf::from("/srv/archive/2025-05-06/records.json")
        );
        assert_eq!(latest_archive_path(dir), PathBuf::from("/srv/archive/latest.json"));
        assert_eq!(
            tmp_path(Path::new("/srv/archive/latest.json")),
            PathBuf::from("/srv/archive/latest.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_dated_and_latest_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path());
        let run = run_of(vec![
            record("https://a.example/1", "جملة."),
            record("https://a.example/2", "summary unavailable: no text extracted"),
        ]);

        let paths = writer.persist(&run, date()).await.unwrap();
        let dated = std::fs::read_to_string(&paths.dated).unwrap();
        let latest = std::fs::read_to_string(&paths.latest).unwrap();
        assert_eq!(dated, latest);

        let parsed: Vec<ArticleRecord> = serde_json::from_str(&dated).unwrap();
        assert_eq!(parsed, run.records);
        assert!(dated.contains("جملة."));
        assert!(!paths.dated.with_file_name("records.json.tmp").exists());
        assert!(!paths.latest.with_file_name("latest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_latest_is_overwritten_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path());
        writer
            .persist(&run_of(vec![record("https://a.example/1", "one")]), date())
            .await
            .unwrap();
        let next_day = date().succ_opt().unwrap();
        let paths = writer
            .persist(&run_of(vec![record("https://a.example/2", "two")]), next_day)
            .await
            .unwrap();

        let latest: Vec<ArticleRecord> =
            serde_json::from_str(&std::fs::read_to_string(&paths.latest).unwrap()).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, "https://a.example/2");
        assert!(dated_archive_path(dir.path(), date()).exists());
    }

    #[tokio::test]
    async fn test_empty_run_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArchiveWriter::new(dir.path())
            .persist(&RunResult::default(), date())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(paths.latest).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_unwritable_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the archive directory should be
        let blocker = dir.path().join("archive");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = ArchiveWriter::new(&blocker)
            .persist(&run_of(vec![record("https://a.example/1", "x")]), date())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[tokio::test]
    async fn test_failed_latest_swap_keeps_previous_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path());
        let first = writer
            .persist(&run_of(vec![record("https://a.example/1", "old")]), date())
            .await
            .unwrap();
        let before = std::fs::read_to_string(&first.dated).unwrap();

        // A non-empty directory where latest.json should go cannot be replaced
        std::fs::remove_file(&first.latest).unwrap();
        std::fs::create_dir_all(first.latest.join("sub")).unwrap();

        let err = writer
            .persist(&run_of(vec![record("https://a.example/2", "new")]), date())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));

        assert_eq!(std::fs::read_to_string(&first.dated).unwrap(), before);
        assert!(!tmp_path(&first.dated).exists());
        assert!(!tmp_path(&first.latest).exists());
        assert!(!bak_path(&first.dated).exists());
    }

    #[tokio::test]
    async fn test_failed_latest_swap_removes_new_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(latest_archive_path(dir.path()).join("sub")).unwrap();

        let writer = ArchiveWriter::new(dir.path());
        assert!(
            writer
                .persist(&run_of(vec![record("https://a.example/1", "x")]), date())
                .await
                .is_err()
        );

        let dated = dated_archive_path(dir.path(), date());
        assert!(!dated.exists());
        assert!(!tmp_path(&dated).exists());
        assert!(!tmp_path(&latest_archive_path(dir.path())).exists());
    }

    #[tokio::test]
    async fn test_successful_overwrite_leaves_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::new(dir.path());
        writer.persist(&run_of(vec![record("https://a.example/1", "one")]), date()).await.unwrap();
        let paths = writer
            .persist(&run_of(vec![record("https://a.example/2", "two")]), date())
            .await
            .unwrap();

        let dated: Vec<ArticleRecord> =
            serde_json::from_str(&std::fs::read_to_string(&paths.dated).unwrap()).unwrap();
        assert_eq!(dated[0].id, "https://a.example/2");
        assert!(!bak_path(&paths.dated).exists());
    }
}
