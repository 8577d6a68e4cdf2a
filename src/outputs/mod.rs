//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes run results to the dated archive and the latest snapshot
//!
//! # Output Structure
//!
//! ```text
//! archive_dir/
//! ├── 2025-05-06/
//! │   └── records.json
//! └── latest.json
//! ```
//!
//! The dated files double as the deduplication history read by
//! [`crate::history::HistoryStore`].

pub mod json;
