//! Checkpoint ledger persistence
//!
//! File format (field names match the progress files written by earlier
//! collection runs, so an existing ledger resumes cleanly):
//!
//! ```json
//! {
//!   "notes_progress": {
//!     "<note_id>": { "comment_ids": [...], "status": "completed", "last_update": "..." }
//!   },
//!   "last_note_id": "<note_id>",
//!   "last_update": "2025-11-02 14:03:55"
//! }
//! ```

use crate::state::CrawlStatus;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger file {path} is malformed: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One ledger record per work-unit identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Child-record ids collected for this unit, in discovery order
    #[serde(default)]
    pub comment_ids: Vec<String>,

    /// Current crawl status; absent entries default to pending
    #[serde(default)]
    pub status: CrawlStatus,

    /// Timestamp of the last mutation (`%Y-%m-%d %H:%M:%S`)
    #[serde(default)]
    pub last_update: Option<String>,
}

/// The full on-disk ledger document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Per-unit checkpoint entries, keyed by work-unit id
    #[serde(default)]
    pub notes_progress: BTreeMap<String, CheckpointEntry>,

    /// The most recently processed unit id
    #[serde(default)]
    pub last_note_id: Option<String>,

    /// Timestamp of the last ledger mutation
    #[serde(default)]
    pub last_update: Option<String>,
}

impl Ledger {
    /// Returns the set of unit ids whose status is `Completed`
    pub fn completed_ids(&self) -> HashSet<String> {
        self.notes_progress
            .iter()
            .filter(|(_, entry)| entry.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Counts entries with the given status
    pub fn count_with_status(&self, status: CrawlStatus) -> usize {
        self.notes_progress
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Total number of comment ids recorded across all entries
    pub fn total_comment_ids(&self) -> usize {
        self.notes_progress
            .values()
            .map(|entry| entry.comment_ids.len())
            .sum()
    }
}

/// Durable checkpoint ledger backed by a single JSON file
///
/// `save` is the single mutation point: it reloads the file, upserts one
/// entry, and atomically rewrites the whole document. There is no
/// partial-field update path.
pub struct CheckpointLedger {
    path: PathBuf,
}

impl CheckpointLedger {
    /// Creates a ledger handle for the given file path
    ///
    /// The file is not created until the first `save`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Returns the ledger file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger from disk
    ///
    /// A missing file yields an empty ledger. A malformed file is an error:
    /// discarding previous progress is a recovery decision the caller must
    /// make explicitly (see `load_or_recover`).
    pub fn load(&self) -> LedgerResult<Ledger> {
        if !self.path.exists() {
            return Ok(Ledger::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Ledger::default());
        }

        serde_json::from_str(&content).map_err(|source| LedgerError::Malformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Loads the ledger, recovering from a malformed file
    ///
    /// On a parse failure the corrupt file is renamed aside (`<path>.corrupt`)
    /// and an empty ledger is returned, so no bytes are silently destroyed.
    /// IO errors still propagate: an unreadable local filesystem is not a
    /// crawl-logic failure.
    pub fn load_or_recover(&self) -> LedgerResult<Ledger> {
        match self.load() {
            Ok(ledger) => Ok(ledger),
            Err(LedgerError::Malformed { path, source }) => {
                let backup = self.path.with_extension("json.corrupt");
                tracing::warn!(
                    "Ledger file {} is malformed ({}); moving it to {} and starting fresh",
                    path,
                    source,
                    backup.display()
                );
                std::fs::rename(&self.path, &backup)?;
                Ok(Ledger::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Upserts one entry and rewrites the ledger file
    ///
    /// # Arguments
    ///
    /// * `note_id` - The work-unit identifier
    /// * `comment_ids` - Collected child ids; `None` leaves the stored list untouched
    /// * `status` - The new status for this unit
    ///
    /// The entry is created as pending if absent, `last_update` is stamped on
    /// both the entry and the ledger, and the ledger-level last-processed
    /// pointer is moved to this unit.
    pub fn save(
        &self,
        note_id: &str,
        comment_ids: Option<&[String]>,
        status: CrawlStatus,
    ) -> LedgerResult<Ledger> {
        let mut ledger = self.load_or_recover()?;
        let now = timestamp_now();

        let entry = ledger.notes_progress.entry(note_id.to_string()).or_default();

        if let Some(ids) = comment_ids {
            entry.comment_ids = ids.to_vec();
        }
        entry.status = status;
        entry.last_update = Some(now.clone());

        ledger.last_note_id = Some(note_id.to_string());
        ledger.last_update = Some(now);

        self.write_atomic(&ledger)?;
        Ok(ledger)
    }

    /// Returns the collected child ids for a unit, or empty if it has no entry
    pub fn get_child_ids(&self, note_id: &str) -> LedgerResult<Vec<String>> {
        let ledger = self.load_or_recover()?;
        Ok(ledger
            .notes_progress
            .get(note_id)
            .map(|entry| entry.comment_ids.clone())
            .unwrap_or_default())
    }

    /// Serializes and atomically replaces the ledger file
    ///
    /// Writes to a temporary sibling first, then renames over the target, so
    /// a crash mid-write never truncates the previous ledger.
    fn write_atomic(&self, ledger: &Ledger) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(ledger).map_err(LedgerError::Serialize)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Current local time in the ledger's timestamp format
fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
