//! Deduplicating record store backed by per-kind JSON files
//!
//! The write path is read-modify-rewrite-whole-file, not an append, so all
//! mutating operations and reconciliation reads on a store instance share one
//! mutual-exclusion scope. The lock is never held across a network call.

use crate::store::{csv_header, csv_row, RecordKind};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

/// A stored item: an arbitrary field map with a kind-specific identifier field
pub type Record = serde_json::Map<String, Value>;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record of kind '{kind}' is missing identifier field '{id_field}'")]
    MalformedRecord {
        kind: RecordKind,
        id_field: &'static str,
    },

    #[error("Failed to serialize records: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an idempotent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was new and has been durably persisted
    Inserted,

    /// A record with this identifier already exists; nothing was written
    Duplicate,
}

impl WriteOutcome {
    /// Returns true if the write persisted a new record
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Deduplicating store for fetched records
///
/// One backing file exists per (kind, format) pair. Paths are derived from a
/// platform label, a crawl-mode label, and a run label, so re-running the
/// same logical job resumes against the same files. The in-memory existing-id
/// index mirrors the identifiers present in each JSON backing file; it is
/// rebuilt at construction and mutated only by successful writes.
pub struct RecordStore {
    data_dir: PathBuf,
    platform: String,
    mode: String,
    file_label: String,
    index: Mutex<HashMap<RecordKind, HashSet<String>>>,
}

impl RecordStore {
    /// Opens a store rooted at `data_dir` and rebuilds the existing-id index
    ///
    /// An unreadable or unparsable backing file degrades to an empty index
    /// with a warning; construction never fails because of prior file
    /// contents.
    pub fn new(data_dir: &Path, platform: &str, mode: &str, file_label: &str) -> Self {
        let mut store = Self {
            data_dir: data_dir.to_path_buf(),
            platform: platform.to_string(),
            mode: mode.to_string(),
            file_label: file_label.to_string(),
            index: Mutex::new(HashMap::new()),
        };

        let mut index = HashMap::new();
        for kind in RecordKind::all() {
            let path = store.json_path(kind);
            let ids: HashSet<String> = match read_records(&path) {
                Ok(records) => records
                    .iter()
                    .filter_map(|record| record_id(record, kind).ok())
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        "Failed to read existing {} records from {}: {}",
                        kind,
                        path.display(),
                        e
                    );
                    HashSet::new()
                }
            };
            if !ids.is_empty() {
                tracing::info!(
                    "Loaded {} existing {} ids from {}",
                    ids.len(),
                    kind,
                    path.display()
                );
            }
            index.insert(kind, ids);
        }
        *store.index.get_mut() = index;

        store
    }

    /// Builds the run label from a keyword and an optional date range
    ///
    /// Matches the naming used by the earlier collection runs this job
    /// resumes: sanitized keyword (spaces to underscores, first 20 chars)
    /// plus `_from_X`, `_to_Y`, or `_X_to_Y`.
    pub fn file_label(
        keyword: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> String {
        let keyword_label: String = sanitize_label(&keyword.replace(' ', "_"))
            .chars()
            .take(20)
            .collect();

        let time_label = match (start_date, end_date) {
            (Some(start), Some(end)) => format!("_{}_to_{}", start, end),
            (Some(start), None) => format!("_from_{}", start),
            (None, Some(end)) => format!("_to_{}", end),
            (None, None) => String::new(),
        };

        format!("{}{}", keyword_label, time_label)
    }

    /// Path of the JSON backing file for a kind
    pub fn json_path(&self, kind: RecordKind) -> PathBuf {
        self.format_path("json", kind)
    }

    /// Path of the CSV export file for a kind
    pub fn csv_path(&self, kind: RecordKind) -> PathBuf {
        self.format_path("csv", kind)
    }

    fn format_path(&self, format: &str, kind: RecordKind) -> PathBuf {
        self.data_dir.join(&self.platform).join(format).join(format!(
            "{}_{}_{}.{}",
            self.mode,
            kind.file_stem(),
            self.file_label,
            format
        ))
    }

    /// Writes one record to the kind's JSON backing file, deduplicating by id
    ///
    /// A record whose identifier is already known is skipped and reported as
    /// `Duplicate` (first write wins; not an error). New records are appended
    /// and the whole file is atomically rewritten before this returns.
    ///
    /// # Errors
    ///
    /// `StoreError::MalformedRecord` if the identifier field is absent or not
    /// a string; the record is not written. File IO errors propagate.
    pub async fn write_json(&self, item: &Record, kind: RecordKind) -> StoreResult<WriteOutcome> {
        let id = record_id(item, kind)?;

        let mut index = self.index.lock().await;
        let known = index.entry(kind).or_default();
        if known.contains(&id) {
            tracing::info!("Skip duplicate {} id: {}", kind, id);
            return Ok(WriteOutcome::Duplicate);
        }

        let path = self.json_path(kind);
        let mut records = read_records(&path)?;

        // Re-absorb ids from the file before deciding: the index must never
        // under-report what the backing file already holds.
        for record in &records {
            if let Ok(existing) = record_id(record, kind) {
                known.insert(existing);
            }
        }
        if known.contains(&id) {
            tracing::info!("Skip duplicate {} id: {}", kind, id);
            return Ok(WriteOutcome::Duplicate);
        }

        records.push(item.clone());
        write_records_atomic(&path, &records)?;
        known.insert(id.clone());
        tracing::debug!("Added new {} id: {} (total: {})", kind, id, known.len());

        Ok(WriteOutcome::Inserted)
    }

    /// Appends one row to the kind's CSV export file
    ///
    /// The header is written exactly once, derived from the first item's
    /// field names. Later items are expected to share that field set; if they
    /// don't, columns simply misalign (documented limitation).
    pub async fn write_csv(&self, item: &Record, kind: RecordKind) -> StoreResult<()> {
        let _guard = self.index.lock().await;

        let path = self.csv_path(kind);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = !path.exists() || std::fs::metadata(&path)?.len() == 0;

        let mut chunk = String::new();
        if needs_header {
            chunk.push_str(&csv_header(item.keys()));
            chunk.push('\n');
        }
        chunk.push_str(&csv_row(item.values()));
        chunk.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(chunk.as_bytes())?;

        Ok(())
    }

    /// Produces the distinct values of `field` across stored records of a kind
    ///
    /// Recomputed from the backing file under the store lock, not from the
    /// in-memory index. Non-string values are ignored.
    pub async fn derive_set(&self, kind: RecordKind, field: &str) -> StoreResult<HashSet<String>> {
        let _guard = self.index.lock().await;

        let records = read_records(&self.json_path(kind))?;
        Ok(records
            .iter()
            .filter_map(|record| record.get(field).and_then(Value::as_str))
            .map(String::from)
            .collect())
    }

    /// Reads back the comment ids persisted for one parent post
    ///
    /// This is the reconciliation read: what the ledger records as collected
    /// is exactly what the comments backing file holds for this parent, in
    /// file (discovery) order.
    pub async fn child_ids_for_parent(&self, parent_id: &str) -> StoreResult<Vec<String>> {
        let _guard = self.index.lock().await;

        let records = read_records(&self.json_path(RecordKind::Comments))?;
        Ok(records
            .iter()
            .filter(|record| {
                record
                    .get(RecordKind::parent_link_field())
                    .and_then(Value::as_str)
                    == Some(parent_id)
            })
            .filter_map(|record| {
                record
                    .get(RecordKind::Comments.id_field())
                    .and_then(Value::as_str)
            })
            .map(String::from)
            .collect())
    }

    /// Number of stored records of a kind, counted from the backing file
    pub async fn record_count(&self, kind: RecordKind) -> StoreResult<usize> {
        let _guard = self.index.lock().await;
        Ok(read_records(&self.json_path(kind))?.len())
    }
}

/// Extracts a record's identifier for the given kind
fn record_id(item: &Record, kind: RecordKind) -> StoreResult<String> {
    item.get(kind.id_field())
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or(StoreError::MalformedRecord {
            kind,
            id_field: kind.id_field(),
        })
}

/// Reads and parses a JSON backing file into records
///
/// A missing or empty file yields no records. Unparsable content degrades to
/// no records with a warning; a single top-level object is treated as a
/// one-record collection. IO errors propagate.
fn read_records(path: &Path) -> std::io::Result<Vec<Record>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()),
        Ok(Value::Object(map)) => Ok(vec![map]),
        Ok(_) | Err(_) => {
            tracing::warn!(
                "Backing file {} is not a record collection; treating as empty",
                path.display()
            );
            Ok(Vec::new())
        }
    }
}

/// Atomically replaces a JSON backing file with the given records
fn write_records_atomic(path: &Path, records: &[Record]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records).map_err(StoreError::Serialize)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Strips characters that are invalid in file names
fn sanitize_label(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("test record is an object").clone()
    }

    fn store_in(dir: &tempfile::TempDir) -> RecordStore {
        RecordStore::new(dir.path(), "xhs", "detail", "black_card")
    }

    #[tokio::test]
    async fn test_first_write_wins_on_duplicate_id() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let first = record(json!({"note_id": "A", "text": "x"}));
        let second = record(json!({"note_id": "A", "text": "y"}));

        assert_eq!(
            store.write_json(&first, RecordKind::Contents).await.unwrap(),
            WriteOutcome::Inserted
        );
        assert_eq!(
            store.write_json(&second, RecordKind::Contents).await.unwrap(),
            WriteOutcome::Duplicate
        );

        let stored = read_records(&store.json_path(RecordKind::Contents)).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get("text"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_missing_id_field_is_malformed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let item = record(json!({"text": "no identifier"}));
        let err = store
            .write_json(&item, RecordKind::Contents)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::MalformedRecord {
                kind: RecordKind::Contents,
                id_field: "note_id"
            }
        ));

        // Nothing was written
        assert!(!store.json_path(RecordKind::Contents).exists());
    }

    #[tokio::test]
    async fn test_non_string_id_is_malformed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let item = record(json!({"comment_id": 7, "text": "numeric id"}));
        assert!(store
            .write_json(&item, RecordKind::Comments)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_index_rebuilt_after_restart() {
        let dir = tempdir().unwrap();
        {
            let store = store_in(&dir);
            for id in ["c1", "c2"] {
                let item = record(json!({"comment_id": id, "note_id": "N1"}));
                store.write_json(&item, RecordKind::Comments).await.unwrap();
            }
        }

        // A fresh instance over the same files must see both ids
        let reopened = store_in(&dir);
        let duplicate = record(json!({"comment_id": "c1", "note_id": "N1"}));
        assert_eq!(
            reopened
                .write_json(&duplicate, RecordKind::Comments)
                .await
                .unwrap(),
            WriteOutcome::Duplicate
        );
        assert_eq!(
            reopened.record_count(RecordKind::Comments).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_corrupt_backing_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let path = store.json_path(RecordKind::Contents);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{{{ definitely not json").unwrap();

        // Startup with a corrupt file must not fail, and writes still work
        let reopened = store_in(&dir);
        let item = record(json!({"note_id": "A"}));
        assert_eq!(
            reopened
                .write_json(&item, RecordKind::Contents)
                .await
                .unwrap(),
            WriteOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn test_derive_set_projects_distinct_values() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        for (cid, nid) in [("c1", "N1"), ("c2", "N1"), ("c3", "N2")] {
            let item = record(json!({"comment_id": cid, "note_id": nid}));
            store.write_json(&item, RecordKind::Comments).await.unwrap();
        }

        let parents = store
            .derive_set(RecordKind::Comments, "note_id")
            .await
            .unwrap();
        assert_eq!(parents.len(), 2);
        assert!(parents.contains("N1"));
        assert!(parents.contains("N2"));
    }

    #[tokio::test]
    async fn test_child_ids_for_parent_in_discovery_order() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        for (cid, nid) in [("c3", "N1"), ("c1", "N2"), ("c2", "N1")] {
            let item = record(json!({"comment_id": cid, "note_id": nid}));
            store.write_json(&item, RecordKind::Comments).await.unwrap();
        }

        let ids = store.child_ids_for_parent("N1").await.unwrap();
        assert_eq!(ids, vec!["c3".to_string(), "c2".to_string()]);
        assert!(store.child_ids_for_parent("N9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_csv_header_written_exactly_once() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let first = record(json!({"note_id": "A", "text": "x"}));
        let second = record(json!({"note_id": "B", "text": "y,z"}));
        store.write_csv(&first, RecordKind::Contents).await.unwrap();
        store.write_csv(&second, RecordKind::Contents).await.unwrap();

        let content = std::fs::read_to_string(store.csv_path(RecordKind::Contents)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["note_id,text", "A,x", "B,\"y,z\""]);
    }

    #[test]
    fn test_file_label_sanitizes_and_truncates() {
        assert_eq!(RecordStore::file_label("black card", None, None), "black_card");
        assert_eq!(RecordStore::file_label("a/b:c", None, None), "a_b_c");

        let long = "x".repeat(40);
        assert_eq!(RecordStore::file_label(&long, None, None).chars().count(), 20);
    }

    #[test]
    fn test_file_label_date_suffixes() {
        assert_eq!(
            RecordStore::file_label("ant", Some("2025-10-01"), Some("2025-10-10")),
            "ant_2025-10-01_to_2025-10-10"
        );
        assert_eq!(
            RecordStore::file_label("ant", Some("2025-10-01"), None),
            "ant_from_2025-10-01"
        );
        assert_eq!(
            RecordStore::file_label("ant", None, Some("2025-10-10")),
            "ant_to_2025-10-10"
        );
    }

    #[test]
    fn test_paths_follow_platform_and_mode_layout() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let json = store.json_path(RecordKind::Comments);
        assert!(json.ends_with("xhs/json/detail_comments_black_card.json"));

        let csv = store.csv_path(RecordKind::Contents);
        assert!(csv.ends_with("xhs/csv/detail_contents_black_card.csv"));
    }
}
