//! Statistics generation from the ledger and record store
//!
//! This module provides functionality for extracting and displaying the
//! state of a collection job without running it.

use crate::ledger::CheckpointLedger;
use crate::state::CrawlStatus;
use crate::store::{RecordKind, RecordStore};

/// Collection statistics summary
#[derive(Debug, Clone)]
pub struct BackfillStatistics {
    /// Total units in the input list
    pub total_units: usize,

    /// Units with no ledger entry at all (never attempted)
    pub untracked: usize,

    /// Ledger entries by status
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,

    /// Comment ids recorded across all ledger entries
    pub total_comment_ids: usize,

    /// Records persisted in the store, per kind
    pub content_records: usize,
    pub comment_records: usize,

    /// Most recently processed unit, if any
    pub last_note_id: Option<String>,

    /// Timestamp of the last ledger mutation
    pub last_update: Option<String>,
}

/// Loads statistics from the ledger and store
///
/// # Arguments
///
/// * `ledger` - The checkpoint ledger to summarize
/// * `store` - The record store to count persisted records in
/// * `total_units` - Size of the input work-unit list
pub async fn load_statistics(
    ledger: &CheckpointLedger,
    store: &RecordStore,
    total_units: usize,
) -> crate::Result<BackfillStatistics> {
    let state = ledger.load_or_recover()?;

    let tracked = state.notes_progress.len();
    Ok(BackfillStatistics {
        total_units,
        untracked: total_units.saturating_sub(tracked),
        pending: state.count_with_status(CrawlStatus::Pending),
        in_progress: state.count_with_status(CrawlStatus::InProgress),
        completed: state.count_with_status(CrawlStatus::Completed),
        total_comment_ids: state.total_comment_ids(),
        content_records: store.record_count(RecordKind::Contents).await?,
        comment_records: store.record_count(RecordKind::Comments).await?,
        last_note_id: state.last_note_id,
        last_update: state.last_update,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &BackfillStatistics) {
    println!("=== Collection Statistics ===\n");

    println!("Work units:");
    println!("  Total in input list: {}", stats.total_units);
    println!("  Completed: {}", stats.completed);
    println!("  In progress (interrupted): {}", stats.in_progress);
    println!("  Pending (requeued): {}", stats.pending);
    println!("  Never attempted: {}", stats.untracked);
    println!();

    println!("Records persisted:");
    println!("  Contents: {}", stats.content_records);
    println!("  Comments: {}", stats.comment_records);
    println!("  Comment ids in ledger: {}", stats.total_comment_ids);
    println!();

    if let Some(last) = &stats.last_note_id {
        let when = stats.last_update.as_deref().unwrap_or("unknown time");
        println!("Last processed unit: {} ({})", last, when);
        println!();
    }

    let done_rate = if stats.total_units > 0 {
        (stats.completed as f64 / stats.total_units as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Completion: {:.1}% ({} / {} units)",
        done_rate, stats.completed, stats.total_units
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_statistics_counts_ledger_and_store() {
        let dir = tempdir().unwrap();
        let ledger = CheckpointLedger::new(dir.path().join("progress.json"));
        let store = RecordStore::new(dir.path(), "xhs", "detail", "test");

        let ids = vec!["c1".to_string(), "c2".to_string()];
        ledger
            .save("N1", Some(&ids), CrawlStatus::Completed)
            .unwrap();
        ledger.save("N2", None, CrawlStatus::InProgress).unwrap();
        ledger.save("N3", None, CrawlStatus::Pending).unwrap();

        let comment = json!({"comment_id": "c1", "note_id": "N1"})
            .as_object()
            .unwrap()
            .clone();
        store
            .write_json(&comment, RecordKind::Comments)
            .await
            .unwrap();

        let stats = load_statistics(&ledger, &store, 5).await.unwrap();
        assert_eq!(stats.total_units, 5);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.untracked, 2);
        assert_eq!(stats.total_comment_ids, 2);
        assert_eq!(stats.comment_records, 1);
        assert_eq!(stats.content_records, 0);
        assert_eq!(stats.last_note_id.as_deref(), Some("N3"));
    }

    #[tokio::test]
    async fn test_load_statistics_empty_state() {
        let dir = tempdir().unwrap();
        let ledger = CheckpointLedger::new(dir.path().join("progress.json"));
        let store = RecordStore::new(dir.path(), "xhs", "detail", "test");

        let stats = load_statistics(&ledger, &store, 0).await.unwrap();
        assert_eq!(stats.total_units, 0);
        assert_eq!(stats.completed, 0);
        assert!(stats.last_note_id.is_none());
    }
}
