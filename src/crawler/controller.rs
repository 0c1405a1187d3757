//! Per-unit retry/backoff controller
//!
//! Drives one work unit through the crawl session and updates the ledger:
//!
//! `Pending -> InProgress -> { Completed | Pending (requeued) }`
//!
//! The in-progress marker is written before the fetch starts, so a crash
//! mid-fetch leaves a detectable non-terminal entry. On success the ledger
//! records the child ids the store actually persisted, not what the driver
//! claimed. Soft blocks get a bounded number of retries with linearly growing
//! backoff and a session reset in between; exhausting them requeues the unit
//! as pending. Unknown errors are not retried within the run, by policy: the
//! next run's remaining-work filter retries every non-completed unit anyway.

use crate::crawler::classify::{classify_failure, default_block_markers, FailureKind};
use crate::crawler::session::{CrawlSession, FetchTarget, FetchedRecords, SessionFactory};
use crate::ledger::CheckpointLedger;
use crate::state::CrawlStatus;
use crate::store::{RecordKind, RecordStore, StoreError};
use std::time::Duration;

/// Retry and pacing parameters for the controller
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum fetch attempts per unit when soft-blocked
    pub max_retries: u32,

    /// Backoff grows linearly: `backoff_base * attempt`
    pub backoff_base: Duration,

    /// Fixed cooldown between units, regardless of outcome
    pub cooldown: Duration,

    /// Markers that classify an error message as a soft block
    pub block_markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(30),
            cooldown: Duration::from_secs(8),
            block_markers: default_block_markers(),
        }
    }
}

/// Final disposition of one processed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Child records persisted and ledger marked completed
    Completed {
        /// Number of comment ids reconciled from the store
        comment_count: usize,
    },

    /// Soft-block retries exhausted; ledger explicitly requeued as pending
    Requeued {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Unknown error; ledger left at its last durable status
    Skipped {
        /// The error message, for the progress log
        error: String,
    },
}

/// Processes single work units against the store and ledger
pub struct UnitController<'a> {
    store: &'a RecordStore,
    ledger: &'a CheckpointLedger,
    policy: &'a RetryPolicy,
    export_csv: bool,
}

impl<'a> UnitController<'a> {
    /// Creates a controller over shared store/ledger handles
    pub fn new(
        store: &'a RecordStore,
        ledger: &'a CheckpointLedger,
        policy: &'a RetryPolicy,
        export_csv: bool,
    ) -> Self {
        Self {
            store,
            ledger,
            policy,
            export_csv,
        }
    }

    /// Drives one unit to an outcome
    ///
    /// Store and ledger IO errors propagate: an unwritable local environment
    /// is fatal to the run. Fetch errors never escape this method.
    pub async fn process_unit(
        &self,
        session: &mut Box<dyn CrawlSession>,
        factory: &SessionFactory,
        target: &FetchTarget,
    ) -> crate::Result<UnitOutcome> {
        let note_id = target.note_id.as_str();
        let mut attempt: u32 = 0;

        loop {
            // Marker first: a crash during the fetch must be detectable
            self.ledger.save(note_id, None, CrawlStatus::InProgress)?;

            match session.start(target).await {
                Ok(records) => {
                    self.persist_records(&records).await?;

                    // Reconcile claimed-fetched against actually-persisted
                    let comment_ids = self.store.child_ids_for_parent(note_id).await?;
                    let comment_count = comment_ids.len();
                    self.ledger
                        .save(note_id, Some(&comment_ids), CrawlStatus::Completed)?;

                    tracing::info!(
                        "Note {} completed with {} persisted comments",
                        note_id,
                        comment_count
                    );
                    return Ok(UnitOutcome::Completed { comment_count });
                }

                Err(err) => {
                    let message = err.to_string();
                    attempt += 1;

                    match classify_failure(&message, &self.policy.block_markers) {
                        FailureKind::SoftBlock => {
                            tracing::warn!(
                                "Soft block on note {} (attempt {}/{}): {}",
                                note_id,
                                attempt,
                                self.policy.max_retries,
                                message
                            );

                            if attempt < self.policy.max_retries {
                                let backoff = self.policy.backoff_base * attempt;
                                tracing::info!(
                                    "Backing off {:?} and restarting the session",
                                    backoff
                                );
                                tokio::time::sleep(backoff).await;

                                // Reset the session; a fresh login often clears
                                // verification challenges
                                session.close().await;
                                *session = factory();
                                continue;
                            }

                            // Requeue, never abandon: a future run retries it
                            tracing::warn!(
                                "Retries exhausted for note {}; requeued as pending",
                                note_id
                            );
                            self.ledger.save(note_id, None, CrawlStatus::Pending)?;
                            return Ok(UnitOutcome::Requeued { attempts: attempt });
                        }

                        FailureKind::Unknown => {
                            tracing::warn!("Error fetching note {}: {}", note_id, message);
                            return Ok(UnitOutcome::Skipped { error: message });
                        }
                    }
                }
            }
        }
    }

    /// Writes fetched records through the deduplicating store
    ///
    /// A malformed record in the driver payload is logged and skipped rather
    /// than failing the unit; file IO errors propagate. CSV rows are appended
    /// only for newly inserted records so the export inherits the dedup.
    async fn persist_records(&self, records: &FetchedRecords) -> crate::Result<()> {
        let batches = [
            (RecordKind::Contents, &records.contents),
            (RecordKind::Comments, &records.comments),
        ];

        for (kind, items) in batches {
            for item in items {
                match self.store.write_json(item, kind).await {
                    Ok(outcome) => {
                        if outcome.is_inserted() && self.export_csv {
                            self.store.write_csv(item, kind).await?;
                        }
                    }
                    Err(StoreError::MalformedRecord { kind, id_field }) => {
                        tracing::warn!(
                            "Dropping malformed {} record from driver (missing '{}')",
                            kind,
                            id_field
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::session::SessionError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Scripted session: pops one preloaded result per `start` call
    struct ScriptedSession {
        script: Arc<Mutex<VecDeque<Result<FetchedRecords, SessionError>>>>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CrawlSession for ScriptedSession {
        async fn start(&mut self, _target: &FetchTarget) -> Result<FetchedRecords, SessionError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SessionError::Transport("script exhausted".into())))
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        store: RecordStore,
        ledger: CheckpointLedger,
        script: Arc<Mutex<VecDeque<Result<FetchedRecords, SessionError>>>>,
        closes: Arc<AtomicUsize>,
        rebuilds: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(results: Vec<Result<FetchedRecords, SessionError>>) -> Self {
            let dir = tempdir().unwrap();
            Self {
                store: RecordStore::new(dir.path(), "xhs", "detail", "test"),
                ledger: CheckpointLedger::new(dir.path().join("progress.json")),
                script: Arc::new(Mutex::new(results.into())),
                closes: Arc::new(AtomicUsize::new(0)),
                rebuilds: Arc::new(AtomicUsize::new(0)),
                _dir: dir,
            }
        }

        fn session(&self) -> Box<dyn CrawlSession> {
            Box::new(ScriptedSession {
                script: self.script.clone(),
                closes: self.closes.clone(),
            })
        }

        fn factory(&self) -> SessionFactory {
            let script = self.script.clone();
            let closes = self.closes.clone();
            let rebuilds = self.rebuilds.clone();
            Box::new(move || {
                rebuilds.fetch_add(1, Ordering::SeqCst);
                Box::new(ScriptedSession {
                    script: script.clone(),
                    closes: closes.clone(),
                })
            })
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(1),
            cooldown: Duration::ZERO,
            block_markers: default_block_markers(),
        }
    }

    fn target(note_id: &str) -> FetchTarget {
        FetchTarget {
            note_id: note_id.to_string(),
            note_url: format!("https://example.com/explore/{}", note_id),
            enable_comments: true,
            enable_sub_comments: true,
        }
    }

    fn fetched(comments: Vec<serde_json::Value>) -> FetchedRecords {
        FetchedRecords {
            contents: vec![],
            comments: comments
                .into_iter()
                .map(|value| value.as_object().unwrap().clone())
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_success_reconciles_from_store() {
        let fixture = Fixture::new(vec![Ok(fetched(vec![
            json!({"comment_id": "c1", "note_id": "N1"}),
            json!({"comment_id": "c2", "note_id": "N1"}),
            // Belongs to another note; must not be attributed to N1
            json!({"comment_id": "c9", "note_id": "N2"}),
        ]))]);

        let policy = fast_policy();
        let controller = UnitController::new(&fixture.store, &fixture.ledger, &policy, false);
        let mut session = fixture.session();
        let factory = fixture.factory();

        let outcome = controller
            .process_unit(&mut session, &factory, &target("N1"))
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::Completed { comment_count: 2 });

        let state = fixture.ledger.load().unwrap();
        let entry = state.notes_progress.get("N1").unwrap();
        assert_eq!(entry.status, CrawlStatus::Completed);
        assert_eq!(entry.comment_ids, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[tokio::test]
    async fn test_soft_block_retries_then_requeues_pending() {
        let blocked = || Err(SessionError::Driver("403: captcha required".into()));
        let fixture = Fixture::new(vec![blocked(), blocked(), blocked()]);

        let policy = fast_policy();
        let controller = UnitController::new(&fixture.store, &fixture.ledger, &policy, false);
        let mut session = fixture.session();
        let factory = fixture.factory();

        let outcome = controller
            .process_unit(&mut session, &factory, &target("N1"))
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::Requeued { attempts: 3 });

        // Session was torn down and rebuilt between attempts
        assert_eq!(fixture.closes.load(Ordering::SeqCst), 2);
        assert_eq!(fixture.rebuilds.load(Ordering::SeqCst), 2);

        let state = fixture.ledger.load().unwrap();
        assert_eq!(
            state.notes_progress.get("N1").unwrap().status,
            CrawlStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_soft_block_then_success_completes() {
        let fixture = Fixture::new(vec![
            Err(SessionError::Driver("需要验证".into())),
            Ok(fetched(vec![json!({"comment_id": "c1", "note_id": "N1"})])),
        ]);

        let policy = fast_policy();
        let controller = UnitController::new(&fixture.store, &fixture.ledger, &policy, false);
        let mut session = fixture.session();
        let factory = fixture.factory();

        let outcome = controller
            .process_unit(&mut session, &factory, &target("N1"))
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::Completed { comment_count: 1 });
    }

    #[tokio::test]
    async fn test_unknown_error_skips_and_leaves_in_progress() {
        let fixture = Fixture::new(vec![Err(SessionError::Transport(
            "connection reset by peer".into(),
        ))]);

        let policy = fast_policy();
        let controller = UnitController::new(&fixture.store, &fixture.ledger, &policy, false);
        let mut session = fixture.session();
        let factory = fixture.factory();

        let outcome = controller
            .process_unit(&mut session, &factory, &target("N1"))
            .await
            .unwrap();
        assert!(matches!(outcome, UnitOutcome::Skipped { .. }));

        // No session churn for unknown errors
        assert_eq!(fixture.rebuilds.load(Ordering::SeqCst), 0);

        // Last durable status is the pre-fetch marker, so the next full run
        // still selects this unit
        let state = fixture.ledger.load().unwrap();
        let entry = state.notes_progress.get("N1").unwrap();
        assert_eq!(entry.status, CrawlStatus::InProgress);
        assert!(!state.completed_ids().contains("N1"));
    }

    #[tokio::test]
    async fn test_malformed_driver_records_are_dropped_not_fatal() {
        let fixture = Fixture::new(vec![Ok(fetched(vec![
            json!({"note_id": "N1", "text": "no comment_id"}),
            json!({"comment_id": "c1", "note_id": "N1"}),
        ]))]);

        let policy = fast_policy();
        let controller = UnitController::new(&fixture.store, &fixture.ledger, &policy, false);
        let mut session = fixture.session();
        let factory = fixture.factory();

        let outcome = controller
            .process_unit(&mut session, &factory, &target("N1"))
            .await
            .unwrap();
        assert_eq!(outcome, UnitOutcome::Completed { comment_count: 1 });
    }
}
