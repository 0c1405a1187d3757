//! Run coordinator - main orchestration logic
//!
//! This module contains the resumable run loop that coordinates the
//! collection process, including:
//! - Computing the remaining-work set from the checkpoint ledger
//! - Driving the per-unit retry controller strictly sequentially
//! - Emitting progress after every unit
//! - Best-effort session teardown on every exit path

use crate::config::Config;
use crate::crawler::controller::{RetryPolicy, UnitController, UnitOutcome};
use crate::crawler::http_session::HttpSession;
use crate::crawler::session::{CrawlSession, FetchTarget, SessionFactory};
use crate::crawler::units::{load_work_units, WorkUnit};
use crate::ledger::CheckpointLedger;
use crate::state::CrawlStatus;
use crate::store::RecordStore;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Aggregate result of one `resume` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Total units in the input list
    pub total: usize,

    /// Units already completed before this run started
    pub already_completed: usize,

    /// Units processed during this run
    pub processed: usize,

    /// Units that reached `Completed` during this run
    pub completed: usize,

    /// Units requeued as pending after exhausting soft-block retries
    pub requeued: usize,

    /// Units skipped on unknown errors
    pub skipped: usize,
}

impl RunSummary {
    /// Returns true if every processed unit completed
    pub fn is_clean(&self) -> bool {
        self.requeued == 0 && self.skipped == 0
    }
}

/// Opens the record store the configuration describes
///
/// The file label ties this run to the files of the original collection run,
/// so resuming against the same keyword and date range hits the same files.
pub fn open_store(config: &Config) -> RecordStore {
    // Empty date strings mean "no bound", same as absent
    let start_date = config.crawl.start_date.as_deref().filter(|s| !s.is_empty());
    let end_date = config.crawl.end_date.as_deref().filter(|s| !s.is_empty());
    let label = RecordStore::file_label(&config.crawl.keyword, start_date, end_date);

    RecordStore::new(
        Path::new(&config.output.data_dir),
        &config.crawl.platform,
        &config.crawl.mode,
        &label,
    )
}

/// Opens the checkpoint ledger the configuration describes
pub fn open_ledger(config: &Config) -> CheckpointLedger {
    CheckpointLedger::new(&config.output.ledger_path)
}

/// Computes the remaining-work set: input order minus completed units
pub fn remaining_units<'a>(
    units: &'a [WorkUnit],
    completed: &HashSet<String>,
) -> Vec<&'a WorkUnit> {
    units
        .iter()
        .filter(|unit| !completed.contains(&unit.note_id))
        .collect()
}

/// Orchestrates a resumable collection run
///
/// Units are processed strictly sequentially with one outstanding fetch at a
/// time; the ledger write for unit N is fully persisted before unit N+1
/// starts. `resume` is the only supported restart path - re-running the
/// program against the same ledger continues where the last run stopped.
pub struct Coordinator {
    store: RecordStore,
    ledger: CheckpointLedger,
    policy: RetryPolicy,
    export_csv: bool,
    units: Vec<WorkUnit>,
    explore_base: Url,
    enable_sub_comments: bool,
    session: Box<dyn CrawlSession>,
    factory: SessionFactory,
}

impl Coordinator {
    /// Creates a coordinator wired to the configured HTTP crawl driver
    pub fn new(config: &Config) -> crate::Result<Self> {
        let units = load_work_units(Path::new(&config.input.posts_path))?;

        let endpoint = Url::parse(&config.driver.endpoint)?;
        let timeout = Duration::from_secs(config.driver.timeout_secs);
        let session: Box<dyn CrawlSession> =
            Box::new(HttpSession::new(endpoint.clone(), timeout));
        let factory: SessionFactory =
            Box::new(move || Box::new(HttpSession::new(endpoint.clone(), timeout)));

        Self::with_session(config, units, session, factory)
    }

    /// Creates a coordinator over an explicit session and factory
    ///
    /// Used by tests to substitute the crawl capability; `new` is this plus
    /// the HTTP driver adapter.
    pub fn with_session(
        config: &Config,
        units: Vec<WorkUnit>,
        session: Box<dyn CrawlSession>,
        factory: SessionFactory,
    ) -> crate::Result<Self> {
        let store = open_store(config);
        let ledger = open_ledger(config);

        let policy = RetryPolicy {
            max_retries: config.crawl.max_retries,
            backoff_base: Duration::from_secs(config.crawl.backoff_base_secs),
            cooldown: Duration::from_secs(config.crawl.cooldown_secs),
            block_markers: config.crawl.block_markers.clone(),
        };

        let explore_base = Url::parse(&config.crawl.explore_base_url)?;

        Ok(Self {
            store,
            ledger,
            policy,
            export_csv: config.output.enable_csv,
            units,
            explore_base,
            enable_sub_comments: config.crawl.enable_sub_comments,
            session,
            factory,
        })
    }

    /// The input work-unit list
    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// The checkpoint ledger this run writes to
    pub fn ledger(&self) -> &CheckpointLedger {
        &self.ledger
    }

    /// The record store this run writes to
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Runs the resumable collection loop, then tears the session down
    pub async fn run(&mut self) -> crate::Result<RunSummary> {
        let result = self.resume().await;
        self.shutdown().await;
        result
    }

    /// Processes every unit not yet marked completed in the ledger
    ///
    /// Does not close the session; `run` and the interrupt path own teardown.
    pub async fn resume(&mut self) -> crate::Result<RunSummary> {
        let state = self.ledger.load_or_recover()?;
        let completed = state.completed_ids();

        let total = self.units.len();
        let remaining: Vec<WorkUnit> = remaining_units(&self.units, &completed)
            .into_iter()
            .cloned()
            .collect();

        tracing::info!(
            "Loaded {} posts: {} completed, {} remaining",
            total,
            completed.len(),
            remaining.len()
        );
        for (note_id, entry) in state.notes_progress.iter().take(3) {
            tracing::debug!(
                "  - {}: {} comments ({})",
                note_id,
                entry.comment_ids.len(),
                entry.status
            );
        }

        let mut summary = RunSummary {
            total,
            already_completed: completed.len(),
            ..RunSummary::default()
        };

        if remaining.is_empty() {
            tracing::info!("All posts already have their comments collected");
            return Ok(summary);
        }

        for (idx, unit) in remaining.iter().enumerate() {
            tracing::info!(
                "[{}/{}] Fetching comments for note {}",
                idx + 1,
                remaining.len(),
                unit.note_id
            );

            let note_url = unit.explore_url(&self.explore_base)?;
            let target = FetchTarget {
                note_id: unit.note_id.clone(),
                note_url: note_url.into(),
                enable_comments: true,
                enable_sub_comments: self.enable_sub_comments,
            };

            let controller =
                UnitController::new(&self.store, &self.ledger, &self.policy, self.export_csv);
            let outcome = controller
                .process_unit(&mut self.session, &self.factory, &target)
                .await?;

            summary.processed += 1;
            let latest_count = match outcome {
                UnitOutcome::Completed { comment_count } => {
                    summary.completed += 1;
                    comment_count
                }
                UnitOutcome::Requeued { .. } => {
                    summary.requeued += 1;
                    0
                }
                UnitOutcome::Skipped { .. } => {
                    summary.skipped += 1;
                    0
                }
            };

            // Progress reflects durable ledger state, not in-memory tallies
            let snapshot = self.ledger.load_or_recover()?;
            tracing::info!(
                "Progress: {}/{} completed | note {}: {} comments",
                snapshot.count_with_status(CrawlStatus::Completed),
                total,
                unit.note_id,
                latest_count
            );

            // Fixed cooldown between units regardless of outcome, to bound
            // request rate against the remote target
            if !self.policy.cooldown.is_zero() {
                tracing::debug!("Cooling down for {:?}", self.policy.cooldown);
                tokio::time::sleep(self.policy.cooldown).await;
            }
        }

        Ok(summary)
    }

    /// Best-effort session teardown
    pub async fn shutdown(&mut self) {
        self.session.close().await;
    }
}
