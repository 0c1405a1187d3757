//! Crawler module for driving the external fetch capability
//!
//! This module contains the collection logic built around an opaque crawl
//! session, including:
//! - Work-unit loading and per-unit fetch targets
//! - The `CrawlSession` capability trait and its HTTP driver adapter
//! - Soft-block classification and the per-unit retry/backoff controller
//! - Overall orchestration of the resumable run

mod classify;
mod controller;
mod coordinator;
mod http_session;
mod session;
mod units;

pub use classify::{classify_failure, default_block_markers, FailureKind};
pub use controller::{RetryPolicy, UnitController, UnitOutcome};
pub use coordinator::{open_ledger, open_store, remaining_units, Coordinator, RunSummary};
pub use http_session::HttpSession;
pub use session::{CrawlSession, FetchTarget, FetchedRecords, SessionError, SessionFactory};
pub use units::{load_work_units, WorkUnit};
