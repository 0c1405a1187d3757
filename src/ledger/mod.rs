//! Checkpoint ledger for crash-safe resume
//!
//! The ledger is a single JSON document mapping each work-unit id to its
//! crawl status and the child-record ids collected so far. It is reloaded
//! from disk on every mutation rather than kept purely in memory: a crash
//! between saves loses at most the in-flight unit's progress, never
//! previously committed units.

mod checkpoint;

pub use checkpoint::{CheckpointEntry, CheckpointLedger, Ledger, LedgerError};
