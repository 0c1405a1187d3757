//! Output module for reporting collection progress
//!
//! This module handles:
//! - Summarizing the checkpoint ledger and record store
//! - Printing statistics for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, BackfillStatistics};
