//! Comment-Backfill: a resumable comment collection runner
//!
//! This crate resumes a long-running batch job that fetches comments for a
//! large list of previously-collected posts. It checkpoints per-post progress
//! in a durable ledger, deduplicates persisted records, and classifies fetch
//! failures so soft blocks are retried with backoff while completed work is
//! never refetched across process restarts.

pub mod config;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod state;
pub mod store;

use thiserror::Error;

/// Main error type for Comment-Backfill operations
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Session error: {0}")]
    Session(#[from] crawler::SessionError),

    #[error("Malformed input file {path}: {message}")]
    MalformedInput { path: String, message: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Comment-Backfill operations
pub type Result<T> = std::result::Result<T, BackfillError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlSession, FetchTarget, RetryPolicy, WorkUnit};
pub use ledger::CheckpointLedger;
pub use state::CrawlStatus;
pub use store::{RecordKind, RecordStore, WriteOutcome};
