//! The external fetch capability boundary
//!
//! The actual network fetching and anti-bot evasion live in a separate crawl
//! driver. This crate only starts one configured crawl at a time and closes
//! the session; everything the driver does in between is opaque.

use crate::store::Record;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Per-call fetch configuration for one work unit
///
/// Passed into `CrawlSession::start` as a value, so one fetch never mutates
/// shared configuration that has to be saved and restored.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    /// The parent post identifier
    pub note_id: String,

    /// Full detail-page URL, including access token parameters
    pub note_url: String,

    /// Whether the driver should collect comments
    pub enable_comments: bool,

    /// Whether the driver should also collect sub-comments
    pub enable_sub_comments: bool,
}

/// Records returned by one crawl pass
#[derive(Debug, Default, Deserialize)]
pub struct FetchedRecords {
    /// Parent records (the post itself)
    #[serde(default)]
    pub contents: Vec<Record>,

    /// Child records (comments and sub-comments)
    #[serde(default)]
    pub comments: Vec<Record>,
}

/// Errors surfaced by a crawl session
///
/// The message text is what the retry controller classifies: the driver
/// reports blocks (captcha pages, verification challenges, rate limiting) as
/// part of its error content.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("crawl driver rejected the job: {0}")]
    Driver(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Opaque crawl capability: run one configured crawl, release on close
#[async_trait]
pub trait CrawlSession: Send {
    /// Runs one crawl for the given target and returns the fetched records
    async fn start(&mut self, target: &FetchTarget) -> Result<FetchedRecords, SessionError>;

    /// Releases session resources; best-effort, must not fail the caller
    async fn close(&mut self);
}

/// Constructs fresh sessions, used when a soft block forces a session reset
pub type SessionFactory = Box<dyn Fn() -> Box<dyn CrawlSession> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_records_deserialize_defaults() {
        let records: FetchedRecords = serde_json::from_str("{}").unwrap();
        assert!(records.contents.is_empty());
        assert!(records.comments.is_empty());
    }

    #[test]
    fn test_fetched_records_deserialize_payload() {
        let records: FetchedRecords = serde_json::from_str(
            r#"{
                "contents": [{"note_id": "N1", "title": "t"}],
                "comments": [{"comment_id": "c1", "note_id": "N1"}]
            }"#,
        )
        .unwrap();
        assert_eq!(records.contents.len(), 1);
        assert_eq!(records.comments.len(), 1);
    }

    #[test]
    fn test_session_error_messages_carry_driver_content() {
        let err = SessionError::Driver("captcha required".to_string());
        assert!(err.to_string().contains("captcha required"));
    }
}
