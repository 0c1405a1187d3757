/// Crawl status definitions for checkpointed work units
///
/// This module defines the statuses a work unit can hold in the ledger file.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the checkpointed status of one work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Unit has not been attempted yet, or was requeued after exhausting
    /// soft-block retries. Absent ledger entries default to this status.
    Pending,

    /// Fetch has started for this unit. Written to the ledger *before* the
    /// session is invoked, so a crash mid-fetch leaves a non-terminal marker.
    InProgress,

    /// Child records for this unit are durably persisted in the record store.
    /// Completed units are excluded from future runs' remaining-work set.
    Completed,
}

impl CrawlStatus {
    /// Returns true if this is a terminal status (unit will not be re-selected)
    ///
    /// Only `Completed` is terminal: every non-completed unit stays eligible
    /// for a future run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Converts the status to its ledger string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parses a status from its ledger string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 3] {
        [Self::Pending, Self::InProgress, Self::Completed]
    }
}

impl Default for CrawlStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!CrawlStatus::Pending.is_terminal());
        assert!(!CrawlStatus::InProgress.is_terminal());
        assert!(CrawlStatus::Completed.is_terminal());
    }

    #[test]
    fn test_default_is_pending() {
        assert_eq!(CrawlStatus::default(), CrawlStatus::Pending);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(CrawlStatus::Pending.as_str(), "pending");
        assert_eq!(CrawlStatus::InProgress.as_str(), "in_progress");
        assert_eq!(CrawlStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_from_str_opt() {
        assert_eq!(
            CrawlStatus::from_str_opt("pending"),
            Some(CrawlStatus::Pending)
        );
        assert_eq!(
            CrawlStatus::from_str_opt("in_progress"),
            Some(CrawlStatus::InProgress)
        );
        assert_eq!(
            CrawlStatus::from_str_opt("completed"),
            Some(CrawlStatus::Completed)
        );
        assert_eq!(CrawlStatus::from_str_opt("abandoned"), None);
    }

    #[test]
    fn test_roundtrip_str() {
        for status in CrawlStatus::all() {
            let parsed = CrawlStatus::from_str_opt(status.as_str());
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
    }

    #[test]
    fn test_serde_representation() {
        // The ledger file stores statuses as snake_case strings
        assert_eq!(
            serde_json::to_string(&CrawlStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::from_str::<CrawlStatus>("\"completed\"").unwrap(),
            CrawlStatus::Completed
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", CrawlStatus::Pending), "pending");
        assert_eq!(format!("{}", CrawlStatus::InProgress), "in_progress");
    }
}
