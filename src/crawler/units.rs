//! Work-unit input list
//!
//! A work unit is one previously-collected post whose comments must be
//! fetched. Units originate from a JSON array written by an earlier
//! collection run and are immutable during a run.

use crate::BackfillError;
use serde::Deserialize;
use std::path::Path;
use url::Url;

/// One parent post to process
#[derive(Debug, Clone, Deserialize)]
pub struct WorkUnit {
    /// Unique post identifier
    pub note_id: String,

    /// Access token required by the remote platform for detail pages
    #[serde(default)]
    pub xsec_token: String,

    /// Source tag accompanying the token
    #[serde(default)]
    pub xsec_source: String,
}

impl WorkUnit {
    /// Builds the full detail-page URL for this unit
    ///
    /// The token and source tag are always carried as query parameters; the
    /// driver needs them even when empty.
    pub fn explore_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        let mut url = base.join(&format!("explore/{}", self.note_id))?;
        url.query_pairs_mut()
            .append_pair("xsec_token", &self.xsec_token)
            .append_pair("xsec_source", &self.xsec_source);
        Ok(url)
    }
}

/// Loads the work-unit list from a JSON array file
///
/// Unlike store and ledger files, the input list is a prerequisite: a
/// missing or malformed file aborts the run instead of degrading.
pub fn load_work_units(path: &Path) -> crate::Result<Vec<WorkUnit>> {
    let content = std::fs::read_to_string(path)?;
    let units: Vec<WorkUnit> =
        serde_json::from_str(&content).map_err(|e| BackfillError::MalformedInput {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(units)
}
