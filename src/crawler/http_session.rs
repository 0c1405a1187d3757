//! HTTP adapter for a locally running crawl driver
//!
//! The driver exposes two endpoints: `POST /crawl` runs one detail crawl and
//! returns the fetched records, `POST /session/close` tears the browser
//! session down. Non-success responses carry the driver's error content in
//! the body; that text is what the controller classifies for soft blocks.

use crate::crawler::session::{CrawlSession, FetchTarget, FetchedRecords, SessionError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// One crawl job as submitted to the driver
#[derive(Debug, Serialize)]
struct CrawlJob<'a> {
    crawler_type: &'static str,
    specified_note_urls: Vec<&'a str>,
    enable_get_comments: bool,
    enable_get_sub_comments: bool,
}

/// `CrawlSession` implementation backed by an HTTP crawl driver
pub struct HttpSession {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpSession {
    /// Creates a session adapter for the driver at `endpoint`
    ///
    /// The timeout applies per crawl request; a detail crawl with comments
    /// can legitimately take minutes, so callers configure it generously.
    pub fn new(endpoint: Url, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }

    fn route(&self, path: &str) -> Result<Url, SessionError> {
        self.endpoint
            .join(path)
            .map_err(|e| SessionError::Transport(format!("invalid driver route '{}': {}", path, e)))
    }
}

#[async_trait]
impl CrawlSession for HttpSession {
    async fn start(&mut self, target: &FetchTarget) -> Result<FetchedRecords, SessionError> {
        let job = CrawlJob {
            crawler_type: "detail",
            specified_note_urls: vec![target.note_url.as_str()],
            enable_get_comments: target.enable_comments,
            enable_get_sub_comments: target.enable_sub_comments,
        };

        let url = self.route("crawl")?;
        tracing::debug!("Submitting crawl job for note {} to {}", target.note_id, url);

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&job)
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // The body is the driver's error content (captcha notices, rate
            // limit messages); keep it verbatim for classification.
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Driver(format!("{}: {}", status, body)));
        }

        response
            .json::<FetchedRecords>()
            .await
            .map_err(|e| SessionError::Transport(format!("invalid driver response: {}", e)))
    }

    async fn close(&mut self) {
        let url = match self.route("session/close") {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping session close: {}", e);
                return;
            }
        };

        match self.client.post(url).send().await {
            Ok(_) => tracing::debug!("Crawl driver session closed"),
            Err(e) => tracing::debug!("Session close failed (ignored): {}", e),
        }
    }
}
