//! State module for tracking per-unit crawl progress
//!
//! A work unit (one post whose comments must be fetched) moves through a
//! small status machine that is persisted in the checkpoint ledger:
//!
//! - `Pending`: not yet attempted, or explicitly requeued after soft blocks
//! - `InProgress`: fetch started; a crash here leaves a detectable marker
//! - `Completed`: child records durably persisted, never re-selected

mod crawl_status;

pub use crawl_status::CrawlStatus;
