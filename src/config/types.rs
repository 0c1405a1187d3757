use serde::Deserialize;

/// Main configuration structure for Comment-Backfill
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub driver: DriverConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Platform label used in store file paths (e.g. "xhs")
    pub platform: String,

    /// Crawl-mode label used in store file paths
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Search keyword of the original collection run; part of the run label
    pub keyword: String,

    /// Optional date-range start (`YYYY-MM-DD`); part of the run label
    #[serde(rename = "start-date", default)]
    pub start_date: Option<String>,

    /// Optional date-range end (`YYYY-MM-DD`); part of the run label
    #[serde(rename = "end-date", default)]
    pub end_date: Option<String>,

    /// Base URL detail-page URLs are built against
    #[serde(rename = "explore-base-url", default = "default_explore_base_url")]
    pub explore_base_url: String,

    /// Whether the driver should also collect sub-comments
    #[serde(rename = "enable-sub-comments", default = "default_true")]
    pub enable_sub_comments: bool,

    /// Fixed pause between units, to bound request rate (seconds)
    #[serde(rename = "cooldown-secs", default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Maximum fetch attempts per unit when soft-blocked
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the linearly growing soft-block backoff (seconds)
    #[serde(rename = "backoff-base-secs", default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Error-message markers classified as soft blocks
    #[serde(rename = "block-markers", default = "default_block_markers")]
    pub block_markers: Vec<String>,
}

/// Crawl driver connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Base URL of the running crawl driver
    pub endpoint: String,

    /// Per-crawl request timeout (seconds); detail crawls can take minutes
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Path to the JSON array of posts to process
    #[serde(rename = "posts-path")]
    pub posts_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for record store files
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Path to the checkpoint ledger file
    #[serde(rename = "ledger-path")]
    pub ledger_path: String,

    /// Whether to also append CSV export rows for new records
    #[serde(rename = "enable-csv", default = "default_true")]
    pub enable_csv: bool,
}

fn default_mode() -> String {
    "detail".to_string()
}

fn default_explore_base_url() -> String {
    "https://www.xiaohongshu.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cooldown_secs() -> u64 {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_block_markers() -> Vec<String> {
    crate::crawler::default_block_markers()
}
