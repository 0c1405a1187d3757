//! Comment-Backfill main entry point
//!
//! This is the command-line interface for the Comment-Backfill collection runner.

use clap::Parser;
use comment_backfill::config::load_config_with_hash;
use comment_backfill::crawler::{Coordinator, RunSummary};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Comment-Backfill: a resumable comment collection runner
///
/// Comment-Backfill fetches comments for a previously-collected list of posts
/// through an external crawl driver. Per-post progress is checkpointed in a
/// durable ledger, so interrupted runs pick up exactly where they stopped.
#[derive(Parser, Debug)]
#[command(name = "comment-backfill")]
#[command(version = "1.0.0")]
#[command(about = "A resumable comment collection runner", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the remaining work without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show ledger and store statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

/// How the collection loop ended
enum RunExit {
    Finished(comment_backfill::Result<RunSummary>),
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, _config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_run(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("comment_backfill=info,warn"),
            1 => EnvFilter::new("comment_backfill=debug,info"),
            2 => EnvFilter::new("comment_backfill=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the remaining work
fn handle_dry_run(
    config: &comment_backfill::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    use comment_backfill::crawler::{load_work_units, open_ledger, remaining_units};
    use std::path::Path;

    println!("=== Comment-Backfill Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Platform: {}", config.crawl.platform);
    println!("  Mode: {}", config.crawl.mode);
    println!("  Keyword: {}", config.crawl.keyword);
    println!(
        "  Date range: {} to {}",
        config.crawl.start_date.as_deref().unwrap_or("-"),
        config.crawl.end_date.as_deref().unwrap_or("-")
    );
    println!("  Sub-comments: {}", config.crawl.enable_sub_comments);
    println!("  Cooldown: {}s", config.crawl.cooldown_secs);
    println!(
        "  Retries: {} (backoff base {}s)",
        config.crawl.max_retries, config.crawl.backoff_base_secs
    );

    println!("\nDriver:");
    println!("  Endpoint: {}", config.driver.endpoint);
    println!("  Timeout: {}s", config.driver.timeout_secs);

    println!("\nInput:");
    println!("  Posts file: {}", config.input.posts_path);

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  CSV export: {}", config.output.enable_csv);

    let units = load_work_units(Path::new(&config.input.posts_path))?;

    // A dry run never mutates on disk, so a corrupt ledger is reported
    // instead of being set aside
    let state = match open_ledger(config).load() {
        Ok(state) => state,
        Err(e) => {
            println!("\n! Ledger could not be read ({}); treating it as empty", e);
            Default::default()
        }
    };
    let completed = state.completed_ids();
    let remaining = remaining_units(&units, &completed);

    println!("\nWork:");
    println!("  Posts in input: {}", units.len());
    println!("  Already completed: {}", completed.len());
    println!("  Remaining: {}", remaining.len());
    for unit in remaining.iter().take(5) {
        println!("    - {}", unit.note_id);
    }
    if remaining.len() > 5 {
        println!("    ... and {} more", remaining.len() - 5);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would fetch comments for {} posts", remaining.len());

    Ok(())
}

/// Handles the --stats mode: shows ledger and store statistics
async fn handle_stats(
    config: &comment_backfill::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    use comment_backfill::crawler::{load_work_units, open_ledger, open_store};
    use comment_backfill::output::{load_statistics, print_statistics};
    use std::path::Path;

    println!("Ledger: {}\n", config.output.ledger_path);

    let units = load_work_units(Path::new(&config.input.posts_path))?;
    let ledger = open_ledger(config);
    let store = open_store(config);

    let stats = load_statistics(&ledger, &store, units.len()).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main collection run
///
/// Fetch failures and interrupts are reported in the closing banner but do
/// not change the exit code; the ledger is the source of truth for what
/// still remains.
async fn handle_run(
    config: &comment_backfill::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting collection run (resumes from ledger at {})",
        config.output.ledger_path
    );

    let mut coordinator = Coordinator::new(config)?;

    let exit = {
        let run = coordinator.resume();
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => RunExit::Finished(result),
            _ = tokio::signal::ctrl_c() => RunExit::Interrupted,
        }
    };

    match exit {
        RunExit::Finished(Ok(summary)) => {
            coordinator.shutdown().await;
            println!("\n=== Run Complete ===");
            println!("  Posts in input: {}", summary.total);
            println!("  Already completed: {}", summary.already_completed);
            println!("  Processed this run: {}", summary.processed);
            println!("  Completed: {}", summary.completed);
            println!("  Requeued (soft block): {}", summary.requeued);
            println!("  Skipped (unknown error): {}", summary.skipped);
            if summary.is_clean() {
                println!("\n✓ All processed posts completed");
            } else {
                println!("\n! Some posts did not complete; re-run to retry pending posts");
            }
        }
        RunExit::Finished(Err(e)) => {
            coordinator.shutdown().await;
            tracing::error!("Collection run failed: {}", e);
            println!("\n✗ Run failed: {}", e);
            println!("Progress up to the failure is persisted; re-run to resume.");
        }
        RunExit::Interrupted => {
            tracing::warn!("Interrupted by user, closing crawl session");
            coordinator.shutdown().await;
            println!("\nInterrupted. Progress is persisted; re-run to resume.");
        }
    }

    Ok(())
}
