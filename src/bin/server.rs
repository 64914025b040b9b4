//! tabletd Server Binary
//!
//! Bootstraps every tablet in the catalog, then runs their maintenance until
//! a failure is escalated. Any bootstrap or escalated maintenance failure
//! exits the process with status 1.

use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tabletd::catalog::{TabletCatalog, TabletDescriptor};
use tabletd::config::LogSyncStrategy;
use tabletd::schema::twitter_demo_schema;
use tabletd::{Config, FailurePolicy, MasterBlock, TabletServer};
use tracing_subscriber::{fmt, EnvFilter};

/// tabletd Server
#[derive(Parser, Debug)]
#[command(name = "tabletd-server")]
#[command(about = "Tablet server: bootstraps tablets and maintains them in the background")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tabletd_data")]
    data_dir: String,

    /// Minimum mem row set size (MB) to flush
    #[arg(short = 'm', long, default_value = "64")]
    flush_threshold_mb: usize,

    /// Delay between memory usage checks (milliseconds)
    #[arg(long, default_value = "250")]
    flush_poll_ms: u64,

    /// Delay between compactions (milliseconds)
    #[arg(long, default_value = "3000")]
    compact_interval_ms: u64,

    /// What to do when a flush or compaction fails
    #[arg(long, value_enum, default_value_t = PolicyArg::Escalate)]
    failure_policy: PolicyArg,

    /// Consecutive failures tolerated by the retry policy
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// When to fsync the write-ahead log
    #[arg(long, value_enum, default_value_t = LogSyncArg::EveryN)]
    log_sync: LogSyncArg,

    /// Unsynced log entries allowed with `--log-sync every-n`
    #[arg(long, default_value = "100")]
    log_sync_count: usize,

    /// Add the demo "twitter" tablet if the catalog is empty
    #[arg(long)]
    create_demo_tablet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Escalate,
    Retry,
    Quarantine,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogSyncArg {
    EveryWrite,
    EveryN,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tabletd=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();

    let args = Args::parse();

    tracing::info!("tabletd Server v{}", tabletd::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let failure_policy = match args.failure_policy {
        PolicyArg::Escalate => FailurePolicy::Escalate,
        PolicyArg::Retry => FailurePolicy::retry(args.max_retries),
        PolicyArg::Quarantine => FailurePolicy::Quarantine,
    };
    let log_sync_strategy = match args.log_sync {
        LogSyncArg::EveryWrite => LogSyncStrategy::EveryWrite,
        LogSyncArg::EveryN => LogSyncStrategy::EveryNEntries {
            count: args.log_sync_count,
        },
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .flush_threshold_mb(args.flush_threshold_mb)
        .flush_poll_interval(Duration::from_millis(args.flush_poll_ms))
        .compact_interval(Duration::from_millis(args.compact_interval_ms))
        .failure_policy(failure_policy)
        .log_sync_strategy(log_sync_strategy)
        .build();

    let mut server = match TabletServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    tracing::info!("Initializing tablet server...");
    if let Err(e) = server.init() {
        tracing::error!("Failed to initialize tablet server: {}", e);
        process::exit(1);
    }

    let catalog = match load_catalog(&server, args.create_demo_tablet) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load catalog: {}", e);
            process::exit(1);
        }
    };

    tracing::info!("Bootstrapping {} tablet(s)...", catalog.len());
    if let Err(e) = server.bootstrap_catalog(&catalog) {
        tracing::error!("Bootstrap failed: {}", e);
        process::exit(1);
    }

    tracing::info!("Starting flush/compact threads");
    if let Err(e) = server.start_maintenance() {
        tracing::error!("Failed to start maintenance: {}", e);
        process::exit(1);
    }

    tracing::info!("Tablet server successfully started.");

    let error = server.run_until_fatal();
    tracing::error!("Fatal maintenance failure: {}", error);
    process::exit(1);
}

/// Load the catalog, seeding the demo tablet if asked to and it is empty
fn load_catalog(server: &TabletServer, create_demo: bool) -> tabletd::Result<TabletCatalog> {
    let mut catalog = TabletCatalog::load(&server.fs().catalog_path())?;

    if catalog.is_empty() && create_demo {
        tracing::info!("Setting up demo tablet...");
        let master_block = MasterBlock::new(
            "twitter",
            "00000000000000000000000000000000",
            "11111111111111111111111111111111",
        );
        catalog.add(TabletDescriptor::new(master_block, twitter_demo_schema()))?;
        catalog.save()?;
    }

    Ok(catalog)
}
