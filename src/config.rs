//! Configuration for tabletd
//!
//! Centralized configuration with sensible defaults. The maintenance knobs are
//! validated into a [`MaintenanceThresholds`] value that is handed to each
//! scheduler at construction.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TabletError};

/// Bytes per configured megabyte
pub const BYTES_PER_MB: usize = 1024 * 1024;

/// Default flush trigger size in megabytes
pub const DEFAULT_FLUSH_THRESHOLD_MB: usize = 64;

/// Default delay between two memory usage checks of the flush task
pub const DEFAULT_FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default delay between two compactions of the compact task
pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_millis(3000);

/// Main configuration for a tablet server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all server files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── catalog          (tablets hosted by this server)
    ///     ├── tablet-meta/     (superblocks, named by master block ids)
    ///     ├── data/{tablet}/   (disk row sets)
    ///     └── wals/{tablet}/   (write-ahead logs)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the write-ahead log
    pub log_sync_strategy: LogSyncStrategy,

    // -------------------------------------------------------------------------
    // Maintenance Configuration
    // -------------------------------------------------------------------------
    /// Mem row set size (in MB) above which the flush task flushes
    pub flush_threshold_mb: usize,

    /// Delay between memory usage checks
    pub flush_poll_interval: Duration,

    /// Delay between compactions
    pub compact_interval: Duration,

    /// What a maintenance task does when flush/compact fails
    pub failure_policy: FailurePolicy,
}

/// Write-ahead log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced appends
    EveryNEntries { count: usize },
}

/// Decision a maintenance task takes after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the task and escalate to process exit
    #[default]
    Escalate,

    /// Keep cycling; escalate after `max_attempts` consecutive failures
    Retry { max_attempts: u32 },

    /// Stop maintenance for this tablet and take it out of service
    Quarantine,
}

/// What a task should do for one particular failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Retry,
    Quarantine,
    Escalate,
}

impl FailurePolicy {
    /// Retry policy that tolerates `max_retries` consecutive failures and
    /// escalates on the next one
    pub fn retry(max_retries: u32) -> Self {
        FailurePolicy::Retry {
            max_attempts: max_retries.saturating_add(1),
        }
    }

    /// Decide what to do after `consecutive_failures` failed cycles in a row
    pub fn decide(&self, consecutive_failures: u32) -> FailureAction {
        match *self {
            FailurePolicy::Escalate => FailureAction::Escalate,
            FailurePolicy::Retry { max_attempts } if consecutive_failures < max_attempts => {
                FailureAction::Retry
            }
            FailurePolicy::Retry { .. } => FailureAction::Escalate,
            FailurePolicy::Quarantine => FailureAction::Quarantine,
        }
    }
}

/// Thresholds and cadences driving one tablet's maintenance tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceThresholds {
    flush_threshold_bytes: usize,
    flush_poll_interval: Duration,
    compact_interval: Duration,
}

impl MaintenanceThresholds {
    /// Build thresholds from explicit values.
    ///
    /// Fails if the flush threshold is zero or either interval is zero.
    pub fn new(
        flush_threshold_bytes: usize,
        flush_poll_interval: Duration,
        compact_interval: Duration,
    ) -> Result<Self> {
        if flush_threshold_bytes == 0 {
            return Err(TabletError::Config(
                "flush threshold must be greater than zero".to_string(),
            ));
        }
        if flush_poll_interval.is_zero() || compact_interval.is_zero() {
            return Err(TabletError::Config(
                "maintenance intervals must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            flush_threshold_bytes,
            flush_poll_interval,
            compact_interval,
        })
    }

    /// Build thresholds from a megabyte flush trigger and the default cadences
    pub fn from_megabytes(flush_threshold_mb: usize) -> Result<Self> {
        Self::new(
            megabytes_to_bytes(flush_threshold_mb)?,
            DEFAULT_FLUSH_POLL_INTERVAL,
            DEFAULT_COMPACT_INTERVAL,
        )
    }

    pub fn flush_threshold_bytes(&self) -> usize {
        self.flush_threshold_bytes
    }

    pub fn flush_poll_interval(&self) -> Duration {
        self.flush_poll_interval
    }

    pub fn compact_interval(&self) -> Duration {
        self.compact_interval
    }

    /// Whether a mem row set of `usage` bytes must be flushed (strictly above)
    pub fn should_flush(&self, usage: usize) -> bool {
        usage > self.flush_threshold_bytes
    }
}

fn megabytes_to_bytes(mb: usize) -> Result<usize> {
    mb.checked_mul(BYTES_PER_MB).ok_or_else(|| {
        TabletError::Config(format!("flush threshold of {} MB overflows", mb))
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tabletd_data"),
            log_sync_strategy: LogSyncStrategy::EveryNEntries { count: 100 },
            flush_threshold_mb: DEFAULT_FLUSH_THRESHOLD_MB,
            flush_poll_interval: DEFAULT_FLUSH_POLL_INTERVAL,
            compact_interval: DEFAULT_COMPACT_INTERVAL,
            failure_policy: FailurePolicy::Escalate,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate the maintenance settings into thresholds
    pub fn maintenance_thresholds(&self) -> Result<MaintenanceThresholds> {
        MaintenanceThresholds::new(
            megabytes_to_bytes(self.flush_threshold_mb)?,
            self.flush_poll_interval,
            self.compact_interval,
        )
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn log_sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.log_sync_strategy = strategy;
        self
    }

    /// Set the flush trigger (in MB)
    pub fn flush_threshold_mb(mut self, mb: usize) -> Self {
        self.config.flush_threshold_mb = mb;
        self
    }

    /// Set the delay between memory usage checks
    pub fn flush_poll_interval(mut self, interval: Duration) -> Self {
        self.config.flush_poll_interval = interval;
        self
    }

    /// Set the delay between compactions
    pub fn compact_interval(mut self, interval: Duration) -> Self {
        self.config.compact_interval = interval;
        self
    }

    /// Set the maintenance failure policy
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
