//! Tests for Config and maintenance thresholds
//!
//! These tests verify:
//! - Defaults (64 MB, 250 ms poll, 3000 ms compaction)
//! - Megabyte to byte conversion
//! - The strictly-greater flush trigger
//! - Rejection of unusable thresholds
//! - Failure policy decisions

use std::time::Duration;

use tabletd::config::{
    FailureAction, LogSyncStrategy, BYTES_PER_MB, DEFAULT_COMPACT_INTERVAL,
    DEFAULT_FLUSH_POLL_INTERVAL, DEFAULT_FLUSH_THRESHOLD_MB,
};
use tabletd::{Config, FailurePolicy, MaintenanceThresholds, TabletError};

// =============================================================================
// Defaults
// =============================================================================

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.flush_threshold_mb, 64);
    assert_eq!(config.flush_poll_interval, Duration::from_millis(250));
    assert_eq!(config.compact_interval, Duration::from_millis(3000));
    assert_eq!(config.failure_policy, FailurePolicy::Escalate);
    assert_eq!(
        config.log_sync_strategy,
        LogSyncStrategy::EveryNEntries { count: 100 }
    );
}

#[test]
fn test_default_thresholds() {
    let thresholds = Config::default().maintenance_thresholds().unwrap();

    assert_eq!(thresholds.flush_threshold_bytes(), 64 * 1_048_576);
    assert_eq!(thresholds.flush_poll_interval(), DEFAULT_FLUSH_POLL_INTERVAL);
    assert_eq!(thresholds.compact_interval(), DEFAULT_COMPACT_INTERVAL);
    assert_eq!(DEFAULT_FLUSH_THRESHOLD_MB, 64);
}

#[test]
fn test_builder() {
    let config = Config::builder()
        .data_dir("/tmp/somewhere")
        .flush_threshold_mb(8)
        .flush_poll_interval(Duration::from_millis(10))
        .compact_interval(Duration::from_millis(20))
        .failure_policy(FailurePolicy::Quarantine)
        .log_sync_strategy(LogSyncStrategy::EveryWrite)
        .build();

    assert_eq!(config.data_dir.to_str(), Some("/tmp/somewhere"));
    let thresholds = config.maintenance_thresholds().unwrap();
    assert_eq!(thresholds.flush_threshold_bytes(), 8 * BYTES_PER_MB);
    assert_eq!(thresholds.flush_poll_interval(), Duration::from_millis(10));
    assert_eq!(thresholds.compact_interval(), Duration::from_millis(20));
    assert_eq!(config.failure_policy, FailurePolicy::Quarantine);
}

// =============================================================================
// Flush Trigger
// =============================================================================

#[test]
fn test_should_flush_is_strictly_greater() {
    let thresholds = MaintenanceThresholds::from_megabytes(64).unwrap();
    let threshold = 64 * BYTES_PER_MB;

    assert!(!thresholds.should_flush(0));
    assert!(!thresholds.should_flush(threshold - 1));
    assert!(!thresholds.should_flush(threshold));
    assert!(thresholds.should_flush(threshold + 1));
}

#[test]
fn test_one_megabyte_threshold() {
    let thresholds = MaintenanceThresholds::from_megabytes(1).unwrap();
    assert!(!thresholds.should_flush(1_048_576));
    assert!(thresholds.should_flush(1_048_577));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_zero_threshold_rejected() {
    let result = MaintenanceThresholds::from_megabytes(0);
    assert!(matches!(result, Err(TabletError::Config(_))));
}

#[test]
fn test_zero_interval_rejected() {
    let result = MaintenanceThresholds::new(1, Duration::ZERO, Duration::from_millis(1));
    assert!(matches!(result, Err(TabletError::Config(_))));

    let result = MaintenanceThresholds::new(1, Duration::from_millis(1), Duration::ZERO);
    assert!(matches!(result, Err(TabletError::Config(_))));
}

#[test]
fn test_overflowing_threshold_rejected() {
    let config = Config::builder().flush_threshold_mb(usize::MAX).build();
    assert!(matches!(
        config.maintenance_thresholds(),
        Err(TabletError::Config(_))
    ));
}

// =============================================================================
// Failure Policy
// =============================================================================

#[test]
fn test_escalate_policy() {
    let policy = FailurePolicy::default();
    assert_eq!(policy.decide(1), FailureAction::Escalate);
}

#[test]
fn test_retry_policy_escalates_after_max_attempts() {
    let policy = FailurePolicy::Retry { max_attempts: 3 };
    assert_eq!(policy.decide(1), FailureAction::Retry);
    assert_eq!(policy.decide(2), FailureAction::Retry);
    assert_eq!(policy.decide(3), FailureAction::Escalate);
}

#[test]
fn test_retry_policy_with_zero_attempts_escalates() {
    let policy = FailurePolicy::Retry { max_attempts: 0 };
    assert_eq!(policy.decide(1), FailureAction::Escalate);
}

#[test]
fn test_retry_tolerates_max_retries_failures() {
    let policy = FailurePolicy::retry(3);
    assert_eq!(policy, FailurePolicy::Retry { max_attempts: 4 });
    assert_eq!(policy.decide(3), FailureAction::Retry);
    assert_eq!(policy.decide(4), FailureAction::Escalate);
}

#[test]
fn test_retry_with_zero_retries_escalates_first_failure() {
    assert_eq!(FailurePolicy::retry(0).decide(1), FailureAction::Escalate);
    assert_eq!(
        FailurePolicy::retry(u32::MAX),
        FailurePolicy::Retry {
            max_attempts: u32::MAX
        }
    );
}

#[test]
fn test_quarantine_policy() {
    assert_eq!(FailurePolicy::Quarantine.decide(1), FailureAction::Quarantine);
}
