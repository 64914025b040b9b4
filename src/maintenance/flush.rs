//! Flush task.

use std::sync::Arc;
use std::time::Duration;

use crate::config::MaintenanceThresholds;
use crate::error::Result;
use crate::tablet::TabletHandle;

use super::{MaintenanceTask, TaskKind};

/// Flushes a tablet's mem row set once it grows past the threshold
pub struct FlushTask {
    tablet: Arc<dyn TabletHandle>,
    thresholds: MaintenanceThresholds,
}

impl FlushTask {
    pub fn new(tablet: Arc<dyn TabletHandle>, thresholds: MaintenanceThresholds) -> Self {
        Self { tablet, thresholds }
    }
}

impl MaintenanceTask for FlushTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Flush
    }

    fn interval(&self) -> Duration {
        self.thresholds.flush_poll_interval()
    }

    fn run_once(&self) -> Result<bool> {
        let usage = self.tablet.mem_rowset_size();
        let threshold = self.thresholds.flush_threshold_bytes();

        if !self.thresholds.should_flush(usage) {
            tracing::trace!(
                tablet_id = self.tablet.tablet_id(),
                usage,
                threshold,
                "Not flushing, mem row set not very full"
            );
            return Ok(false);
        }

        tracing::debug!(
            tablet_id = self.tablet.tablet_id(),
            usage,
            threshold,
            "Flushing mem row set"
        );
        self.tablet.flush()?;
        Ok(true)
    }
}
