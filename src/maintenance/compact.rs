//! Compact task.

use std::sync::Arc;
use std::time::Duration;

use crate::config::MaintenanceThresholds;
use crate::error::Result;
use crate::tablet::{CompactFlags, TabletHandle};

use super::{MaintenanceTask, TaskKind};

/// Compacts a tablet on a fixed cadence, with no size or fragmentation check
pub struct CompactTask {
    tablet: Arc<dyn TabletHandle>,
    interval: Duration,
}

impl CompactTask {
    pub fn new(tablet: Arc<dyn TabletHandle>, thresholds: MaintenanceThresholds) -> Self {
        Self {
            tablet,
            interval: thresholds.compact_interval(),
        }
    }
}

impl MaintenanceTask for CompactTask {
    fn kind(&self) -> TaskKind {
        TaskKind::Compact
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn run_once(&self) -> Result<bool> {
        tracing::trace!(tablet_id = self.tablet.tablet_id(), "Compacting");
        self.tablet.compact(CompactFlags::NO_FLAGS)?;
        Ok(true)
    }
}
