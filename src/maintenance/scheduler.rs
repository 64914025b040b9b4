//! Per-tablet maintenance scheduler.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Sender;

use crate::config::{FailurePolicy, MaintenanceThresholds};
use crate::error::Result;
use crate::tablet::TabletHandle;

use super::{run_task, Clock, CompactTask, FlushTask, MaintenanceEvent, MaintenanceTask, StopSignal};

/// Runs the flush and compact tasks of one tablet on two dedicated threads
pub struct MaintenanceScheduler {
    tablet_id: String,
    stop: StopSignal,
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    /// Spawn both task threads.
    ///
    /// Returns `Err` if a thread cannot be spawned; any thread already
    /// started is stopped again first.
    pub fn start(
        tablet: Arc<dyn TabletHandle>,
        thresholds: MaintenanceThresholds,
        policy: FailurePolicy,
        clock: Arc<dyn Clock>,
        events: Sender<MaintenanceEvent>,
    ) -> Result<Self> {
        let tablet_id = tablet.tablet_id().to_string();
        let mut scheduler = Self {
            tablet_id: tablet_id.clone(),
            stop: StopSignal::new(),
            handles: Vec::with_capacity(2),
        };

        let compact = CompactTask::new(Arc::clone(&tablet), thresholds);
        scheduler.spawn(compact, policy, Arc::clone(&clock), events.clone())?;

        let flush = FlushTask::new(tablet, thresholds);
        scheduler.spawn(flush, policy, clock, events)?;

        tracing::info!(
            tablet_id = %tablet_id,
            flush_threshold_bytes = thresholds.flush_threshold_bytes(),
            "Maintenance scheduler started"
        );
        Ok(scheduler)
    }

    fn spawn<T: MaintenanceTask>(
        &mut self,
        task: T,
        policy: FailurePolicy,
        clock: Arc<dyn Clock>,
        events: Sender<MaintenanceEvent>,
    ) -> Result<()> {
        let name = format!("{}-{}", task.kind(), self.tablet_id);
        let tablet_id = self.tablet_id.clone();
        let stop = self.stop.clone();

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run_task(task, &tablet_id, policy, clock, stop, events))
            .map_err(|e| {
                tracing::error!(
                    tablet_id = %self.tablet_id,
                    error = %e,
                    "Failed to spawn maintenance thread"
                );
                e
            })?;

        self.handles.push(handle);
        Ok(())
    }

    /// Signal both tasks to stop and wait for them to finish
    pub fn stop(&mut self) {
        self.stop.stop();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!(tablet_id = %self.tablet_id, "Maintenance thread panicked");
            }
        }
    }

    /// Whether any task thread is still running
    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    pub fn tablet_id(&self) -> &str {
        &self.tablet_id
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
