//! Maintenance supervisor
//!
//! Owns the schedulers of every managed tablet and receives the events of
//! tasks that gave up. A quarantine stops that tablet's maintenance and takes
//! it out of the registry; a fatal event stops everything and is handed back
//! to the caller, which is expected to exit the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::config::{FailurePolicy, MaintenanceThresholds};
use crate::error::{Result, TabletError};
use crate::registry::TabletRegistry;
use crate::tablet::TabletHandle;

use super::{Clock, MaintenanceEvent, MaintenanceScheduler, SystemClock};

pub struct MaintenanceSupervisor {
    thresholds: MaintenanceThresholds,
    policy: FailurePolicy,
    clock: Arc<dyn Clock>,
    schedulers: Mutex<HashMap<String, MaintenanceScheduler>>,
    events_tx: Sender<MaintenanceEvent>,
    events_rx: Receiver<MaintenanceEvent>,
}

impl MaintenanceSupervisor {
    pub fn new(thresholds: MaintenanceThresholds, policy: FailurePolicy) -> Self {
        Self::with_clock(thresholds, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        thresholds: MaintenanceThresholds,
        policy: FailurePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events_tx, events_rx) = channel::unbounded();
        Self {
            thresholds,
            policy,
            clock,
            schedulers: Mutex::new(HashMap::new()),
            events_tx,
            events_rx,
        }
    }

    /// Start maintenance for a tablet
    pub fn manage(&self, tablet: Arc<dyn TabletHandle>) -> Result<()> {
        let tablet_id = tablet.tablet_id().to_string();
        let mut schedulers = self.schedulers.lock();
        if schedulers.contains_key(&tablet_id) {
            return Err(TabletError::InvalidState(format!(
                "maintenance for tablet {} is already running",
                tablet_id
            )));
        }

        let scheduler = MaintenanceScheduler::start(
            tablet,
            self.thresholds,
            self.policy,
            Arc::clone(&self.clock),
            self.events_tx.clone(),
        )?;
        schedulers.insert(tablet_id, scheduler);
        Ok(())
    }

    /// Stop one tablet's maintenance. Returns whether it was managed.
    pub fn stop_tablet(&self, tablet_id: &str) -> bool {
        // Join outside the lock: a task may be in the middle of a flush
        let scheduler = self.schedulers.lock().remove(tablet_id);
        match scheduler {
            Some(mut scheduler) => {
                scheduler.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every tablet's maintenance
    pub fn stop_all(&self) {
        let schedulers: Vec<MaintenanceScheduler> =
            self.schedulers.lock().drain().map(|(_, s)| s).collect();
        for mut scheduler in schedulers {
            scheduler.stop();
        }
    }

    /// Ids of tablets under maintenance, sorted
    pub fn managed_tablets(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schedulers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event(&self, timeout: Duration) -> Option<MaintenanceEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    /// Act on an event. Returns the error if it was fatal.
    pub fn handle_event(
        &self,
        event: MaintenanceEvent,
        registry: &TabletRegistry,
    ) -> Option<TabletError> {
        match event {
            MaintenanceEvent::Quarantined {
                tablet_id,
                task,
                error,
            } => {
                tracing::warn!(
                    tablet_id = %tablet_id,
                    task = %task,
                    error = %error,
                    "Stopping maintenance of quarantined tablet"
                );
                self.stop_tablet(&tablet_id);
                registry.quarantine(&tablet_id);
                None
            }
            MaintenanceEvent::Fatal {
                tablet_id,
                task,
                error,
            } => {
                tracing::error!(
                    tablet_id = %tablet_id,
                    task = %task,
                    error = %error,
                    "Fatal maintenance failure, stopping all maintenance"
                );
                self.stop_all();
                Some(error)
            }
        }
    }

    /// Handle events until one is fatal, and return its error
    pub fn run(&self, registry: &TabletRegistry) -> TabletError {
        loop {
            let event = match self.events_rx.recv() {
                Ok(event) => event,
                Err(e) => return TabletError::InvalidState(format!("event channel closed: {}", e)),
            };
            if let Some(error) = self.handle_event(event, registry) {
                return error;
            }
        }
    }
}

impl Drop for MaintenanceSupervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}
