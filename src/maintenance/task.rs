//! The loop shared by every maintenance task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::config::{FailureAction, FailurePolicy};
use crate::error::{Result, TabletError};

use super::{Clock, StopSignal};

/// Which maintenance task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Flush,
    Compact,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Flush => f.write_str("flush"),
            TaskKind::Compact => f.write_str("compact"),
        }
    }
}

/// Reported by a task that stopped because of a failure
#[derive(Debug)]
pub enum MaintenanceEvent {
    /// The tablet should be taken out of service
    Quarantined {
        tablet_id: String,
        task: TaskKind,
        error: TabletError,
    },

    /// The process should exit
    Fatal {
        tablet_id: String,
        task: TaskKind,
        error: TabletError,
    },
}

impl MaintenanceEvent {
    pub fn tablet_id(&self) -> &str {
        match self {
            MaintenanceEvent::Quarantined { tablet_id, .. }
            | MaintenanceEvent::Fatal { tablet_id, .. } => tablet_id,
        }
    }

    pub fn task(&self) -> TaskKind {
        match self {
            MaintenanceEvent::Quarantined { task, .. } | MaintenanceEvent::Fatal { task, .. } => {
                *task
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, MaintenanceEvent::Fatal { .. })
    }
}

/// One periodic maintenance job
pub trait MaintenanceTask: Send + 'static {
    fn kind(&self) -> TaskKind;

    /// Delay between the end of one cycle and the start of the next
    fn interval(&self) -> Duration;

    /// Run one cycle; `Ok(true)` if it did any work
    fn run_once(&self) -> Result<bool>;
}

/// Run `task` until `stop` fires or a failure makes it give up.
///
/// Each cycle runs first, then the task waits its interval.
pub fn run_task<T: MaintenanceTask>(
    task: T,
    tablet_id: &str,
    policy: FailurePolicy,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    events: Sender<MaintenanceEvent>,
) {
    let kind = task.kind();
    let interval = task.interval();
    let mut consecutive_failures = 0u32;

    tracing::info!(
        tablet_id,
        task = %kind,
        interval_ms = interval.as_millis() as u64,
        "Maintenance task started"
    );

    while !stop.is_stopped() {
        match task.run_once() {
            Ok(_) => consecutive_failures = 0,
            Err(error) => {
                consecutive_failures += 1;
                match policy.decide(consecutive_failures) {
                    FailureAction::Retry => {
                        tracing::warn!(
                            tablet_id,
                            task = %kind,
                            consecutive_failures,
                            error = %error,
                            "Maintenance cycle failed, retrying next cycle"
                        );
                    }
                    FailureAction::Quarantine => {
                        tracing::error!(
                            tablet_id,
                            task = %kind,
                            error = %error,
                            "Maintenance failed, quarantining tablet"
                        );
                        report(
                            &events,
                            MaintenanceEvent::Quarantined {
                                tablet_id: tablet_id.to_string(),
                                task: kind,
                                error,
                            },
                        );
                        return;
                    }
                    FailureAction::Escalate => {
                        tracing::error!(
                            tablet_id,
                            task = %kind,
                            consecutive_failures,
                            error = %error,
                            "Maintenance failed, escalating"
                        );
                        report(
                            &events,
                            MaintenanceEvent::Fatal {
                                tablet_id: tablet_id.to_string(),
                                task: kind,
                                error,
                            },
                        );
                        return;
                    }
                }
            }
        }

        if clock.sleep(interval, &stop) {
            break;
        }
    }

    tracing::info!(tablet_id, task = %kind, "Maintenance task stopped");
}

/// Hand an event to the supervisor, logging it if nobody is listening
fn report(events: &Sender<MaintenanceEvent>, event: MaintenanceEvent) {
    if let Err(err) = events.send(event) {
        let event = err.into_inner();
        tracing::error!(
            tablet_id = event.tablet_id(),
            task = %event.task(),
            fatal = event.is_fatal(),
            event = ?event,
            "Supervisor gone, maintenance event dropped"
        );
    }
}
