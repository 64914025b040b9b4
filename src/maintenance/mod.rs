//! Maintenance Module
//!
//! Background work that keeps each tablet's resource usage bounded.
//!
//! ## Tasks
//! - **Flush**: every poll interval, flush the mem row set if it holds
//!   strictly more than the flush threshold
//! - **Compact**: every compact interval, compact unconditionally
//!
//! ## Threads
//! Each tablet gets a [`MaintenanceScheduler`] running both tasks on two
//! dedicated threads. Every wait goes through a [`Clock`] that wakes up as
//! soon as the scheduler's [`StopSignal`] fires, so one tablet's maintenance
//! can be stopped without touching the others.
//!
//! ## Failures
//! A failed cycle is handed to the [`FailurePolicy`](crate::config::FailurePolicy).
//! A task that gives up reports a [`MaintenanceEvent`] to the
//! [`MaintenanceSupervisor`] and issues no further calls.

mod clock;
mod compact;
mod flush;
mod scheduler;
mod signal;
mod supervisor;
mod task;

pub use clock::{Clock, SystemClock};
pub use compact::CompactTask;
pub use flush::FlushTask;
pub use scheduler::MaintenanceScheduler;
pub use signal::StopSignal;
pub use supervisor::MaintenanceSupervisor;
pub use task::{run_task, MaintenanceEvent, MaintenanceTask, TaskKind};
