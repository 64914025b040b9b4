//! # tabletd
//!
//! The tablet-serving core of a storage server:
//! - Ordered, all-or-nothing bootstrap of each tablet
//!   (metadata → open → peer init → peer start → registry)
//! - Per-tablet background maintenance: a flush task polling memory usage
//!   and a compact task on a fixed cadence, each on its own thread
//! - Supervision of maintenance failures (retry, quarantine or escalate)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TabletServer                           │
//! │            catalog ──▶ BootstrapSequencer                   │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │ register                    │ manage
//!                 ▼                             ▼
//!        ┌─────────────────┐         ┌─────────────────────────┐
//!        │ TabletRegistry  │         │  MaintenanceSupervisor  │
//!        │  (TabletPeers)  │         │  flush / compact threads│
//!        └────────┬────────┘         └────────────┬────────────┘
//!                 │                               │
//!                 ▼                               ▼
//!        ┌─────────────────────────────────────────────────────┐
//!        │ Tablet: MemRowSet ──flush──▶ DiskRowSets ◀─compact─ │
//!        │         TabletMetadata (alternating superblocks)    │
//!        └─────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod bootstrap;
pub mod catalog;
pub mod fs_manager;
pub mod log;
pub mod maintenance;
pub mod metadata;
pub mod registry;
pub mod schema;
pub mod server;
pub mod tablet;
pub mod tablet_peer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use bootstrap::{BootstrapSequencer, LocalTabletProvider, TabletProvider};
pub use config::{Config, FailurePolicy, MaintenanceThresholds};
pub use error::{Result, TabletError};
pub use metadata::{MasterBlock, TabletMetadata};
pub use registry::TabletRegistry;
pub use server::TabletServer;
pub use tablet::{CompactFlags, Tablet, TabletHandle};
pub use tablet_peer::{ReplicaPeer, TabletPeer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tabletd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
