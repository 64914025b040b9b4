//! Tablet Server
//!
//! Wires the pieces together:
//!
//! 1. Create the directory layout
//! 2. Bootstrap every tablet in the catalog (all must succeed)
//! 3. Start maintenance for every registered tablet
//! 4. Supervise maintenance until a fatal failure
//!
//! Maintenance only starts once every tablet is online, so a failed
//! bootstrap never leaves background work running against a half-open
//! server.

use std::sync::Arc;

use crate::bootstrap::{BootstrapSequencer, LocalTabletProvider};
use crate::catalog::TabletCatalog;
use crate::config::Config;
use crate::error::{Result, TabletError};
use crate::fs_manager::FsManager;
use crate::maintenance::{Clock, MaintenanceSupervisor, SystemClock};
use crate::registry::TabletRegistry;
use crate::tablet_peer::TabletPeer;

pub struct TabletServer {
    config: Config,
    fs: FsManager,
    registry: Arc<TabletRegistry>,
    sequencer: BootstrapSequencer<LocalTabletProvider>,
    supervisor: MaintenanceSupervisor,

    /// Concrete peers by bootstrap order, for the write path
    peers: Vec<Arc<TabletPeer>>,
}

impl TabletServer {
    /// Create a server; validates the maintenance configuration
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let thresholds = config.maintenance_thresholds()?;
        let fs = FsManager::new(&config.data_dir);
        let registry = Arc::new(TabletRegistry::new());
        let provider = LocalTabletProvider::new(fs.clone(), config.log_sync_strategy);

        Ok(Self {
            sequencer: BootstrapSequencer::new(provider, Arc::clone(&registry)),
            supervisor: MaintenanceSupervisor::with_clock(thresholds, config.failure_policy, clock),
            config,
            fs,
            registry,
            peers: Vec::new(),
        })
    }

    /// Create the on-disk layout
    pub fn init(&self) -> Result<()> {
        self.fs.create_layout()?;
        tracing::info!(data_dir = %self.fs.root().display(), "Tablet server initialized");
        Ok(())
    }

    /// Bootstrap every tablet in `catalog`. Stops at the first failure.
    pub fn bootstrap_catalog(&mut self, catalog: &TabletCatalog) -> Result<usize> {
        for descriptor in catalog.tablets() {
            let peer = self
                .sequencer
                .bootstrap(&descriptor.master_block, &descriptor.schema)?;
            self.peers.push(peer);
        }
        Ok(catalog.len())
    }

    /// Start maintenance for every registered tablet
    pub fn start_maintenance(&self) -> Result<()> {
        if self.registry.is_empty() {
            tracing::warn!("No tablets registered, nothing to maintain");
        }
        for peer in self.registry.peers() {
            self.supervisor.manage(peer.tablet())?;
        }
        tracing::info!(
            tablets = self.registry.len(),
            "Maintenance started"
        );
        Ok(())
    }

    /// Block until a maintenance failure is escalated; returns its error
    pub fn run_until_fatal(&self) -> TabletError {
        self.supervisor.run(&self.registry)
    }

    /// Stop all maintenance
    pub fn shutdown(&self) {
        self.supervisor.stop_all();
        tracing::info!("Tablet server stopped");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fs(&self) -> &FsManager {
        &self.fs
    }

    pub fn registry(&self) -> &Arc<TabletRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &MaintenanceSupervisor {
        &self.supervisor
    }

    /// A bootstrapped peer that is still in service
    pub fn peer(&self, tablet_id: &str) -> Option<Arc<TabletPeer>> {
        self.registry.lookup(tablet_id)?;
        self.peers
            .iter()
            .find(|p| p.local_tablet().tablet_id() == tablet_id)
            .cloned()
    }
}
