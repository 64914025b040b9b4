//! Bootstrap Sequencer
//!
//! Brings one tablet online, all or nothing:
//!
//! ```text
//!   load/create metadata ─▶ open tablet ─▶ new peer ─▶ init ─▶ start ─▶ register
//! ```
//!
//! Every step must succeed before the next one runs. A failure returns the
//! error of the stage it happened in and leaves nothing registered, so a
//! partially bootstrapped tablet is never reachable.

use std::sync::Arc;

use crate::config::LogSyncStrategy;
use crate::error::{Result, TabletError};
use crate::fs_manager::FsManager;
use crate::metadata::{FsMetadataStore, MasterBlock, MetadataStore, TabletMetadata};
use crate::registry::TabletRegistry;
use crate::schema::Schema;
use crate::tablet::{Tablet, TabletHandle};
use crate::tablet_peer::{PeerOptions, ReplicaPeer, TabletPeer};

/// Constructs the collaborators the bootstrap sequence drives
pub trait TabletProvider: Send + Sync {
    type Tablet: TabletHandle + 'static;
    type Peer: ReplicaPeer + 'static;

    /// Load the metadata for `master_block`, creating it if absent
    fn load_or_create_metadata(
        &self,
        master_block: &MasterBlock,
        schema: &Schema,
    ) -> Result<TabletMetadata>;

    /// Construct the tablet from its metadata and open it
    fn open_tablet(&self, metadata: TabletMetadata) -> Result<Arc<Self::Tablet>>;

    /// Wrap an open tablet in a peer (state `Created`)
    fn new_peer(&self, tablet: Arc<Self::Tablet>) -> Arc<Self::Peer>;
}

/// Provider backed by the server's filesystem layout
pub struct LocalTabletProvider {
    fs: FsManager,
    store: Arc<dyn MetadataStore>,
    log_sync_strategy: LogSyncStrategy,
}

impl LocalTabletProvider {
    pub fn new(fs: FsManager, log_sync_strategy: LogSyncStrategy) -> Self {
        let store = Arc::new(FsMetadataStore::new(fs.clone()));
        Self::with_store(fs, store, log_sync_strategy)
    }

    pub fn with_store(
        fs: FsManager,
        store: Arc<dyn MetadataStore>,
        log_sync_strategy: LogSyncStrategy,
    ) -> Self {
        Self {
            fs,
            store,
            log_sync_strategy,
        }
    }
}

impl TabletProvider for LocalTabletProvider {
    type Tablet = Tablet;
    type Peer = TabletPeer;

    fn load_or_create_metadata(
        &self,
        master_block: &MasterBlock,
        schema: &Schema,
    ) -> Result<TabletMetadata> {
        TabletMetadata::load_or_create(self.store.as_ref(), master_block, schema)
    }

    fn open_tablet(&self, metadata: TabletMetadata) -> Result<Arc<Tablet>> {
        let data_dir = self.fs.tablet_data_dir(metadata.tablet_id());
        let tablet = Tablet::new(metadata, Arc::clone(&self.store), data_dir);
        tablet.open()?;
        Ok(Arc::new(tablet))
    }

    fn new_peer(&self, tablet: Arc<Tablet>) -> Arc<TabletPeer> {
        let options = PeerOptions {
            log_path: self.fs.tablet_wal_path(tablet.tablet_id()),
            log_sync_strategy: self.log_sync_strategy,
        };
        Arc::new(TabletPeer::new(tablet, options))
    }
}

/// Runs the bootstrap sequence and publishes into a registry
pub struct BootstrapSequencer<P: TabletProvider> {
    provider: P,
    registry: Arc<TabletRegistry>,
}

impl<P: TabletProvider> BootstrapSequencer<P> {
    pub fn new(provider: P, registry: Arc<TabletRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Bring the tablet named by `master_block` online and register it
    pub fn bootstrap(&self, master_block: &MasterBlock, schema: &Schema) -> Result<Arc<P::Peer>> {
        let tablet_id = master_block.tablet_id();
        tracing::info!(tablet_id, "Bootstrapping tablet");

        // Step 1: Metadata
        let metadata = self
            .provider
            .load_or_create_metadata(master_block, schema)
            .map_err(|e| stage_error(TabletError::Metadata, tablet_id, e))?;

        // Step 2: Open (recovers durable row sets)
        let tablet = self
            .provider
            .open_tablet(metadata)
            .map_err(|e| stage_error(TabletError::Open, tablet_id, e))?;

        // Step 3: Peer lifecycle, init strictly before start
        let peer = self.provider.new_peer(tablet);
        peer.init()
            .map_err(|e| stage_error(TabletError::Init, tablet_id, e))?;
        peer.start()
            .map_err(|e| stage_error(TabletError::Start, tablet_id, e))?;

        // Step 4: Publish
        self.registry.register(peer.clone());

        tracing::info!(tablet_id, "Tablet bootstrapped");
        Ok(peer)
    }

    pub fn registry(&self) -> &Arc<TabletRegistry> {
        &self.registry
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Attribute `err` to a bootstrap stage unless it already names that stage
fn stage_error(stage: fn(String) -> TabletError, tablet_id: &str, err: TabletError) -> TabletError {
    let same_stage = std::mem::discriminant(&err) == std::mem::discriminant(&stage(String::new()));
    let err = if same_stage {
        err
    } else {
        stage(format!("tablet {}: {}", tablet_id, err))
    };
    tracing::error!(tablet_id, error = %err, "Bootstrap failed");
    err
}
