//! Tablet Registry
//!
//! The set of tablets a server is currently serving, keyed by tablet id.
//! Registration is an in-memory map insert; a tablet only gets here after it
//! has been fully bootstrapped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::tablet_peer::ReplicaPeer;

/// Running tablet peers, plus the ids of tablets taken out of service
#[derive(Default)]
pub struct TabletRegistry {
    peers: RwLock<HashMap<String, Arc<dyn ReplicaPeer>>>,
    quarantined: RwLock<Vec<String>>,
}

impl TabletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a running peer.
    ///
    /// # Panics
    /// If a peer with the same tablet id is already registered: bootstrapping
    /// one identity twice is a bug in the caller.
    pub fn register(&self, peer: Arc<dyn ReplicaPeer>) {
        let tablet_id = peer.tablet_id().to_string();
        let mut peers = self.peers.write();
        assert!(
            !peers.contains_key(&tablet_id),
            "tablet {} registered twice",
            tablet_id
        );
        tracing::info!(tablet_id = %tablet_id, "Tablet registered");
        peers.insert(tablet_id, peer);
    }

    pub fn lookup(&self, tablet_id: &str) -> Option<Arc<dyn ReplicaPeer>> {
        self.peers.read().get(tablet_id).cloned()
    }

    /// Remove a peer from service and remember it as quarantined
    pub fn quarantine(&self, tablet_id: &str) -> Option<Arc<dyn ReplicaPeer>> {
        let removed = self.peers.write().remove(tablet_id);
        if removed.is_some() {
            tracing::warn!(tablet_id, "Tablet quarantined");
            self.quarantined.write().push(tablet_id.to_string());
        }
        removed
    }

    pub fn is_quarantined(&self, tablet_id: &str) -> bool {
        self.quarantined.read().iter().any(|id| id == tablet_id)
    }

    /// Ids of all registered tablets, sorted
    pub fn tablet_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.peers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All registered peers, sorted by tablet id
    pub fn peers(&self) -> Vec<Arc<dyn ReplicaPeer>> {
        let peers = self.peers.read();
        let mut all: Vec<Arc<dyn ReplicaPeer>> = peers.values().cloned().collect();
        all.sort_by(|a, b| a.tablet_id().cmp(b.tablet_id()));
        all
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
