//! Tests for TabletPeer
//!
//! These tests verify:
//! - The Created → Initialized → Started lifecycle
//! - Writes are logged and applied
//! - Log replay restores writes that never reached a disk row set
//! - Replay skips entries already covered by durable row sets
//! - Log GC drops only durable entries, and maintenance flushes trigger it
//! - Log truncation keeps LSNs increasing across restarts

mod common;

use std::fs;
use std::sync::Arc;

use common::{master_block, setup_temp_dir, test_schema};
use tabletd::bootstrap::{LocalTabletProvider, TabletProvider};
use tabletd::config::LogSyncStrategy;
use tabletd::fs_manager::FsManager;
use tabletd::log::{LogReader, WriteOp};
use tabletd::tablet::TabletHandle;
use tabletd::tablet_peer::{PeerState, ReplicaPeer, ReplicaRole, TabletPeer};
use tabletd::TabletError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn provider(temp: &TempDir) -> LocalTabletProvider {
    let fs = FsManager::new(temp.path());
    fs.create_layout().unwrap();
    LocalTabletProvider::new(fs, LogSyncStrategy::EveryWrite)
}

/// Load metadata, open the tablet and wrap it in a fresh peer
fn new_peer(temp: &TempDir, tablet_id: &str) -> Arc<TabletPeer> {
    let provider = provider(temp);
    let metadata = provider
        .load_or_create_metadata(&master_block(tablet_id), &test_schema())
        .unwrap();
    let tablet = provider.open_tablet(metadata).unwrap();
    provider.new_peer(tablet)
}

fn started_peer(temp: &TempDir, tablet_id: &str) -> Arc<TabletPeer> {
    let peer = new_peer(temp, tablet_id);
    peer.init().unwrap();
    peer.start().unwrap();
    peer
}

fn put(key: &str, value: &str) -> WriteOp {
    WriteOp::Insert {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn get(peer: &TabletPeer, key: &str) -> Option<Vec<u8>> {
    peer.local_tablet().get(key.as_bytes()).unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_lifecycle() {
    let temp = setup_temp_dir();
    let peer = new_peer(&temp, "t1");

    assert_eq!(peer.state(), PeerState::Created);
    assert_eq!(peer.role(), ReplicaRole::NonParticipant);

    peer.init().unwrap();
    assert_eq!(peer.state(), PeerState::Initialized);

    peer.start().unwrap();
    assert_eq!(peer.state(), PeerState::Started);
    assert_eq!(peer.role(), ReplicaRole::Leader);
    assert_eq!(ReplicaPeer::tablet_id(peer.as_ref()), "t1");
}

#[test]
fn test_start_before_init_fails() {
    let temp = setup_temp_dir();
    let peer = new_peer(&temp, "t1");
    assert!(matches!(peer.start(), Err(TabletError::Start(_))));
    assert_eq!(peer.state(), PeerState::Created);
}

#[test]
fn test_init_twice_fails() {
    let temp = setup_temp_dir();
    let peer = new_peer(&temp, "t1");
    peer.init().unwrap();
    assert!(matches!(peer.init(), Err(TabletError::Init(_))));
}

#[test]
fn test_write_before_start_fails() {
    let temp = setup_temp_dir();
    let peer = new_peer(&temp, "t1");
    peer.init().unwrap();
    assert!(matches!(
        peer.write(put("a", "1")),
        Err(TabletError::InvalidState(_))
    ));
}

#[test]
fn test_peer_state_display() {
    assert_eq!(PeerState::Created.to_string(), "CREATED");
    assert_eq!(PeerState::Initialized.to_string(), "INITIALIZED");
    assert_eq!(PeerState::Started.to_string(), "STARTED");
}

// =============================================================================
// Writes and Replay
// =============================================================================

#[test]
fn test_write_is_applied() {
    let temp = setup_temp_dir();
    let peer = started_peer(&temp, "t1");

    assert_eq!(peer.write(put("a", "1")).unwrap(), 1);
    assert_eq!(peer.write(put("b", "2")).unwrap(), 2);
    assert_eq!(get(&peer, "a"), Some(b"1".to_vec()));
    assert!(peer.tablet().mem_rowset_size() > 0);
}

#[test]
fn test_restart_replays_log() {
    let temp = setup_temp_dir();
    {
        let peer = started_peer(&temp, "t1");
        peer.write(put("a", "1")).unwrap();
        peer.write(put("b", "2")).unwrap();
        peer.write(WriteOp::Delete { key: b"a".to_vec() }).unwrap();
    }

    let peer = started_peer(&temp, "t1");
    assert_eq!(get(&peer, "a"), None);
    assert_eq!(get(&peer, "b"), Some(b"2".to_vec()));
    assert_eq!(peer.write(put("c", "3")).unwrap(), 4);
}

#[test]
fn test_replay_skips_durable_entries() {
    let temp = setup_temp_dir();
    {
        let peer = started_peer(&temp, "t1");
        peer.write(put("a", "1")).unwrap();
        peer.write(put("b", "2")).unwrap();
        peer.local_tablet().flush().unwrap();
        peer.write(put("c", "3")).unwrap();
    }

    let peer = started_peer(&temp, "t1");
    assert_eq!(peer.local_tablet().last_durable_lsn(), 2);
    assert_eq!(peer.local_tablet().mem_rowset_entry_count(), 1);
    assert_eq!(get(&peer, "a"), Some(b"1".to_vec()));
    assert_eq!(get(&peer, "c"), Some(b"3".to_vec()));
}

// =============================================================================
// Log GC
// =============================================================================

#[test]
fn test_gc_log_requires_durability() {
    let temp = setup_temp_dir();
    let peer = started_peer(&temp, "t1");

    assert!(!peer.gc_log().unwrap());

    peer.write(put("a", "1")).unwrap();
    assert!(!peer.gc_log().unwrap());

    peer.local_tablet().flush().unwrap();
    assert!(peer.gc_log().unwrap());
    assert!(!peer.gc_log().unwrap());
}

#[test]
fn test_gc_log_keeps_entries_not_yet_durable() {
    let temp = setup_temp_dir();
    let log_path = FsManager::new(temp.path()).tablet_wal_path("t1");
    {
        let peer = started_peer(&temp, "t1");
        peer.write(put("a", "1")).unwrap();
        peer.write(put("b", "2")).unwrap();
        peer.local_tablet().flush().unwrap();
        peer.write(put("c", "3")).unwrap();

        assert!(peer.gc_log().unwrap());
        let (entries, _) = LogReader::open(&log_path).unwrap().read_all().unwrap();
        let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
        assert_eq!(lsns, vec![3]);
    }

    let peer = started_peer(&temp, "t1");
    assert_eq!(peer.local_tablet().mem_rowset_entry_count(), 1);
    assert_eq!(get(&peer, "a"), Some(b"1".to_vec()));
    assert_eq!(get(&peer, "c"), Some(b"3".to_vec()));
    assert_eq!(peer.write(put("d", "4")).unwrap(), 4);
}

#[test]
fn test_maintenance_flush_trims_log() {
    let temp = setup_temp_dir();
    let log_path = FsManager::new(temp.path()).tablet_wal_path("t1");
    let peer = started_peer(&temp, "t1");
    peer.write(put("a", "1")).unwrap();
    peer.write(put("b", "2")).unwrap();

    peer.tablet().flush().unwrap();

    assert_eq!(peer.local_tablet().last_durable_lsn(), 2);
    assert_eq!(fs::metadata(&log_path).unwrap().len(), 0);
    assert!(!peer.gc_log().unwrap());
}

#[test]
fn test_lsns_keep_increasing_after_gc_and_restart() {
    let temp = setup_temp_dir();
    {
        let peer = started_peer(&temp, "t1");
        peer.write(put("a", "1")).unwrap();
        peer.write(put("b", "2")).unwrap();
        peer.tablet().flush().unwrap();
    }

    let peer = started_peer(&temp, "t1");
    assert_eq!(peer.write(put("c", "3")).unwrap(), 3);
    assert_eq!(get(&peer, "a"), Some(b"1".to_vec()));
}
