//! MemRowSet implementation
//!
//! BTreeMap-based row set with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::log::WriteOp;

use super::RowEntry;

/// Per-entry bookkeeping counted on top of key and value bytes
const ENTRY_OVERHEAD: usize = 32;

/// In-memory row set for recent writes
pub struct MemRowSet {
    id: u64,
    data: RwLock<BTreeMap<Vec<u8>, RowEntry>>,
    size: AtomicUsize,
    max_lsn: AtomicU64,
}

impl MemRowSet {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            max_lsn: AtomicU64::new(0),
        }
    }

    /// Apply a write tagged with its log sequence number
    pub fn apply(&self, lsn: u64, op: &WriteOp) {
        let (key, entry) = match op {
            WriteOp::Insert { key, value } => (key.clone(), RowEntry::Value(value.clone())),
            WriteOp::Delete { key } => (key.clone(), RowEntry::Tombstone),
        };
        let added = entry_size(&key, &entry);

        let mut data = self.data.write();
        if let Some(old) = data.insert(key, entry) {
            self.size
                .fetch_sub(entry_size(op.key(), &old), Ordering::Relaxed);
        }
        self.size.fetch_add(added, Ordering::Relaxed);
        self.max_lsn.fetch_max(lsn, Ordering::Relaxed);
    }

    pub fn get(&self, key: &[u8]) -> Option<RowEntry> {
        self.data.read().get(key).cloned()
    }

    /// Sorted copy of all entries
    pub fn snapshot(&self) -> Vec<(Vec<u8>, RowEntry)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Highest LSN applied (0 if none)
    pub fn max_lsn(&self) -> u64 {
        self.max_lsn.load(Ordering::Relaxed)
    }
}

fn entry_size(key: &[u8], entry: &RowEntry) -> usize {
    let value_len = match entry {
        RowEntry::Value(v) => v.len(),
        RowEntry::Tombstone => 0,
    };
    key.len() + value_len + ENTRY_OVERHEAD
}
