//! Tablet engine
//!
//! Coordinates the mem row set, the disk row sets and the tablet metadata.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, TabletError};
use crate::log::WriteOp;
use crate::metadata::{MetadataStore, TabletMetadata};
use crate::schema::Schema;

use super::{CompactFlags, DiskRowSet, MemRowSet, RowEntry, TabletHandle};

/// A single tablet
///
/// ## Concurrency Model
///
/// - **Writes** (`apply`): take the `mem_rowset` read lock, so they run
///   concurrently with each other (the mem row set has its own lock) and are
///   excluded only while a flush swaps in a fresh mem row set.
/// - **Flushes** are serialized by `flush_lock`, **compactions** by
///   `compact_lock`. A flush and a compaction may run at the same time: both
///   update `metadata` under its mutex and touch disjoint ends of `rowsets`.
/// - **Reads** see: mem row set → row set being flushed → disk row sets
///   newest → oldest.
pub struct Tablet {
    tablet_id: String,

    /// Directory holding this tablet's disk row sets
    data_dir: PathBuf,

    store: Arc<dyn MetadataStore>,
    metadata: Mutex<TabletMetadata>,

    mem_rowset: RwLock<Arc<MemRowSet>>,

    /// Mem row set swapped out by an in-progress (or failed) flush
    flushing: RwLock<Option<Arc<MemRowSet>>>,

    /// Open disk row sets, oldest first (same order as the metadata)
    rowsets: RwLock<Vec<Arc<DiskRowSet>>>,

    next_mrs_id: AtomicU64,
    flush_lock: Mutex<()>,
    compact_lock: Mutex<()>,
    open: AtomicBool,
}

impl Tablet {
    /// Construct a tablet from its metadata. Nothing is read until `open`.
    pub fn new(
        metadata: TabletMetadata,
        store: Arc<dyn MetadataStore>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tablet_id: metadata.tablet_id().to_string(),
            data_dir: data_dir.into(),
            store,
            metadata: Mutex::new(metadata),
            mem_rowset: RwLock::new(Arc::new(MemRowSet::new(0))),
            flushing: RwLock::new(None),
            rowsets: RwLock::new(Vec::new()),
            next_mrs_id: AtomicU64::new(1),
            flush_lock: Mutex::new(()),
            compact_lock: Mutex::new(()),
            open: AtomicBool::new(false),
        }
    }

    /// Open the tablet
    ///
    /// On open:
    /// 1. Create the data directory if needed
    /// 2. Open every disk row set listed in the metadata
    /// 3. Delete row set files the metadata doesn't list (left behind by a
    ///    crash between writing a row set and persisting the metadata)
    pub fn open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            return Err(TabletError::InvalidState(format!(
                "tablet {} is already open",
                self.tablet_id
            )));
        }

        fs::create_dir_all(&self.data_dir)?;

        let listed: Vec<u64> = self.metadata.lock().rowsets().to_vec();
        let mut rowsets = Vec::with_capacity(listed.len());
        for id in &listed {
            let path = DiskRowSet::path_for(&self.data_dir, *id);
            rowsets.push(Arc::new(DiskRowSet::open(&path)?));
        }

        self.remove_orphans(&listed)?;

        tracing::info!(
            tablet_id = %self.tablet_id,
            rowsets = rowsets.len(),
            "Tablet opened"
        );

        *self.rowsets.write() = rowsets;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_orphans(&self, listed: &[u64]) -> Result<()> {
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let orphaned = match DiskRowSet::parse_id(&path) {
                Some(id) => !listed.contains(&id),
                None => path.extension().is_some_and(|ext| ext == "tmp"),
            };
            if orphaned {
                tracing::warn!(
                    tablet_id = %self.tablet_id,
                    path = %path.display(),
                    "Removing orphaned row set file"
                );
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TabletError::InvalidState(format!(
                "tablet {} is not open",
                self.tablet_id
            )))
        }
    }

    /// Apply a write tagged with its log sequence number
    pub fn apply(&self, lsn: u64, op: &WriteOp) -> Result<()> {
        self.ensure_open()?;
        self.mem_rowset.read().apply(lsn, op);
        Ok(())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemRowSet (most recent writes)
    /// 2. MemRowSet being flushed
    /// 3. Disk row sets (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;

        if let Some(entry) = self.mem_rowset.read().get(key) {
            return Ok(entry.into_value());
        }

        let flushing = self.flushing.read().clone();
        if let Some(entry) = flushing.and_then(|mrs| mrs.get(key)) {
            return Ok(entry.into_value());
        }

        let rowsets = self.rowsets.read().clone();
        for rowset in rowsets.iter().rev() {
            if let Some(entry) = rowset.get(key)? {
                return Ok(entry.into_value());
            }
        }

        Ok(None)
    }

    // =========================================================================
    // Flush
    // =========================================================================

    fn flush_internal(&self) -> Result<()> {
        let _flush_guard = self.flush_lock.lock();
        self.ensure_open()?;

        // A previous flush that failed left its mem row set in `flushing`;
        // it has to reach disk before a newer one does.
        let pending = self.flushing.read().clone();
        let to_flush = match pending {
            Some(mrs) => mrs,
            None => {
                let mut current = self.mem_rowset.write();
                if current.is_empty() {
                    return Ok(());
                }
                let fresh = Arc::new(MemRowSet::new(
                    self.next_mrs_id.fetch_add(1, Ordering::SeqCst),
                ));
                let old = std::mem::replace(&mut *current, fresh);
                *self.flushing.write() = Some(Arc::clone(&old));
                old
            }
        };

        let id = self.metadata.lock().allocate_rowset_id();
        let rowset = match DiskRowSet::write(&self.data_dir, id, to_flush.snapshot()) {
            Ok(rowset) => rowset,
            Err(e) => {
                let _ = fs::remove_file(DiskRowSet::path_for(&self.data_dir, id));
                return Err(e);
            }
        };

        self.update_metadata(|meta| meta.add_flushed_rowset(id, to_flush.max_lsn()))?;

        // Publish the disk row set before dropping the flushing one so a
        // reader never misses the rows in between.
        self.rowsets.write().push(Arc::new(rowset));
        *self.flushing.write() = None;

        tracing::debug!(
            tablet_id = %self.tablet_id,
            rowset_id = id,
            entries = to_flush.entry_count(),
            bytes = to_flush.size(),
            durable_lsn = to_flush.max_lsn(),
            "Flushed mem row set"
        );
        Ok(())
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    fn compact_internal(&self, flags: CompactFlags) -> Result<()> {
        let _compact_guard = self.compact_lock.lock();
        self.ensure_open()?;

        let inputs = self.rowsets.read().clone();
        let force = flags.contains(CompactFlags::FORCE_COMPACT_ALL);
        if inputs.is_empty() || (inputs.len() < 2 && !force) {
            tracing::trace!(
                tablet_id = %self.tablet_id,
                rowsets = inputs.len(),
                "Nothing to compact"
            );
            return Ok(());
        }

        // Oldest first, so newer values overwrite older ones
        let mut merged = BTreeMap::new();
        for rowset in &inputs {
            merged.extend(rowset.scan()?);
        }
        // Every older version of these keys is among the inputs
        merged.retain(|_, entry: &mut RowEntry| !entry.is_tombstone());

        let input_ids: Vec<u64> = inputs.iter().map(|r| r.id()).collect();
        let output = if merged.is_empty() {
            None
        } else {
            let id = self.metadata.lock().allocate_rowset_id();
            match DiskRowSet::write(&self.data_dir, id, merged) {
                Ok(rowset) => Some(Arc::new(rowset)),
                Err(e) => {
                    let _ = fs::remove_file(DiskRowSet::path_for(&self.data_dir, id));
                    return Err(e);
                }
            }
        };
        let output_id = output.as_ref().map(|r| r.id());

        self.update_metadata(|meta| meta.replace_rowsets(&input_ids, output_id))?;

        {
            let mut rowsets = self.rowsets.write();
            rowsets.retain(|r| !input_ids.contains(&r.id()));
            if let Some(rowset) = output {
                rowsets.insert(0, rowset);
            }
        }

        for rowset in &inputs {
            if let Err(e) = fs::remove_file(rowset.path()) {
                tracing::warn!(
                    tablet_id = %self.tablet_id,
                    path = %rowset.path().display(),
                    error = %e,
                    "Failed to remove compacted row set"
                );
            }
        }

        tracing::debug!(
            tablet_id = %self.tablet_id,
            inputs = input_ids.len(),
            output = ?output_id,
            "Compacted disk row sets"
        );
        Ok(())
    }

    /// Apply `change` to a copy of the metadata, persist it, then install it
    fn update_metadata(&self, change: impl FnOnce(&mut TabletMetadata)) -> Result<()> {
        let mut metadata = self.metadata.lock();
        let mut updated = metadata.clone();
        change(&mut updated);
        self.store.flush(&mut updated)?;
        *metadata = updated;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tablet_id(&self) -> &str {
        &self.tablet_id
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn schema(&self) -> Schema {
        self.metadata.lock().schema().clone()
    }

    /// Snapshot of the current metadata
    pub fn metadata(&self) -> TabletMetadata {
        self.metadata.lock().clone()
    }

    /// Highest LSN whose effects are in a durable row set
    pub fn last_durable_lsn(&self) -> u64 {
        self.metadata.lock().last_durable_lsn()
    }

    pub fn rowset_count(&self) -> usize {
        self.rowsets.read().len()
    }

    pub fn mem_rowset_entry_count(&self) -> usize {
        self.mem_rowset.read().entry_count()
    }
}

impl TabletHandle for Tablet {
    fn tablet_id(&self) -> &str {
        &self.tablet_id
    }

    fn mem_rowset_size(&self) -> usize {
        self.mem_rowset.read().size()
    }

    fn flush(&self) -> Result<()> {
        self.flush_internal()
            .map_err(|e| TabletError::Flush(format!("tablet {}: {}", self.tablet_id, e)))
    }

    fn compact(&self, flags: CompactFlags) -> Result<()> {
        self.compact_internal(flags)
            .map_err(|e| TabletError::Compact(format!("tablet {}: {}", self.tablet_id, e)))
    }
}
