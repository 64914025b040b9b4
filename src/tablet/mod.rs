//! Tablet Module
//!
//! One tablet: an in-memory row set absorbing writes, and immutable sorted
//! disk row sets produced by flushes and merged by compactions.
//!
//! ## Responsibilities
//! - Expose the maintenance contract ([`TabletHandle`]): memory usage,
//!   flush, compact
//! - Recover durable row sets listed in the tablet metadata on open
//! - Serve point reads newest → oldest (mem row set, flushing, disk)
//!
//! ## Layout
//! ```text
//!   writes ─▶ MemRowSet ──flush──▶ DiskRowSet (newest)
//!                                  DiskRowSet
//!                                  DiskRowSet (oldest) ◀─compact─┘
//! ```

mod disk_rowset;
mod engine;
mod mem_rowset;

pub use disk_rowset::DiskRowSet;
pub use engine::Tablet;
pub use mem_rowset::MemRowSet;

use crate::error::Result;

/// Maintenance-facing view of a tablet.
///
/// The maintenance tasks only ever hold this trait object; concurrent flush
/// and compact calls are made safe by the implementation.
pub trait TabletHandle: Send + Sync {
    fn tablet_id(&self) -> &str;

    /// Approximate bytes held by the in-memory row set
    fn mem_rowset_size(&self) -> usize;

    /// Persist the in-memory row set as a new disk row set
    fn flush(&self) -> Result<()>;

    /// Consolidate disk row sets
    fn compact(&self, flags: CompactFlags) -> Result<()>;
}

/// Options for [`TabletHandle::compact`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactFlags(u8);

impl CompactFlags {
    /// Merge all disk row sets when there is more than one
    pub const NO_FLAGS: Self = Self(0);

    /// Rewrite the disk row sets even if there is only one
    pub const FORCE_COMPACT_ALL: Self = Self(1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Entry stored in a row set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEntry {
    /// A live value
    Value(Vec<u8>),

    /// A deleted row
    Tombstone,
}

impl RowEntry {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, RowEntry::Tombstone)
    }

    /// Resolve to the visible value
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            RowEntry::Value(v) => Some(v),
            RowEntry::Tombstone => None,
        }
    }
}
