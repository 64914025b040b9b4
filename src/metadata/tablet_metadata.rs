//! Tablet metadata contents and the load-or-create entry point.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabletError};
use crate::schema::Schema;

use super::{MasterBlock, MetadataStore};

/// Persistent state of one tablet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabletMetadata {
    master_block: MasterBlock,
    schema: Schema,

    /// Durable row set ids, oldest first
    rowsets: Vec<u64>,

    /// Id handed to the next flushed or compacted row set
    next_rowset_id: u64,

    /// Highest log sequence number whose effects are in a durable row set
    last_durable_lsn: u64,

    /// Number of times this metadata has been written
    superblock_seq: u64,
}

impl TabletMetadata {
    /// Fresh metadata with no durable row sets
    pub fn new(master_block: MasterBlock, schema: Schema) -> Self {
        Self {
            master_block,
            schema,
            rowsets: Vec::new(),
            next_rowset_id: 1,
            last_durable_lsn: 0,
            superblock_seq: 0,
        }
    }

    /// Load the metadata named by `master_block`, or create and persist it
    /// if neither superblock exists yet.
    ///
    /// An existing tablet must have been created with the same schema.
    pub fn load_or_create(
        store: &dyn MetadataStore,
        master_block: &MasterBlock,
        schema: &Schema,
    ) -> Result<Self> {
        master_block.validate()?;

        match store.load(master_block)? {
            Some(existing) => {
                if existing.schema != *schema {
                    return Err(TabletError::Metadata(format!(
                        "tablet {}: stored schema does not match the requested schema",
                        master_block.tablet_id()
                    )));
                }
                tracing::debug!(
                    tablet_id = master_block.tablet_id(),
                    rowsets = existing.rowsets.len(),
                    last_durable_lsn = existing.last_durable_lsn,
                    "Loaded tablet metadata"
                );
                Ok(existing)
            }
            None => {
                let mut created = Self::new(master_block.clone(), schema.clone());
                store.flush(&mut created)?;
                tracing::info!(
                    tablet_id = master_block.tablet_id(),
                    "Created new tablet metadata"
                );
                Ok(created)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn tablet_id(&self) -> &str {
        self.master_block.tablet_id()
    }

    pub fn master_block(&self) -> &MasterBlock {
        &self.master_block
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rowsets(&self) -> &[u64] {
        &self.rowsets
    }

    pub fn last_durable_lsn(&self) -> u64 {
        self.last_durable_lsn
    }

    pub fn superblock_seq(&self) -> u64 {
        self.superblock_seq
    }

    // =========================================================================
    // Mutators (callers persist through a MetadataStore afterwards)
    // =========================================================================

    /// Reserve the id of a new row set
    pub fn allocate_rowset_id(&mut self) -> u64 {
        let id = self.next_rowset_id;
        self.next_rowset_id += 1;
        id
    }

    /// Record a flushed row set as the newest one
    pub fn add_flushed_rowset(&mut self, id: u64, durable_lsn: u64) {
        self.rowsets.push(id);
        self.last_durable_lsn = self.last_durable_lsn.max(durable_lsn);
    }

    /// Replace compacted inputs by their output, which holds the oldest data
    pub fn replace_rowsets(&mut self, inputs: &[u64], output: Option<u64>) {
        self.rowsets.retain(|id| !inputs.contains(id));
        if let Some(id) = output {
            self.rowsets.insert(0, id);
        }
    }

    pub(super) fn set_superblock_seq(&mut self, seq: u64) {
        self.superblock_seq = seq;
    }
}
