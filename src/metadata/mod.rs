//! Tablet Metadata Module
//!
//! Persistent per-tablet state: which row sets are durable, which log
//! entries they cover, and the schema the tablet was created with.
//!
//! ## Responsibilities
//! - Identify a tablet's metadata by its master block
//! - Load existing metadata, or create it for a fresh identity
//! - Persist updates so that a torn write never loses the previous state
//!
//! ## Superblock Format
//! ```text
//! ┌──────────┬─────────────┬─────────┬─────────┬──────────────────────┐
//! │Magic (4) │ Version (2) │ CRC (4) │ Len (4) │ bincode(metadata)    │
//! └──────────┴─────────────┴─────────┴─────────┴──────────────────────┘
//! ```
//! Each master block names two superblocks. Writes alternate between them
//! (even sequence → block A, odd → block B); loading picks the valid one
//! with the highest sequence.

mod master_block;
mod store;
mod tablet_metadata;

pub use master_block::MasterBlock;
pub use store::{FsMetadataStore, MetadataStore};
pub use tablet_metadata::TabletMetadata;
