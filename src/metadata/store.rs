//! Metadata persistence.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TabletError};
use crate::fs_manager::FsManager;

use super::{MasterBlock, TabletMetadata};

/// Magic bytes identifying a superblock file
const MAGIC: &[u8; 4] = b"TBLM";

/// Current superblock format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + CRC (4) + Len (4)
const HEADER_SIZE: usize = 14;

/// Where tablet metadata lives between process restarts
pub trait MetadataStore: Send + Sync {
    /// Read the newest valid metadata for `master_block`.
    ///
    /// Returns `Ok(None)` if the tablet has never been persisted.
    fn load(&self, master_block: &MasterBlock) -> Result<Option<TabletMetadata>>;

    /// Persist `metadata`, advancing its superblock sequence on success
    fn flush(&self, metadata: &mut TabletMetadata) -> Result<()>;
}

/// Stores superblocks as files under the server's `tablet-meta/` directory
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    fs: FsManager,
}

impl FsMetadataStore {
    pub fn new(fs: FsManager) -> Self {
        Self { fs }
    }

    fn encode(metadata: &TabletMetadata) -> Result<BytesMut> {
        let payload = bincode::serialize(metadata)?;
        let crc = crc32fast::hash(&payload);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u32_le(crc);
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(&payload);
        Ok(buf)
    }

    fn decode(block_id: &str, data: &[u8]) -> Result<TabletMetadata> {
        if data.len() < HEADER_SIZE {
            return Err(TabletError::Corruption(format!(
                "superblock {} is truncated ({} bytes)",
                block_id,
                data.len()
            )));
        }

        let mut header = &data[..HEADER_SIZE];
        if &header[..4] != MAGIC {
            return Err(TabletError::Corruption(format!(
                "superblock {} has invalid magic {:?}",
                block_id,
                &header[..4]
            )));
        }
        header.advance(4);

        let version = header.get_u16_le();
        if version != VERSION {
            return Err(TabletError::Corruption(format!(
                "superblock {} has unsupported version {}",
                block_id, version
            )));
        }

        let expected_crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;
        let payload = data.get(HEADER_SIZE..HEADER_SIZE + len).ok_or_else(|| {
            TabletError::Corruption(format!("superblock {} payload is truncated", block_id))
        })?;

        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(TabletError::Corruption(format!(
                "superblock {} CRC mismatch: expected {:08x}, got {:08x}",
                block_id, expected_crc, actual_crc
            )));
        }

        Ok(bincode::deserialize(payload)?)
    }

    /// Read one superblock. `Ok(None)` if the file doesn't exist.
    fn read_block(&self, block_id: &str) -> Result<Option<Result<TabletMetadata>>> {
        match fs::read(self.fs.block_path(block_id)) {
            Ok(data) => Ok(Some(Self::decode(block_id, &data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl MetadataStore for FsMetadataStore {
    fn load(&self, master_block: &MasterBlock) -> Result<Option<TabletMetadata>> {
        let candidates = [
            (master_block.block_a(), self.read_block(master_block.block_a())?),
            (master_block.block_b(), self.read_block(master_block.block_b())?),
        ];

        if candidates.iter().all(|(_, block)| block.is_none()) {
            return Ok(None);
        }

        let mut newest: Option<TabletMetadata> = None;
        let mut last_error = None;

        for (block_id, block) in candidates {
            match block {
                Some(Ok(metadata)) => {
                    if metadata.master_block() != master_block {
                        last_error = Some(TabletError::Corruption(format!(
                            "superblock {} belongs to tablet {}, not {}",
                            block_id,
                            metadata.tablet_id(),
                            master_block.tablet_id()
                        )));
                        continue;
                    }
                    let is_newer = newest
                        .as_ref()
                        .map_or(true, |n| metadata.superblock_seq() > n.superblock_seq());
                    if is_newer {
                        newest = Some(metadata);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        tablet_id = master_block.tablet_id(),
                        block_id,
                        error = %e,
                        "Ignoring unreadable superblock"
                    );
                    last_error = Some(e);
                }
                None => {}
            }
        }

        match (newest, last_error) {
            (Some(metadata), _) => Ok(Some(metadata)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    fn flush(&self, metadata: &mut TabletMetadata) -> Result<()> {
        let previous_seq = metadata.superblock_seq();
        let seq = previous_seq + 1;
        metadata.set_superblock_seq(seq);

        let write = || -> Result<()> {
            let block_id = metadata.master_block().block_for_sequence(seq);
            let encoded = Self::encode(metadata)?;

            fs::create_dir_all(self.fs.meta_dir())?;
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(self.fs.block_path(block_id))?;
            file.write_all(&encoded)?;
            file.sync_all()?;
            Ok(())
        };

        if let Err(e) = write() {
            metadata.set_superblock_seq(previous_seq);
            return Err(e);
        }

        tracing::trace!(
            tablet_id = metadata.tablet_id(),
            superblock_seq = seq,
            "Flushed tablet metadata"
        );
        Ok(())
    }
}
