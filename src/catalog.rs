//! Tablet catalog
//!
//! The persisted list of tablets a server hosts. At startup the server
//! bootstraps every tablet listed here.
//!
//! ## File Format
//! ```text
//! ┌──────────┬─────────────┬─────────┬─────────┬──────────────────────┐
//! │Magic (4) │ Version (2) │ CRC (4) │ Len (4) │ bincode(descriptors) │
//! └──────────┴─────────────┴─────────┴─────────┴──────────────────────┘
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabletError};
use crate::metadata::MasterBlock;
use crate::schema::Schema;

const MAGIC: &[u8; 4] = b"TCAT";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 14;

/// One hosted tablet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabletDescriptor {
    pub master_block: MasterBlock,
    pub schema: Schema,
}

impl TabletDescriptor {
    pub fn new(master_block: MasterBlock, schema: Schema) -> Self {
        Self {
            master_block,
            schema,
        }
    }

    pub fn tablet_id(&self) -> &str {
        self.master_block.tablet_id()
    }
}

/// Tablets hosted by a server, in the order they were added
#[derive(Debug)]
pub struct TabletCatalog {
    path: PathBuf,
    tablets: Vec<TabletDescriptor>,
}

impl TabletCatalog {
    /// Load the catalog at `path`; a missing file is an empty catalog
    pub fn load(path: &Path) -> Result<Self> {
        let tablets = match fs::read(path) {
            Ok(data) => Self::decode(&data)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            tablets,
        })
    }

    /// Add a tablet. Ids and superblock ids must be unique across the catalog.
    pub fn add(&mut self, descriptor: TabletDescriptor) -> Result<()> {
        descriptor
            .master_block
            .validate()
            .map_err(|e| TabletError::Catalog(e.to_string()))?;

        let new_blocks = [
            descriptor.master_block.block_a(),
            descriptor.master_block.block_b(),
        ];
        for existing in &self.tablets {
            if existing.tablet_id() == descriptor.tablet_id() {
                return Err(TabletError::Catalog(format!(
                    "tablet {} already exists",
                    descriptor.tablet_id()
                )));
            }
            let existing_blocks = [existing.master_block.block_a(), existing.master_block.block_b()];
            if new_blocks.iter().any(|b| existing_blocks.contains(b)) {
                return Err(TabletError::Catalog(format!(
                    "tablet {} reuses a superblock of tablet {}",
                    descriptor.tablet_id(),
                    existing.tablet_id()
                )));
            }
        }

        self.tablets.push(descriptor);
        Ok(())
    }

    /// Remove a tablet by id
    pub fn remove(&mut self, tablet_id: &str) -> Result<TabletDescriptor> {
        let pos = self
            .tablets
            .iter()
            .position(|t| t.tablet_id() == tablet_id)
            .ok_or_else(|| TabletError::NotFound(format!("tablet {}", tablet_id)))?;
        Ok(self.tablets.remove(pos))
    }

    pub fn get(&self, tablet_id: &str) -> Option<&TabletDescriptor> {
        self.tablets.iter().find(|t| t.tablet_id() == tablet_id)
    }

    pub fn tablets(&self) -> &[TabletDescriptor] {
        &self.tablets
    }

    pub fn is_empty(&self) -> bool {
        self.tablets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tablets.len()
    }

    /// Persist the catalog (write to a temp file, then rename)
    pub fn save(&self) -> Result<()> {
        let payload = bincode::serialize(&self.tablets)?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u32_le(crc32fast::hash(&payload));
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(&payload);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn decode(data: &[u8]) -> Result<Vec<TabletDescriptor>> {
        if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
            return Err(TabletError::Catalog("catalog header is invalid".to_string()));
        }

        let mut header = &data[4..HEADER_SIZE];
        let version = header.get_u16_le();
        if version != VERSION {
            return Err(TabletError::Catalog(format!(
                "unsupported catalog version {}",
                version
            )));
        }
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;

        let payload = data
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| TabletError::Catalog("catalog is truncated".to_string()))?;
        if crc32fast::hash(payload) != crc {
            return Err(TabletError::Catalog("catalog CRC mismatch".to_string()));
        }

        Ok(bincode::deserialize(payload)?)
    }
}
