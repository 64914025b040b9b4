//! Filesystem layout of a tablet server
//!
//! ```text
//! {root}/
//!   ├── catalog                    (tablets hosted by this server)
//!   ├── tablet-meta/{block_id}     (alternating superblocks)
//!   ├── data/{tablet_id}/          (disk row sets)
//!   └── wals/{tablet_id}/wal.log   (write-ahead log of the peer)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Resolves every on-disk path used by the server
#[derive(Debug, Clone)]
pub struct FsManager {
    root: PathBuf,
}

impl FsManager {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const CATALOG_FILENAME: &'static str = "catalog";
    const META_DIR: &'static str = "tablet-meta";
    const DATA_DIR: &'static str = "data";
    const WAL_DIR: &'static str = "wals";
    const WAL_FILENAME: &'static str = "wal.log";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the top-level directories if they don't exist
    pub fn create_layout(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.meta_dir())?;
        fs::create_dir_all(self.root.join(Self::DATA_DIR))?;
        fs::create_dir_all(self.root.join(Self::WAL_DIR))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(Self::CATALOG_FILENAME)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(Self::META_DIR)
    }

    /// Path of one superblock, named by its block id
    pub fn block_path(&self, block_id: &str) -> PathBuf {
        self.meta_dir().join(block_id)
    }

    pub fn tablet_data_dir(&self, tablet_id: &str) -> PathBuf {
        self.root.join(Self::DATA_DIR).join(tablet_id)
    }

    pub fn tablet_wal_dir(&self, tablet_id: &str) -> PathBuf {
        self.root.join(Self::WAL_DIR).join(tablet_id)
    }

    pub fn tablet_wal_path(&self, tablet_id: &str) -> PathBuf {
        self.tablet_wal_dir(tablet_id).join(Self::WAL_FILENAME)
    }
}
