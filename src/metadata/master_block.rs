//! Master block: the identity of a tablet on disk.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabletError};

/// Tablet id plus the two superblock ids holding its metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MasterBlock {
    tablet_id: String,
    block_a: String,
    block_b: String,
}

impl MasterBlock {
    pub fn new(
        tablet_id: impl Into<String>,
        block_a: impl Into<String>,
        block_b: impl Into<String>,
    ) -> Self {
        Self {
            tablet_id: tablet_id.into(),
            block_a: block_a.into(),
            block_b: block_b.into(),
        }
    }

    pub fn tablet_id(&self) -> &str {
        &self.tablet_id
    }

    pub fn block_a(&self) -> &str {
        &self.block_a
    }

    pub fn block_b(&self) -> &str {
        &self.block_b
    }

    /// Block that superblock number `seq` is written to
    pub fn block_for_sequence(&self, seq: u64) -> &str {
        if seq % 2 == 0 {
            &self.block_a
        } else {
            &self.block_b
        }
    }

    /// Check that the ids are usable as file names and the blocks differ
    pub fn validate(&self) -> Result<()> {
        for (what, id) in [
            ("tablet id", &self.tablet_id),
            ("block a", &self.block_a),
            ("block b", &self.block_b),
        ] {
            if id.is_empty() {
                return Err(TabletError::Metadata(format!("{} is empty", what)));
            }
            if !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(TabletError::Metadata(format!(
                    "{} '{}' contains invalid characters",
                    what, id
                )));
            }
        }

        if self.block_a == self.block_b {
            return Err(TabletError::Metadata(format!(
                "tablet {}: block a and block b are both '{}'",
                self.tablet_id, self.block_a
            )));
        }

        Ok(())
    }
}
