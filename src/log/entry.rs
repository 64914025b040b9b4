//! Log entry definitions and framing.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabletError};

/// LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log Sequence Number - monotonically increasing, starts at 1
    pub lsn: u64,

    /// The write to apply
    pub op: WriteOp,

    /// Timestamp (unix millis) when the entry was created
    pub timestamp: u64,
}

/// Writes a tablet accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Insert or overwrite a row
    Insert { key: Vec<u8>, value: Vec<u8> },

    /// Delete a row
    Delete { key: Vec<u8> },
}

impl WriteOp {
    pub fn key(&self) -> &[u8] {
        match self {
            WriteOp::Insert { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

impl LogEntry {
    pub fn new(lsn: u64, op: WriteOp) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { lsn, op, timestamp }
    }

    /// Frame the entry: header followed by the bincode payload
    pub fn serialize(&self) -> Result<BytesMut> {
        let payload = bincode::serialize(self)?;
        let crc = Self::compute_crc(self.lsn, &payload);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u64_le(self.lsn);
        buf.put_u32_le(crc);
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(&payload);
        Ok(buf)
    }

    /// Parse a header into (lsn, crc, payload length)
    pub fn parse_header(mut header: &[u8]) -> (u64, u32, usize) {
        let lsn = header.get_u64_le();
        let crc = header.get_u32_le();
        let len = header.get_u32_le() as usize;
        (lsn, crc, len)
    }

    /// Verify and decode a payload read after `parse_header`
    pub fn deserialize(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, payload);
        if actual != crc {
            return Err(TabletError::Corruption(format!(
                "log entry {} CRC mismatch: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }

        let entry: LogEntry = bincode::deserialize(payload)?;
        if entry.lsn != lsn {
            return Err(TabletError::Corruption(format!(
                "log entry header LSN {} does not match payload LSN {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}
