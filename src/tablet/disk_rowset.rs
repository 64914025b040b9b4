//! Disk row sets
//!
//! Immutable sorted files written by flushes and compactions.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "TDRS" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                        │
//! │   DataCRC: u32                                          │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use parking_lot::Mutex;

use crate::error::{Result, TabletError};

use super::RowEntry;

/// Magic bytes identifying a disk row set file
const MAGIC: &[u8; 4] = b"TDRS";

/// Current format version
const VERSION: u16 = 1;

/// Magic (4) + Version (2) + EntryCount (8)
const HEADER_SIZE: usize = 14;

/// DataCRC (4)
const FOOTER_SIZE: usize = 4;

/// KeyLen (4) + ValLen (4)
const ENTRY_HEADER_SIZE: usize = 8;

/// Sentinel value length marking a tombstone
const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Longest key a length field can describe
const MAX_KEY_LEN: u32 = u32::MAX;

/// Longest value that cannot be mistaken for a tombstone
const MAX_VALUE_LEN: u32 = TOMBSTONE_MARKER - 1;

const FILE_PREFIX: &str = "rowset_";
const FILE_EXTENSION: &str = "drs";

/// An open, immutable disk row set
pub struct DiskRowSet {
    id: u64,
    path: PathBuf,
    /// key → offset of the entry in the file
    index: BTreeMap<Vec<u8>, u64>,
    file: Mutex<File>,
}

impl DiskRowSet {
    /// File name of row set `id` inside a tablet's data directory
    pub fn path_for(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("{}{:06}.{}", FILE_PREFIX, id, FILE_EXTENSION))
    }

    /// "rowset_000042.drs" → Some(42)
    pub fn parse_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != FILE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        stem.strip_prefix(FILE_PREFIX)?.parse().ok()
    }

    /// Write sorted entries as row set `id` and open it.
    ///
    /// The file is written under a temporary name and renamed once synced,
    /// so a crash never leaves a half-written row set under its real name.
    pub fn write<I>(dir: &Path, id: u64, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<u8>, RowEntry)>,
    {
        let mut data = BytesMut::new();
        let mut count = 0u64;
        let mut last_key: Option<Vec<u8>> = None;

        for (key, entry) in entries {
            if last_key.as_ref().is_some_and(|last| *last >= key) {
                return Err(TabletError::InvalidState(format!(
                    "row set {} entries are not strictly sorted",
                    id
                )));
            }
            data.put_u32_le(field_len(id, "key", key.len(), MAX_KEY_LEN)?);
            match &entry {
                RowEntry::Value(value) => {
                    data.put_u32_le(field_len(id, "value", value.len(), MAX_VALUE_LEN)?);
                    data.put_slice(&key);
                    data.put_slice(value);
                }
                RowEntry::Tombstone => {
                    data.put_u32_le(TOMBSTONE_MARKER);
                    data.put_slice(&key);
                }
            }
            count += 1;
            last_key = Some(key);
        }

        let mut file_bytes = BytesMut::with_capacity(HEADER_SIZE + data.len() + FOOTER_SIZE);
        file_bytes.put_slice(MAGIC);
        file_bytes.put_u16_le(VERSION);
        file_bytes.put_u64_le(count);
        file_bytes.put_slice(&data);
        file_bytes.put_u32_le(crc32fast::hash(&data));

        fs::create_dir_all(dir)?;
        let path = Self::path_for(dir, id);
        let tmp_path = path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&file_bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Self::open(&path)
    }

    /// Open a row set, verifying its checksum and loading its index
    pub fn open(path: &Path) -> Result<Self> {
        let id = Self::parse_id(path).ok_or_else(|| {
            TabletError::Corruption(format!("not a row set file: {}", path.display()))
        })?;

        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let mut index = BTreeMap::new();
        for (offset, key, _) in Self::parse(path, &contents)? {
            index.insert(key, offset);
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            index,
            file: Mutex::new(file),
        })
    }

    /// Point lookup.
    ///
    /// Returns `Ok(None)` if the key is not in this row set;
    /// `Ok(Some(RowEntry::Tombstone))` if it was deleted here.
    pub fn get(&self, key: &[u8]) -> Result<Option<RowEntry>> {
        let offset = match self.index.get(key) {
            Some(&offset) => offset,
            None => return Ok(None),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        file.read_exact(&mut header)?;
        let mut header = &header[..];
        let key_len = header.get_u32_le() as u64;
        let value_len = header.get_u32_le();

        if value_len == TOMBSTONE_MARKER {
            return Ok(Some(RowEntry::Tombstone));
        }

        file.seek(SeekFrom::Current(key_len as i64))?;
        let mut value = vec![0u8; value_len as usize];
        file.read_exact(&mut value)?;
        Ok(Some(RowEntry::Value(value)))
    }

    /// All entries in key order
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, RowEntry)>> {
        let contents = fs::read(&self.path)?;
        Ok(Self::parse(&self.path, &contents)?
            .into_iter()
            .map(|(_, key, entry)| (key, entry))
            .collect())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Parse a whole file into (offset, key, entry) triples
    fn parse(path: &Path, contents: &[u8]) -> Result<Vec<(u64, Vec<u8>, RowEntry)>> {
        let corrupt = |what: &str| {
            TabletError::Corruption(format!("row set {}: {}", path.display(), what))
        };

        if contents.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt("file too short"));
        }

        let mut header = &contents[..HEADER_SIZE];
        if &header[..4] != MAGIC {
            return Err(corrupt("invalid magic"));
        }
        header.advance(4);
        let version = header.get_u16_le();
        if version != VERSION {
            return Err(corrupt(&format!("unsupported version {}", version)));
        }
        let count = header.get_u64_le();

        let data_end = contents.len() - FOOTER_SIZE;
        let data = &contents[HEADER_SIZE..data_end];
        let expected_crc = (&contents[data_end..]).get_u32_le();
        if crc32fast::hash(data) != expected_crc {
            return Err(corrupt("data CRC mismatch"));
        }

        // The CRC covers only the data block, so the count is checked
        // against what the data could possibly hold before allocating.
        let max_entries = (data.len() / ENTRY_HEADER_SIZE) as u64;
        if count > max_entries {
            return Err(corrupt(&format!(
                "header says {} entries, data holds at most {}",
                count, max_entries
            )));
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut cursor = data;
        while cursor.has_remaining() {
            let offset = (HEADER_SIZE + data.len() - cursor.remaining()) as u64;
            if cursor.remaining() < ENTRY_HEADER_SIZE {
                return Err(corrupt("truncated entry header"));
            }
            let key_len = cursor.get_u32_le() as usize;
            let value_len = cursor.get_u32_le();
            let body_len = if value_len == TOMBSTONE_MARKER {
                key_len
            } else {
                key_len + value_len as usize
            };
            if cursor.remaining() < body_len {
                return Err(corrupt("truncated entry body"));
            }

            let key = cursor[..key_len].to_vec();
            cursor.advance(key_len);
            let entry = if value_len == TOMBSTONE_MARKER {
                RowEntry::Tombstone
            } else {
                let value = cursor[..value_len as usize].to_vec();
                cursor.advance(value_len as usize);
                RowEntry::Value(value)
            };
            entries.push((offset, key, entry));
        }

        if entries.len() as u64 != count {
            return Err(corrupt(&format!(
                "header says {} entries, found {}",
                count,
                entries.len()
            )));
        }

        Ok(entries)
    }
}

/// Length of a key or value as stored in an entry header
fn field_len(id: u64, what: &str, len: usize, limit: u32) -> Result<u32> {
    match u32::try_from(len) {
        Ok(len) if len <= limit => Ok(len),
        _ => Err(TabletError::InvalidState(format!(
            "row set {}: {} of {} bytes exceeds the limit of {} bytes",
            id, what, len, limit
        ))),
    }
}
