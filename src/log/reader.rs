//! Log Reader
//!
//! Reads every valid entry of a log file, stopping at the first torn or
//! corrupted entry.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;

use super::{LogEntry, HEADER_SIZE};

/// Outcome of reading a log file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// Number of valid entries read
    pub entries_read: u64,

    /// LSN of the last valid entry (0 if none)
    pub last_lsn: u64,

    /// Length of the valid prefix of the file
    pub valid_bytes: u64,

    /// Whether bytes after the valid prefix were found (torn or corrupt tail)
    pub has_invalid_tail: bool,
}

/// Reads entries from a log file
pub struct LogReader {
    reader: BufReader<File>,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Read all valid entries in order
    pub fn read_all(mut self) -> Result<(Vec<LogEntry>, ReadResult)> {
        let mut entries = Vec::new();
        let mut result = ReadResult::default();

        loop {
            let mut header = [0u8; HEADER_SIZE];
            match read_fully(&mut self.reader, &mut header)? {
                0 => break,
                n if n < HEADER_SIZE => {
                    result.has_invalid_tail = true;
                    break;
                }
                _ => {}
            }

            let (lsn, crc, len) = LogEntry::parse_header(&header);
            let mut payload = vec![0u8; len];
            if read_fully(&mut self.reader, &mut payload)? < len {
                result.has_invalid_tail = true;
                break;
            }

            match LogEntry::deserialize(lsn, crc, &payload) {
                Ok(entry) if entry.lsn > result.last_lsn => {
                    result.entries_read += 1;
                    result.last_lsn = entry.lsn;
                    result.valid_bytes += (HEADER_SIZE + len) as u64;
                    entries.push(entry);
                }
                Ok(entry) => {
                    tracing::warn!(
                        lsn = entry.lsn,
                        last_lsn = result.last_lsn,
                        "Log entry out of sequence, dropping tail"
                    );
                    result.has_invalid_tail = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Corrupt log entry, dropping tail");
                    result.has_invalid_tail = true;
                    break;
                }
            }
        }

        Ok((entries, result))
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
