//! Log Writer
//!
//! Appends entries to the log file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::LogSyncStrategy;
use crate::error::Result;

use super::{LogEntry, LogReader, WriteOp};

/// Writes entries to the log file
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    last_lsn: u64,
    sync_strategy: LogSyncStrategy,
    unsynced: usize,
}

impl LogWriter {
    /// Open or create a log file.
    ///
    /// An existing file is scanned to continue its LSN sequence; a torn tail
    /// is cut off so new entries follow the last valid one.
    pub fn open(path: &Path, sync_strategy: LogSyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut last_lsn = 0;
        if path.exists() {
            let (_, read) = LogReader::open(path)?.read_all()?;
            last_lsn = read.last_lsn;
            if read.has_invalid_tail {
                tracing::warn!(
                    path = %path.display(),
                    valid_bytes = read.valid_bytes,
                    "Truncating invalid log tail"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(read.valid_bytes)?;
                file.sync_all()?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            last_lsn,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an operation; returns its LSN
    pub fn append(&mut self, op: WriteOp) -> Result<u64> {
        let entry = LogEntry::new(self.last_lsn + 1, op);
        let bytes = entry.serialize()?;
        self.writer.write_all(&bytes)?;
        self.last_lsn = entry.lsn;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            LogSyncStrategy::EveryWrite => true,
            LogSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(entry.lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all entries. The LSN sequence continues from where it was.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry with an LSN at or below `lsn`; returns how many went.
    ///
    /// Newer entries are copied to a temporary file which then replaces the
    /// log, so a crash leaves either the old or the trimmed log in place.
    pub fn discard_through(&mut self, lsn: u64) -> Result<u64> {
        self.writer.flush()?;
        let (entries, _) = LogReader::open(&self.path)?.read_all()?;
        let (dropped, kept): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.lsn <= lsn);

        if dropped.is_empty() {
            return Ok(0);
        }
        if kept.is_empty() {
            self.truncate()?;
            return Ok(dropped.len() as u64);
        }

        let tmp_path = self.path.with_extension("trim.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            for entry in &kept {
                file.write_all(&entry.serialize()?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.unsynced = 0;
        Ok(dropped.len() as u64)
    }

    /// Make the next LSN follow `lsn`, if it doesn't already.
    ///
    /// After a truncate and a restart the file alone no longer knows how far
    /// the sequence got; the owner passes in the highest LSN it has seen.
    pub fn advance_to(&mut self, lsn: u64) {
        self.last_lsn = self.last_lsn.max(lsn);
    }

    /// LSN of the last appended entry (0 if none)
    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
