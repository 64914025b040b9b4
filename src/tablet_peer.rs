//! Tablet Peer
//!
//! A tablet bound to a replication role. The peer owns the write-ahead log:
//! writes are appended to the log, then applied to the tablet. On start the
//! log is replayed so that writes which never reached a durable row set are
//! restored. Every flush made through [`ReplicaPeer::tablet`] trims the log
//! of entries the new row set made durable.
//!
//! ## Lifecycle
//! ```text
//!   Created ──init()──▶ Initialized ──start()──▶ Started
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LogSyncStrategy;
use crate::error::{Result, TabletError};
use crate::log::{LogReader, LogWriter, WriteOp};
use crate::tablet::{CompactFlags, Tablet, TabletHandle};

/// Lifecycle state of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    Initialized,
    Started,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::Created => "CREATED",
            PeerState::Initialized => "INITIALIZED",
            PeerState::Started => "STARTED",
        };
        f.write_str(name)
    }
}

/// Role of the peer in its replication group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    /// Not yet taking part (before start)
    NonParticipant,

    /// Sole replica accepting writes
    Leader,
}

/// What the bootstrap sequence and the registry need from a peer
pub trait ReplicaPeer: Send + Sync {
    fn tablet_id(&self) -> &str;

    fn state(&self) -> PeerState;

    /// Prepare the peer (Created → Initialized)
    fn init(&self) -> Result<()>;

    /// Begin the replication role (Initialized → Started)
    fn start(&self) -> Result<()>;

    /// The tablet this peer wraps, for maintenance
    fn tablet(&self) -> Arc<dyn TabletHandle>;
}

/// Options for a local peer
#[derive(Debug, Clone)]
pub struct PeerOptions {
    /// Path of the peer's write-ahead log
    pub log_path: PathBuf,

    pub log_sync_strategy: LogSyncStrategy,
}

struct PeerInner {
    state: PeerState,
    role: ReplicaRole,
    log: Option<LogWriter>,
}

/// Single-replica peer over a local write-ahead log
pub struct TabletPeer {
    tablet: Arc<Tablet>,
    options: PeerOptions,
    inner: Arc<Mutex<PeerInner>>,
}

impl fmt::Debug for TabletPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabletPeer")
            .field("tablet_id", &self.tablet.tablet_id())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TabletPeer {
    pub fn new(tablet: Arc<Tablet>, options: PeerOptions) -> Self {
        Self {
            tablet,
            options,
            inner: Arc::new(Mutex::new(PeerInner {
                state: PeerState::Created,
                role: ReplicaRole::NonParticipant,
                log: None,
            })),
        }
    }

    /// Log and apply a write; returns its LSN
    pub fn write(&self, op: WriteOp) -> Result<u64> {
        let mut inner = self.inner.lock();
        if inner.state != PeerState::Started {
            return Err(TabletError::InvalidState(format!(
                "tablet {} is {}, not accepting writes",
                self.tablet.tablet_id(),
                inner.state
            )));
        }

        let log = inner.log.as_mut().ok_or_else(|| {
            TabletError::InvalidState(format!("tablet {} has no log", self.tablet.tablet_id()))
        })?;
        let lsn = log.append(op.clone())?;
        self.tablet.apply(lsn, &op)?;
        Ok(lsn)
    }

    /// Drop log entries already covered by durable row sets.
    ///
    /// Returns whether anything was dropped.
    pub fn gc_log(&self) -> Result<bool> {
        trim_log(&self.tablet, &self.inner)
    }

    pub fn role(&self) -> ReplicaRole {
        self.inner.lock().role
    }

    /// The concrete tablet (reads and inspection)
    pub fn local_tablet(&self) -> &Arc<Tablet> {
        &self.tablet
    }

    /// Replay log entries not yet covered by durable row sets
    fn replay(&self, log: &mut LogWriter) -> Result<u64> {
        let durable = self.tablet.last_durable_lsn();
        log.advance_to(durable);

        let path = log.path().to_path_buf();
        let (entries, read) = LogReader::open(&path)?.read_all()?;

        let mut replayed = 0;
        for entry in entries.into_iter().filter(|e| e.lsn > durable) {
            self.tablet.apply(entry.lsn, &entry.op)?;
            replayed += 1;
        }

        tracing::info!(
            tablet_id = self.tablet.tablet_id(),
            entries_in_log = read.entries_read,
            replayed,
            durable_lsn = durable,
            "Log replay complete"
        );
        Ok(replayed)
    }
}

impl ReplicaPeer for TabletPeer {
    fn tablet_id(&self) -> &str {
        self.tablet.tablet_id()
    }

    fn state(&self) -> PeerState {
        self.inner.lock().state
    }

    fn init(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != PeerState::Created {
            return Err(TabletError::Init(format!(
                "tablet {}: peer is {}, expected CREATED",
                self.tablet.tablet_id(),
                inner.state
            )));
        }
        if !self.tablet.is_open() {
            return Err(TabletError::Init(format!(
                "tablet {}: tablet is not open",
                self.tablet.tablet_id()
            )));
        }

        let log = LogWriter::open(&self.options.log_path, self.options.log_sync_strategy)
            .map_err(|e| {
                TabletError::Init(format!(
                    "tablet {}: cannot open log {}: {}",
                    self.tablet.tablet_id(),
                    self.options.log_path.display(),
                    e
                ))
            })?;

        inner.log = Some(log);
        inner.state = PeerState::Initialized;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != PeerState::Initialized {
            return Err(TabletError::Start(format!(
                "tablet {}: peer is {}, expected INITIALIZED",
                self.tablet.tablet_id(),
                inner.state
            )));
        }

        let mut log = inner.log.take().ok_or_else(|| {
            TabletError::Start(format!("tablet {}: no log", self.tablet.tablet_id()))
        })?;
        let replayed = self.replay(&mut log);
        inner.log = Some(log);
        replayed.map_err(|e| {
            TabletError::Start(format!(
                "tablet {}: log replay failed: {}",
                self.tablet.tablet_id(),
                e
            ))
        })?;

        inner.role = ReplicaRole::Leader;
        inner.state = PeerState::Started;
        Ok(())
    }

    fn tablet(&self) -> Arc<dyn TabletHandle> {
        Arc::new(LogTrimmingTablet {
            tablet: self.tablet.clone(),
            inner: self.inner.clone(),
        })
    }
}

/// Handed to maintenance: a flush is followed by a log trim
struct LogTrimmingTablet {
    tablet: Arc<Tablet>,
    inner: Arc<Mutex<PeerInner>>,
}

impl TabletHandle for LogTrimmingTablet {
    fn tablet_id(&self) -> &str {
        self.tablet.tablet_id()
    }

    fn mem_rowset_size(&self) -> usize {
        self.tablet.mem_rowset_size()
    }

    fn flush(&self) -> Result<()> {
        self.tablet.flush()?;
        trim_log(&self.tablet, &self.inner).map_err(|e| {
            TabletError::Flush(format!(
                "tablet {}: log trim failed: {}",
                self.tablet.tablet_id(),
                e
            ))
        })?;
        Ok(())
    }

    fn compact(&self, flags: CompactFlags) -> Result<()> {
        self.tablet.compact(flags)
    }
}

fn trim_log(tablet: &Tablet, inner: &Mutex<PeerInner>) -> Result<bool> {
    // Held across the trim so no write lands between reading and replacing
    let mut inner = inner.lock();
    let durable = tablet.last_durable_lsn();
    let log = match inner.log.as_mut() {
        Some(log) => log,
        None => return Ok(false),
    };

    let dropped = log.discard_through(durable)?;
    if dropped > 0 {
        tracing::debug!(
            tablet_id = tablet.tablet_id(),
            durable_lsn = durable,
            dropped,
            "Trimmed log"
        );
    }
    Ok(dropped > 0)
}
