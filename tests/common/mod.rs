//! Shared test doubles
//!
//! - `ManualClock`: records every wait and can stop a task after N waits
//! - `FakeTablet`: scripted memory usage, call counters, injected failures
//! - `FakePeer` / `RecordingProvider`: record the bootstrap call order and
//!   fail at a chosen stage

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tabletd::bootstrap::TabletProvider;
use tabletd::maintenance::{Clock, StopSignal};
use tabletd::metadata::{MasterBlock, TabletMetadata};
use tabletd::schema::{key_value_schema, Schema};
use tabletd::tablet::{CompactFlags, TabletHandle};
use tabletd::tablet_peer::{PeerState, ReplicaPeer};
use tabletd::{Result, TabletError};
use tempfile::TempDir;

pub const MB: usize = 1024 * 1024;

// =============================================================================
// Paths and identities
// =============================================================================

pub fn setup_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

pub fn master_block(tablet_id: &str) -> MasterBlock {
    MasterBlock::new(
        tablet_id,
        format!("{}-block-a", tablet_id),
        format!("{}-block-b", tablet_id),
    )
}

pub fn test_schema() -> Schema {
    key_value_schema()
}

/// Poll `cond` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

// =============================================================================
// ManualClock
// =============================================================================

/// Clock that never waits for real.
///
/// Every requested wait is recorded. With a limit, the wait that reaches the
/// limit tells the task to exit; otherwise the task yields for a millisecond
/// and keeps going until its stop signal fires.
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
    max_sleeps: Option<usize>,
}

impl ManualClock {
    pub fn unlimited() -> Arc<Self> {
        Arc::new(Self {
            sleeps: Mutex::new(Vec::new()),
            max_sleeps: None,
        })
    }

    pub fn stop_after(max_sleeps: usize) -> Arc<Self> {
        Arc::new(Self {
            sleeps: Mutex::new(Vec::new()),
            max_sleeps: Some(max_sleeps),
        })
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration, stop: &StopSignal) -> bool {
        let count = {
            let mut sleeps = self.sleeps.lock();
            sleeps.push(duration);
            sleeps.len()
        };
        if self.max_sleeps.is_some_and(|max| count >= max) {
            return true;
        }
        stop.wait_timeout(Duration::from_millis(1))
    }
}

// =============================================================================
// FakeTablet
// =============================================================================

/// Tablet whose memory usage follows a script.
///
/// Each `mem_rowset_size` call consumes one scripted value; the last value
/// repeats forever. Failures are injected by 1-based call number.
pub struct FakeTablet {
    id: String,
    usage: Mutex<VecDeque<usize>>,
    flush_calls: AtomicUsize,
    compact_calls: AtomicUsize,
    failing_flushes: Mutex<HashSet<usize>>,
    failing_compactions: Mutex<HashSet<usize>>,
    always_fail_compact: Mutex<bool>,
    compact_flags: Mutex<Vec<CompactFlags>>,
}

impl FakeTablet {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            usage: Mutex::new(VecDeque::from([0])),
            flush_calls: AtomicUsize::new(0),
            compact_calls: AtomicUsize::new(0),
            failing_flushes: Mutex::new(HashSet::new()),
            failing_compactions: Mutex::new(HashSet::new()),
            always_fail_compact: Mutex::new(false),
            compact_flags: Mutex::new(Vec::new()),
        }
    }

    pub fn with_usage(self, usage: &[usize]) -> Self {
        *self.usage.lock() = usage.iter().copied().collect();
        self
    }

    pub fn fail_flush_on(self, call: usize) -> Self {
        self.failing_flushes.lock().insert(call);
        self
    }

    pub fn fail_compact_on(self, call: usize) -> Self {
        self.failing_compactions.lock().insert(call);
        self
    }

    pub fn always_fail_compact(self) -> Self {
        *self.always_fail_compact.lock() = true;
        self
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    pub fn compact_calls(&self) -> usize {
        self.compact_calls.load(Ordering::SeqCst)
    }

    pub fn compact_flags(&self) -> Vec<CompactFlags> {
        self.compact_flags.lock().clone()
    }
}

impl TabletHandle for FakeTablet {
    fn tablet_id(&self) -> &str {
        &self.id
    }

    fn mem_rowset_size(&self) -> usize {
        let mut usage = self.usage.lock();
        if usage.len() > 1 {
            usage.pop_front().unwrap_or(0)
        } else {
            usage.front().copied().unwrap_or(0)
        }
    }

    fn flush(&self) -> Result<()> {
        let call = self.flush_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_flushes.lock().contains(&call) {
            return Err(TabletError::Flush(format!(
                "tablet {}: injected failure on call {}",
                self.id, call
            )));
        }
        Ok(())
    }

    fn compact(&self, flags: CompactFlags) -> Result<()> {
        let call = self.compact_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.compact_flags.lock().push(flags);
        if *self.always_fail_compact.lock() || self.failing_compactions.lock().contains(&call) {
            return Err(TabletError::Compact(format!(
                "tablet {}: injected failure on call {}",
                self.id, call
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Bootstrap doubles
// =============================================================================

/// Stage at which a `RecordingProvider` fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Metadata,
    Open,
    Init,
    Start,
}

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// Peer over a `FakeTablet` that records its lifecycle calls
pub struct FakePeer {
    tablet: Arc<FakeTablet>,
    state: Mutex<PeerState>,
    calls: CallLog,
    fail_at: Option<FailAt>,
}

impl std::fmt::Debug for FakePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakePeer")
            .field("tablet_id", &self.tablet.tablet_id())
            .field("fail_at", &self.fail_at)
            .finish_non_exhaustive()
    }
}

impl FakePeer {
    pub fn new(tablet: Arc<FakeTablet>) -> Self {
        Self {
            tablet,
            state: Mutex::new(PeerState::Started),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
        }
    }

    pub fn fake_tablet(&self) -> &Arc<FakeTablet> {
        &self.tablet
    }
}

impl ReplicaPeer for FakePeer {
    fn tablet_id(&self) -> &str {
        self.tablet.tablet_id()
    }

    fn state(&self) -> PeerState {
        *self.state.lock()
    }

    fn init(&self) -> Result<()> {
        self.calls.lock().push("init");
        if self.fail_at == Some(FailAt::Init) {
            return Err(TabletError::Init(format!(
                "tablet {}: injected init failure",
                self.tablet_id()
            )));
        }
        *self.state.lock() = PeerState::Initialized;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.calls.lock().push("start");
        if self.fail_at == Some(FailAt::Start) {
            return Err(TabletError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected start failure",
            )));
        }
        *self.state.lock() = PeerState::Started;
        Ok(())
    }

    fn tablet(&self) -> Arc<dyn TabletHandle> {
        self.tablet.clone()
    }
}

/// Provider that records every call in order
pub struct RecordingProvider {
    calls: CallLog,
    fail_at: Option<FailAt>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
        }
    }

    pub fn failing_at(stage: FailAt) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at: Some(stage),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

impl TabletProvider for RecordingProvider {
    type Tablet = FakeTablet;
    type Peer = FakePeer;

    fn load_or_create_metadata(
        &self,
        master_block: &MasterBlock,
        schema: &Schema,
    ) -> Result<TabletMetadata> {
        self.calls.lock().push("metadata");
        if self.fail_at == Some(FailAt::Metadata) {
            return Err(TabletError::Corruption(
                "injected metadata failure".to_string(),
            ));
        }
        Ok(TabletMetadata::new(master_block.clone(), schema.clone()))
    }

    fn open_tablet(&self, metadata: TabletMetadata) -> Result<Arc<FakeTablet>> {
        self.calls.lock().push("open");
        if self.fail_at == Some(FailAt::Open) {
            return Err(TabletError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected open failure",
            )));
        }
        Ok(Arc::new(FakeTablet::new(metadata.tablet_id())))
    }

    fn new_peer(&self, tablet: Arc<FakeTablet>) -> Arc<FakePeer> {
        self.calls.lock().push("new_peer");
        Arc::new(FakePeer {
            tablet,
            state: Mutex::new(PeerState::Created),
            calls: Arc::clone(&self.calls),
            fail_at: self.fail_at,
        })
    }
}
