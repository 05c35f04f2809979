use std::sync::Arc;

use super::Buffer::layout::{ENTRY_ALIGN, MAX_PAYLOAD_LEN, MAX_PRODUCER_INDEX, MIN_REGION_SIZE};
use super::Buffer::SharedRegion;
use super::{Consumer, Producer};
use crate::Core::error::{LogError, LogResult};
use crate::Core::SharedMemory::{RawHandle, PAGE_SIZE};

/// Largest message accepted by default; matches a 256-byte text buffer with
/// room for its terminator.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 255;

/// What a producer does when no slot is large enough for its message.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Give up without leaving a trace in the region.
    #[default]
    SilentDrop,
    /// Make a second pass to claim a zero-length failure marker, so the
    /// consumer can report the loss.
    FailureMarker,
}

/// Where a producer starts scanning for a free slot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ScanStart {
    /// Every claim scans from offset 0. Costs O(occupied bytes) per claim.
    #[default]
    Origin,
    /// Resume where this producer's previous scan ended. Headers are never
    /// freed, so every byte below that point is already claimed.
    LastClaim,
}

/// How the region is backed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Backing {
    /// Private to this process; shared between threads only.
    Heap,
    /// Anonymous memfd; inherited across fork, attachable through /proc.
    #[default]
    Anonymous,
    /// Named file under /dev/shm.
    Named(String),
}

/// Settings shared by every producer and the consumer of one log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// Region size in bytes.
    pub capacity: usize,
    /// Longest payload a producer may claim, and the reader's scratch bound.
    pub max_message_len: usize,
    pub exhaustion: ExhaustionPolicy,
    pub scan_start: ScanStart,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: PAGE_SIZE,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            exhaustion: ExhaustionPolicy::default(),
            scan_start: ScanStart::default(),
        }
    }
}

impl LogConfig {
    pub fn validate(&self) -> LogResult<()> {
        if self.capacity < MIN_REGION_SIZE || self.capacity % ENTRY_ALIGN != 0 {
            return Err(LogError::InvalidConfig(format!(
                "capacity {} must be a multiple of {} and at least {}",
                self.capacity, ENTRY_ALIGN, MIN_REGION_SIZE
            )));
        }
        if self.max_message_len == 0 || self.max_message_len > MAX_PAYLOAD_LEN {
            return Err(LogError::InvalidConfig(format!(
                "max_message_len {} must be between 1 and {}",
                self.max_message_len, MAX_PAYLOAD_LEN
            )));
        }
        Ok(())
    }
}

pub struct LogBuilder {
    config: LogConfig,
    backing: Backing,
}

impl Default for LogBuilder {
    fn default() -> Self {
        Self {
            config: LogConfig::default(),
            backing: Backing::default(),
        }
    }
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.config.max_message_len = max_message_len;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.config.exhaustion = policy;
        self
    }

    pub fn with_scan_start(mut self, scan_start: ScanStart) -> Self {
        self.config.scan_start = scan_start;
        self
    }

    /// Back the log with /dev/shm/<name> so unrelated processes can attach.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.backing = Backing::Named(name.into());
        self
    }

    /// Back the log with process-private memory (threads only).
    pub fn process_local(mut self) -> Self {
        self.backing = Backing::Heap;
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Create a fresh, zeroed region and wrap it.
    pub fn build(self) -> LogResult<SharedLog> {
        self.config.validate()?;
        let region = match &self.backing {
            Backing::Heap => SharedRegion::heap(self.config.capacity)?,
            Backing::Anonymous => SharedRegion::create(self.config.capacity, None)?,
            Backing::Named(name) => SharedRegion::create(self.config.capacity, Some(name))?,
        };
        tracing::debug!(
            capacity = region.capacity(),
            backing = ?self.backing,
            "built shared log"
        );
        SharedLog::from_region(Arc::new(region), self.config)
    }

    /// Attach to a log another process created with `with_name`.
    pub fn attach(self, name: &str) -> LogResult<SharedLog> {
        self.config.validate()?;
        let region = SharedRegion::attach(name, self.config.capacity)?;
        SharedLog::from_region(Arc::new(region), self.config)
    }

    /// Attach to the region another process holds open as `handle`.
    pub fn attach_process(self, pid: u32, handle: RawHandle) -> LogResult<SharedLog> {
        self.config.validate()?;
        let region = SharedRegion::attach_process(pid, handle, self.config.capacity)?;
        SharedLog::from_region(Arc::new(region), self.config)
    }
}

/// A mapped log region plus the configuration its participants agree on.
#[derive(Clone)]
pub struct SharedLog {
    region: Arc<SharedRegion>,
    config: LogConfig,
}

impl SharedLog {
    /// Wrap an existing region. The configured capacity is replaced by the
    /// region's actual capacity.
    pub fn from_region(region: Arc<SharedRegion>, mut config: LogConfig) -> LogResult<Self> {
        config.capacity = region.capacity();
        config.validate()?;
        Ok(Self { region, config })
    }

    /// A producer writing under `producer_index`.
    pub fn producer(&self, producer_index: u16) -> LogResult<Producer> {
        if producer_index > MAX_PRODUCER_INDEX {
            return Err(LogError::InvalidProducerIndex(producer_index));
        }
        Ok(Producer::new(
            Arc::clone(&self.region),
            producer_index,
            self.config.clone(),
        ))
    }

    /// A consumer starting at the beginning of the region.
    pub fn consumer(&self) -> Consumer {
        Consumer::new(Arc::clone(&self.region), self.config.max_message_len)
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.region.raw_handle()
    }
}
