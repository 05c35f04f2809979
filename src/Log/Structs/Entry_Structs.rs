// Values handed to callers by the slot allocator and the stream reader.
// None of these live in shared memory.

use crate::Log::Buffer::layout::entry_span;

/// What a consumed entry carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryPayload {
    /// A complete message.
    Message(Vec<u8>),
    /// The producer ran out of space and recorded only that fact.
    Failure,
}

/// One entry reported by the stream reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// Offset of the entry header in the region.
    pub offset: usize,
    pub producer_index: u16,
    pub payload: EntryPayload,
}

impl LogEntry {
    /// Declared payload length; zero for a failure marker.
    pub fn len(&self) -> usize {
        match &self.payload {
            EntryPayload::Message(bytes) => bytes.len(),
            EntryPayload::Failure => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.payload, EntryPayload::Failure)
    }

    pub fn message(&self) -> Option<&[u8]> {
        match &self.payload {
            EntryPayload::Message(bytes) => Some(bytes),
            EntryPayload::Failure => None,
        }
    }

    /// The message as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.message().and_then(|m| std::str::from_utf8(m).ok())
    }

    /// Offset just past this entry, padding included.
    pub fn end_offset(&self) -> usize {
        self.offset + entry_span(self.len())
    }
}

/// Consumer-local read position. Never shared, never synchronized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    offset: usize,
    consumed: u64,
}

impl Cursor {
    /// Cursor at the start of the region.
    pub const fn start() -> Self {
        Self {
            offset: 0,
            consumed: 0,
        }
    }

    /// Byte offset of the next entry to read.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Entries reported so far.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    #[inline]
    pub(crate) fn advance(&mut self, span: usize) {
        self.offset += span;
        self.consumed += 1;
    }
}

/// Why a poll stopped where it did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No room for another header before the end of the region.
    EndOfRegion,
    /// The next header has not been claimed yet.
    Unclaimed,
    /// The next header describes an entry this reader cannot trust yet: it runs
    /// past the region or past the reader's scratch bound.
    Overrun,
    /// The next entry's payload is not fully visible yet.
    Torn,
}

impl StopReason {
    /// True when retrying later may make progress on this region.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StopReason::EndOfRegion)
    }
}

/// Result of one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollBatch {
    pub cursor: Cursor,
    pub entries: Vec<LogEntry>,
    pub stop: StopReason,
}

/// Receipt for a successful claim.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Offset of the claimed header.
    pub offset: usize,
    pub producer_index: u16,
    /// Payload length recorded in the header.
    pub len: usize,
    /// Compare-and-swap attempts made, the successful one included.
    pub attempts: u32,
}

impl ClaimReceipt {
    /// Offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + crate::Log::Buffer::layout::HEADER_SIZE
    }

    /// Offset just past this entry, padding included.
    pub fn end_offset(&self) -> usize {
        self.offset + entry_span(self.len)
    }
}
