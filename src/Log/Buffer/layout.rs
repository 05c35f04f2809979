// On-region layout of a log entry:
//
//   header (4 bytes) | payload (len bytes) | padding to the next 4-byte boundary
//
// The header is a single u32 so it can be claimed with one compare-and-swap.
// High 16 bits: producer tag (producer index + 1). Low 16 bits: payload length.

/// Size of an entry header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Every entry starts on a multiple of this.
pub const ENTRY_ALIGN: usize = 4;

/// Header value of a slot nobody has claimed yet.
pub const FREE_HEADER: u32 = 0;

/// Largest producer index that can be encoded. The tag `index + 1` must fit in
/// 16 bits and stay non-zero.
pub const MAX_PRODUCER_INDEX: u16 = 0xFFFE;

/// Largest payload a header can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Smallest region that can hold one entry with a one-byte payload.
pub const MIN_REGION_SIZE: usize = HEADER_SIZE + ENTRY_ALIGN;

/// Decoded form of a claimed header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryHeader {
    producer_index: u16,
    payload_len: u16,
}

impl EntryHeader {
    /// Header for a message of `payload_len` bytes. `None` if the index cannot
    /// be encoded.
    pub fn new(producer_index: u16, payload_len: u16) -> Option<Self> {
        if producer_index > MAX_PRODUCER_INDEX {
            return None;
        }
        Some(Self {
            producer_index,
            payload_len,
        })
    }

    /// Zero-length header recorded when a producer could not fit its message.
    pub fn failure_marker(producer_index: u16) -> Option<Self> {
        Self::new(producer_index, 0)
    }

    #[inline]
    pub fn producer_index(&self) -> u16 {
        self.producer_index
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    #[inline]
    pub fn is_failure_marker(&self) -> bool {
        self.payload_len == 0
    }

    /// Bytes this entry occupies in the region, padding included.
    #[inline]
    pub fn span(&self) -> usize {
        entry_span(self.payload_len())
    }

    /// Pack into the raw word stored in the region. Never returns `FREE_HEADER`.
    #[inline]
    pub fn pack(&self) -> u32 {
        ((self.producer_index as u32 + 1) << 16) | self.payload_len as u32
    }

    /// Decode a raw header word. `None` for a free slot, and for a non-zero
    /// word with a zero producer tag, which no producer ever writes.
    #[inline]
    pub fn unpack(raw: u32) -> Option<Self> {
        let tag = (raw >> 16) as u16;
        if tag == 0 {
            return None;
        }
        Some(Self {
            producer_index: tag - 1,
            payload_len: raw as u16,
        })
    }
}

/// Payload length declared by a raw header, valid for any non-free word.
/// Producers use this to skip over slots other producers won.
#[inline]
pub fn declared_len(raw: u32) -> usize {
    (raw & 0xFFFF) as usize
}

/// Round `offset` up to the next entry boundary.
#[inline]
pub const fn align_up(offset: usize) -> usize {
    (offset + ENTRY_ALIGN - 1) & !(ENTRY_ALIGN - 1)
}

/// Bytes occupied by an entry whose payload is `payload_len` bytes long.
#[inline]
pub const fn entry_span(payload_len: usize) -> usize {
    align_up(HEADER_SIZE + payload_len)
}

/// Number of leading payload bytes that are non-zero. Payloads never contain
/// a NUL byte and the region starts zeroed, so a shorter result means the
/// payload is not fully visible yet.
#[inline]
pub fn effective_len(bytes: &[u8]) -> usize {
    bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())
}
