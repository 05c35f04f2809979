// Error type shared by the region, the slot allocator and the stream reader.

use std::io;
use thiserror::Error;

use crate::Log::Buffer::layout::MAX_PRODUCER_INDEX;

pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    /// No contiguous free slot was large enough. This is the only error that
    /// means a message was permanently lost.
    #[error("log exhausted: no free slot for a {len}-byte entry from producer {producer_index} (failure marker recorded: {marker_recorded})")]
    Exhausted {
        producer_index: u16,
        len: usize,
        marker_recorded: bool,
    },

    #[error("message too large ({len} > {max})")]
    MessageTooLarge { len: usize, max: usize },

    #[error("empty payloads are reserved for failure markers")]
    EmptyPayload,

    #[error("payload contains a NUL byte at position {position}")]
    InteriorNul { position: usize },

    #[error("payload of {actual} bytes does not match the {expected} bytes reserved")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("slot at offset {offset} was already written")]
    AlreadyWritten { offset: usize },

    #[error("producer index {0} exceeds the maximum of {max}", max = MAX_PRODUCER_INDEX)]
    InvalidProducerIndex(u16),

    #[error("access of {len} bytes at offset {offset} is outside the {capacity}-byte region")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shared memory mapping failed: {context}")]
    Mapping {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    pub(crate) fn mapping(context: impl Into<String>, source: io::Error) -> Self {
        LogError::Mapping {
            context: context.into(),
            source,
        }
    }

    /// True for the space-exhaustion outcome, regardless of policy.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, LogError::Exhausted { .. })
    }
}

impl From<LogError> for io::Error {
    fn from(err: LogError) -> Self {
        let kind = match &err {
            LogError::Exhausted { .. } => io::ErrorKind::OutOfMemory,
            LogError::MessageTooLarge { .. }
            | LogError::EmptyPayload
            | LogError::InteriorNul { .. }
            | LogError::LengthMismatch { .. }
            | LogError::AlreadyWritten { .. }
            | LogError::InvalidProducerIndex(_)
            | LogError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            LogError::OutOfBounds { .. } | LogError::InvalidRegion(_) => io::ErrorKind::InvalidData,
            LogError::Mapping { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}
