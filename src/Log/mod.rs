mod builder;
mod consumer;
mod debug;
mod producer;

pub use builder::{
    Backing, ExhaustionPolicy, LogBuilder, LogConfig, ScanStart, SharedLog,
    DEFAULT_MAX_MESSAGE_LEN,
};
pub use consumer::{poll, poll_bounded, Consumer};
pub use producer::{claim, Producer, Reservation};

pub mod Buffer {
    pub mod Region;
    pub mod Region_impl;
    pub mod layout;
    pub use Region::{HeaderClaim, SharedRegion}; // re-export for stable path
}

pub mod Structs {
    pub mod Entry_Structs;
    pub use Entry_Structs::{ClaimReceipt, Cursor, EntryPayload, LogEntry, PollBatch, StopReason}; // re-export for stable path
}
