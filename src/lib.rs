// Module naming follows project convention (Log = the shared message log, Core = mapping and errors)
#[allow(non_snake_case)]
pub mod Log;

#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod ffi;

pub use Core::{LogError, LogResult};
pub use Log::{
    claim, poll, Consumer, ExhaustionPolicy, LogBuilder, LogConfig, Producer, ScanStart, SharedLog,
};
pub use Log::Structs::{ClaimReceipt, Cursor, EntryPayload, LogEntry, PollBatch, StopReason};
