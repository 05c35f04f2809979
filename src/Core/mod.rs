pub mod SharedMemory;
pub mod error;

pub use error::{LogError, LogResult};
pub use SharedMemory::{
    attach_process_memory, attach_shared_memory, create_shared_memory, unlink_shared_memory,
    HeapSharedMemory, RawHandle, SharedMemoryBackend, PAGE_SIZE,
};
