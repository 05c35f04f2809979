// The shared byte region the log lives in.

use crate::Core::SharedMemory::SharedMemoryBackend;
use std::ptr::NonNull;

/// A bounds-checked view of one shared memory region.
///
/// This struct is NOT stored in shared memory. Every participant builds its own
/// view over its own mapping; the base address may differ between processes,
/// so everything outside `Region_impl` addresses the region by byte offset.
///
/// ### Concurrency Design:
/// - **Headers** are read and claimed through an `AtomicU32` view at 4-byte
///   aligned offsets. The compare-and-swap that moves a header from zero to
///   non-zero is the only synchronization in the log.
/// - **Payloads** are plain byte copies into ranges the writer owns after its
///   claim. Readers detect payloads that are not yet visible and retry.
pub struct SharedRegion {
    /// The mapping that owns the memory.
    pub(crate) shm: Box<dyn SharedMemoryBackend>,

    /// Base of the mapping in this process.
    pub(crate) base: NonNull<u8>,

    /// Usable size of the region in bytes. A multiple of `ENTRY_ALIGN`.
    pub(crate) capacity: usize,
}

unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

/// Outcome of trying to claim the header word at one offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderClaim {
    /// The header was free and now holds our value.
    Claimed,
    /// Somebody else owns this offset; carries the header they published.
    Taken(u32),
}
