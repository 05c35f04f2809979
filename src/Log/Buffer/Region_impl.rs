use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{AcqRel, Acquire};

use super::layout::{EntryHeader, ENTRY_ALIGN, FREE_HEADER, HEADER_SIZE, MIN_REGION_SIZE};
use super::Region::{HeaderClaim, SharedRegion};
use crate::Core::error::{LogError, LogResult};
use crate::Core::SharedMemory::{
    attach_process_memory, attach_shared_memory, create_shared_memory, HeapSharedMemory, RawHandle,
    SharedMemoryBackend,
};

impl SharedRegion {
    /// Build a region view over an existing mapping.
    ///
    /// The mapping must be zero-filled before the first producer runs. Trailing
    /// bytes past the last 4-byte boundary are not used.
    pub fn new(shm: Box<dyn SharedMemoryBackend>) -> LogResult<Self> {
        let base = NonNull::new(shm.as_ptr())
            .ok_or_else(|| LogError::InvalidRegion("mapping has a null base".into()))?;

        if (base.as_ptr() as usize) % ENTRY_ALIGN != 0 {
            return Err(LogError::InvalidRegion(format!(
                "base address {:p} is not {}-byte aligned",
                base.as_ptr(),
                ENTRY_ALIGN
            )));
        }

        let capacity = shm.size() & !(ENTRY_ALIGN - 1);
        if capacity < MIN_REGION_SIZE {
            return Err(LogError::InvalidRegion(format!(
                "region of {} bytes is smaller than the minimum of {}",
                shm.size(),
                MIN_REGION_SIZE
            )));
        }

        Ok(Self {
            shm,
            base,
            capacity,
        })
    }

    /// A zeroed region private to this process, shared between threads.
    pub fn heap(capacity: usize) -> LogResult<Self> {
        let shm = HeapSharedMemory::new(capacity)
            .map_err(|e| LogError::mapping(format!("heap region of {} bytes", capacity), e))?;
        Self::new(Box::new(shm))
    }

    /// A fresh cross-process region; see `create_shared_memory`.
    pub fn create(capacity: usize, name: Option<&str>) -> LogResult<Self> {
        let shm = create_shared_memory(capacity, name).map_err(|e| {
            LogError::mapping(
                format!("create {} bytes ({})", capacity, name.unwrap_or("<memfd>")),
                e,
            )
        })?;
        Self::new(shm)
    }

    /// Map a named region created by another process.
    pub fn attach(name: &str, capacity: usize) -> LogResult<Self> {
        let shm = attach_shared_memory(name, capacity)
            .map_err(|e| LogError::mapping(format!("attach {}", name), e))?;
        Self::new(shm)
    }

    /// Project the region another process holds open as `handle`.
    pub fn attach_process(pid: u32, handle: RawHandle, capacity: usize) -> LogResult<Self> {
        let shm = attach_process_memory(pid, handle, capacity)
            .map_err(|e| LogError::mapping(format!("attach {:?} of process {}", handle, pid), e))?;
        Self::new(shm)
    }

    /// Usable size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handle other processes can pass to `attach_process`.
    pub fn raw_handle(&self) -> RawHandle {
        self.shm.raw_handle()
    }

    pub fn backend(&self) -> &dyn SharedMemoryBackend {
        &*self.shm
    }

    /// Release this process's mapping.
    pub fn unmap(self) -> LogResult<()> {
        let capacity = self.capacity;
        self.shm
            .unmap()
            .map_err(|e| LogError::mapping(format!("unmap {} bytes", capacity), e))
    }

    #[inline]
    fn check_range(&self, offset: usize, len: usize) -> LogResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(LogError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            }),
        }
    }

    fn header_word(&self, offset: usize) -> LogResult<&AtomicU32> {
        self.check_range(offset, HEADER_SIZE)?;
        if offset % ENTRY_ALIGN != 0 {
            return Err(LogError::InvalidRegion(format!(
                "header offset {} is not {}-byte aligned",
                offset, ENTRY_ALIGN
            )));
        }
        // Safety: in bounds, aligned (base and offset are multiples of 4), and the
        // mapping outlives `self`.
        unsafe { Ok(&*(self.base.as_ptr().add(offset) as *const AtomicU32)) }
    }

    /// Read the header word at `offset`.
    #[inline]
    pub fn load_header(&self, offset: usize) -> LogResult<u32> {
        Ok(self.header_word(offset)?.load(Acquire))
    }

    /// Try to move the header at `offset` from free to `raw`. A header that is
    /// already non-zero is reported as `Taken` and left as is.
    ///
    /// Raw access below the allocator; producers go through `claim`/`reserve`.
    #[doc(hidden)]
    pub fn claim_header(&self, offset: usize, raw: u32) -> LogResult<HeaderClaim> {
        if raw == FREE_HEADER {
            return Err(LogError::InvalidRegion(
                "cannot claim a slot with the free header value".into(),
            ));
        }
        match self
            .header_word(offset)?
            .compare_exchange(FREE_HEADER, raw, AcqRel, Acquire)
        {
            Ok(_) => Ok(HeaderClaim::Claimed),
            Err(current) => Ok(HeaderClaim::Taken(current)),
        }
    }

    /// Copy `bytes` into the region at `offset`.
    ///
    /// The caller must own the destination range, i.e. it lies inside the
    /// payload of a slot the caller claimed. Nothing checks this: use
    /// `Reservation::write`, which only touches its own slot.
    #[doc(hidden)]
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) -> LogResult<()> {
        self.check_range(offset, bytes.len())?;
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.as_ptr().add(offset), bytes.len());
        }
        Ok(())
    }

    /// Copy `out.len()` bytes starting at `offset` out of the region.
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> LogResult<()> {
        self.check_range(offset, out.len())?;
        unsafe {
            ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    /// Length of the claimed prefix: offset of the first free (or undecodable)
    /// header. Every byte below it belongs to some entry.
    pub fn used_bytes(&self) -> usize {
        let mut offset = 0;
        while offset + HEADER_SIZE <= self.capacity {
            let header = match self.load_header(offset).ok().and_then(EntryHeader::unpack) {
                Some(header) => header,
                None => break,
            };
            let next = offset + header.span();
            if next > self.capacity {
                break;
            }
            offset = next;
        }
        offset.min(self.capacity)
    }

    /// Bytes not yet claimed by any entry.
    pub fn free_bytes(&self) -> usize {
        self.capacity - self.used_bytes()
    }
}
