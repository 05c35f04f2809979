// Shared memory backends for the message log.
// Linux regions use a /dev/shm file or an anonymous memfd mapped with MAP_SHARED,
// so forked children and attached processes observe the same physical pages.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::io;
use std::ptr::NonNull;

#[cfg(target_os = "linux")]
use std::fs::{File, OpenOptions};
#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};
#[cfg(target_os = "linux")]
use std::os::unix::fs::OpenOptionsExt;

/// Size of one page; the default capacity of a log region.
pub const PAGE_SIZE: usize = 4096;

/// Shared memory backend trait for mapping one region into this process.
pub trait SharedMemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the mapped memory region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the mapped region in bytes
    fn size(&self) -> usize;

    /// Get the handle other processes can use to attach to this region
    fn raw_handle(&self) -> RawHandle;

    /// Remove this process's projection of the region. Other participants keep
    /// their mappings of the same frame.
    fn unmap(self: Box<Self>) -> io::Result<()>;
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor (Linux)
    Fd(i32),
    /// Memory private to this process (heap backend)
    Local,
}

/// Create a new, zero-filled shared memory region.
///
/// # Arguments
/// * `size` - Size of the shared memory region in bytes
/// * `name` - Name under /dev/shm for cross-process attachment; `None` creates an
///   anonymous memfd, reachable by forked children or through `/proc/<pid>/fd`.
#[cfg(target_os = "linux")]
pub fn create_shared_memory(size: usize, name: Option<&str>) -> io::Result<Box<dyn SharedMemoryBackend>> {
    let shm = match name {
        Some(name) => LinuxSharedMemory::create_named(size, name)?,
        None => LinuxSharedMemory::create_anonymous(size)?,
    };
    tracing::debug!(size, name = ?name, fd = shm.fd, "created shared memory region");
    Ok(Box::new(shm))
}

/// Attach to an existing named shared memory region.
///
/// # Arguments
/// * `name` - Name of the region under /dev/shm
/// * `size` - Expected size of the region (for validation)
#[cfg(target_os = "linux")]
pub fn attach_shared_memory(name: &str, size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    let path = format!("/dev/shm/{}", name);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to open shared memory at {}: {}", path, e),
            )
        })?;

    let shm = LinuxSharedMemory::map_file(file, size)?;
    tracing::debug!(size, name, "attached shared memory region");
    Ok(Box::new(shm))
}

/// Project a region owned by another process into this one.
///
/// The source process must keep `handle` open; the region is reached through
/// `/proc/<pid>/fd/<fd>`, which works for both memfds and /dev/shm files.
#[cfg(target_os = "linux")]
pub fn attach_process_memory(
    pid: u32,
    handle: RawHandle,
    size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    let fd = match handle {
        RawHandle::Fd(fd) => fd,
        RawHandle::Local => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "process-local memory cannot be projected into another process",
            ))
        }
    };

    let path = format!("/proc/{}/fd/{}", pid, fd);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to open region of process {} at {}: {}", pid, path, e),
            )
        })?;

    let shm = LinuxSharedMemory::map_file(file, size)?;
    tracing::debug!(size, pid, fd, "projected shared memory from process");
    Ok(Box::new(shm))
}

/// Remove a named region from /dev/shm. Existing mappings stay valid.
#[cfg(target_os = "linux")]
pub fn unlink_shared_memory(name: &str) -> io::Result<()> {
    std::fs::remove_file(format!("/dev/shm/{}", name))
}

#[cfg(not(target_os = "linux"))]
pub fn create_shared_memory(_size: usize, _name: Option<&str>) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_shared_memory(_name: &str, _size: usize) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn attach_process_memory(
    _pid: u32,
    _handle: RawHandle,
    _size: usize,
) -> io::Result<Box<dyn SharedMemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn unlink_shared_memory(_name: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Shared memory only supported on Linux",
    ))
}

#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct LinuxSharedMemory {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
    mapped: bool,
}

#[cfg(target_os = "linux")]
unsafe impl Send for LinuxSharedMemory {}
#[cfg(target_os = "linux")]
unsafe impl Sync for LinuxSharedMemory {}

#[cfg(target_os = "linux")]
impl LinuxSharedMemory {
    /// Create (or truncate) a region under /dev/shm.
    pub fn create_named(size: usize, name: &str) -> io::Result<Self> {
        let path = format!("/dev/shm/{}", name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create shared memory file at {}: {}", path, e),
                )
            })?;

        // Truncating to zero and growing again guarantees zero-filled pages.
        file.set_len(size as u64)?;
        Self::map_file(file, size)
    }

    /// Create an anonymous memfd region.
    pub fn create_anonymous(size: usize) -> io::Result<Self> {
        let c_name = std::ffi::CString::new("shm_msglog")
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let fd = unsafe { libc::memfd_create(c_name.as_ptr(), 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // Safety: memfd_create just returned this descriptor and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };
        file.set_len(size as u64)?;
        Self::map_file(file, size)
    }

    fn map_file(file: File, size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Shared memory size must be non-zero",
            ));
        }

        let file_size = file.metadata()?.len() as usize;
        if file_size < size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Shared memory size too small: expected at least {} bytes, got {}",
                    size, file_size
                ),
            ));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping")
        })?;

        // Keep the file descriptor alive so other processes can attach through /proc.
        Ok(Self {
            ptr,
            size,
            fd: file.into_raw_fd(),
            mapped: true,
        })
    }

    fn release(&mut self) -> io::Result<()> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;

        let unmapped = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        let unmap_result = if unmapped != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        };
        unsafe { libc::close(self.fd) };
        unmap_result
    }
}

#[cfg(target_os = "linux")]
impl Drop for LinuxSharedMemory {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to unmap shared memory region");
        }
    }
}

#[cfg(target_os = "linux")]
impl SharedMemoryBackend for LinuxSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    fn unmap(mut self: Box<Self>) -> io::Result<()> {
        self.release()
    }
}

/// A zero-filled, page-aligned region private to this process.
///
/// Threads within one process share it through `Arc<SharedRegion>`; it is the
/// backend used when no cross-process projection is needed.
#[derive(Debug)]
pub struct HeapSharedMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for HeapSharedMemory {}
unsafe impl Sync for HeapSharedMemory {}

impl HeapSharedMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Shared memory size must be non-zero",
            ));
        }
        let layout = Layout::from_size_align(size, PAGE_SIZE)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            io::Error::new(io::ErrorKind::OutOfMemory, "Failed to allocate region")
        })?;

        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapSharedMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl SharedMemoryBackend for HeapSharedMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Local
    }

    fn unmap(self: Box<Self>) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}
