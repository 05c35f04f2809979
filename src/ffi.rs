use crate::Core::error::LogError;
use crate::Log::Structs::{EntryPayload, LogEntry};
use crate::Log::{claim, Consumer, LogBuilder, SharedLog};
use std::collections::VecDeque;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;

// Status codes
pub const SHMLOG_SUCCESS: i32 = 0;
pub const SHMLOG_FAILURE_MARKER: i32 = 1;
pub const SHMLOG_ERROR_NULL_POINTER: i32 = -1;
pub const SHMLOG_ERROR_INVALID_ARG: i32 = -2;
pub const SHMLOG_ERROR_MAPPING_FAILED: i32 = -3;
pub const SHMLOG_ERROR_EXHAUSTED: i32 = -4;
pub const SHMLOG_ERROR_EMPTY: i32 = -5;
pub const SHMLOG_ERROR_INTERNAL: i32 = -6;

/// Handle to a mapped log (opaque pointer)
pub struct LogHandle {
    inner: SharedLog,
}

/// Handle to a consumer instance (opaque pointer)
pub struct ConsumerHandle {
    inner: Consumer,
    pending: VecDeque<LogEntry>,
}

fn status_of(err: &LogError) -> i32 {
    match err {
        LogError::Exhausted { .. } => SHMLOG_ERROR_EXHAUSTED,
        LogError::Mapping { .. } => SHMLOG_ERROR_MAPPING_FAILED,
        LogError::OutOfBounds { .. } | LogError::InvalidRegion(_) => SHMLOG_ERROR_INTERNAL,
        _ => SHMLOG_ERROR_INVALID_ARG,
    }
}

// -----------------------------------------------------------------------------
// Log API
// -----------------------------------------------------------------------------

/// Create or attach to a log region.
///
/// # Arguments
/// * `name` - Name under /dev/shm, or NULL for an anonymous region (create only).
/// * `capacity` - Region size in bytes.
/// * `create` - Create a fresh zeroed region instead of attaching.
///
/// # Returns
/// * Pointer to `LogHandle`, or NULL on failure.
#[no_mangle]
pub extern "C" fn shmlog_open(name: *const c_char, capacity: usize, create: bool) -> *mut LogHandle {
    let name = if name.is_null() {
        None
    } else {
        match unsafe { CStr::from_ptr(name) }.to_str() {
            Ok(name) => Some(name.to_owned()),
            Err(_) => return ptr::null_mut(),
        }
    };

    let builder = LogBuilder::new().with_capacity(capacity);
    let result = match (name, create) {
        (Some(name), true) => builder.with_name(name).build(),
        (None, true) => builder.build(),
        (Some(name), false) => builder.attach(&name),
        (None, false) => return ptr::null_mut(),
    };

    match result {
        Ok(log) => Box::into_raw(Box::new(LogHandle { inner: log })),
        Err(e) => {
            tracing::error!(error = %e, "shmlog_open failed");
            ptr::null_mut()
        }
    }
}

/// Release a log handle. Consumers created from it keep their own mapping.
#[no_mangle]
pub extern "C" fn shmlog_close(handle: *mut LogHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle); // Dropped automatically
        }
    }
}

/// Append one message.
///
/// # Returns
/// * 0 on success, negative status code otherwise.
#[no_mangle]
pub extern "C" fn shmlog_claim(
    handle: *mut LogHandle,
    producer_index: u16,
    data: *const u8,
    len: usize,
) -> i32 {
    if handle.is_null() || data.is_null() {
        return SHMLOG_ERROR_NULL_POINTER;
    }

    let log = unsafe { &(*handle).inner };
    let payload = unsafe { std::slice::from_raw_parts(data, len) };

    match claim(log.region(), producer_index, payload, log.config()) {
        Ok(_) => SHMLOG_SUCCESS,
        Err(e) => status_of(&e),
    }
}

// -----------------------------------------------------------------------------
// Consumer API
// -----------------------------------------------------------------------------

/// Create a consumer reading from the start of the region.
#[no_mangle]
pub extern "C" fn shmlog_consumer_new(handle: *mut LogHandle) -> *mut ConsumerHandle {
    if handle.is_null() {
        return ptr::null_mut();
    }
    let log = unsafe { &(*handle).inner };
    Box::into_raw(Box::new(ConsumerHandle {
        inner: log.consumer(),
        pending: VecDeque::new(),
    }))
}

/// Take the next completed entry, polling the region if none is buffered.
///
/// # Arguments
/// * `out_index` - Receives the producer index.
/// * `out_buf` - Buffer to write the message into.
/// * `out_len` - Input: size of buf, Output: length of the message.
///
/// # Returns
/// * 0 with the message copied out.
/// * SHMLOG_FAILURE_MARKER if the entry records a producer's dropped message.
/// * SHMLOG_ERROR_EMPTY if nothing is ready yet.
/// * SHMLOG_ERROR_INVALID_ARG if the buffer is too small; the entry stays queued
///   and `out_len` holds the size needed.
#[no_mangle]
pub extern "C" fn shmlog_consumer_next(
    handle: *mut ConsumerHandle,
    out_index: *mut u16,
    out_buf: *mut u8,
    out_len: *mut usize,
) -> i32 {
    if handle.is_null() || out_index.is_null() || out_len.is_null() {
        return SHMLOG_ERROR_NULL_POINTER;
    }

    let consumer = unsafe { &mut *handle };
    if consumer.pending.is_empty() {
        let entries = consumer.inner.poll();
        consumer.pending.extend(entries);
    }

    let entry = match consumer.pending.front() {
        Some(entry) => entry,
        None => return SHMLOG_ERROR_EMPTY,
    };

    let max_len = unsafe { *out_len };
    let status = match &entry.payload {
        EntryPayload::Failure => {
            unsafe { *out_len = 0 };
            SHMLOG_FAILURE_MARKER
        }
        EntryPayload::Message(data) => {
            if data.len() > max_len || out_buf.is_null() {
                unsafe { *out_len = data.len() };
                return SHMLOG_ERROR_INVALID_ARG;
            }
            unsafe {
                ptr::copy_nonoverlapping(data.as_ptr(), out_buf, data.len());
                *out_len = data.len();
            }
            SHMLOG_SUCCESS
        }
    };

    unsafe { *out_index = entry.producer_index };
    consumer.pending.pop_front();
    status
}

/// Free a consumer handle.
#[no_mangle]
pub extern "C" fn shmlog_consumer_free(handle: *mut ConsumerHandle) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}
