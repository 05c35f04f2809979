// Stream reader: the consumer side of the log.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::Backoff;

use super::Buffer::layout::{effective_len, EntryHeader, HEADER_SIZE, MAX_PAYLOAD_LEN};
use super::Buffer::SharedRegion;
use super::Structs::{Cursor, EntryPayload, LogEntry, PollBatch, StopReason};

/// Read every completed entry from `cursor` onwards.
///
/// Never blocks and never regresses the cursor. An entry is reported only once
/// its payload is fully visible; otherwise the poll stops in front of it and the
/// next call retries the same offset.
pub fn poll(region: &SharedRegion, cursor: Cursor) -> PollBatch {
    poll_bounded(region, cursor, MAX_PAYLOAD_LEN)
}

/// `poll` with payloads longer than `max_payload_len` treated as untrustworthy.
pub fn poll_bounded(region: &SharedRegion, mut cursor: Cursor, max_payload_len: usize) -> PollBatch {
    let capacity = region.capacity();
    let mut entries = Vec::new();

    let stop = loop {
        let offset = cursor.offset();
        if offset + HEADER_SIZE > capacity {
            break StopReason::EndOfRegion;
        }

        let raw = match region.load_header(offset) {
            Ok(0) => break StopReason::Unclaimed,
            Ok(raw) => raw,
            Err(_) => break StopReason::EndOfRegion,
        };

        let header = match EntryHeader::unpack(raw) {
            Some(header) => header,
            None => {
                tracing::trace!(offset, raw, "undecodable header, deferring");
                break StopReason::Overrun;
            }
        };

        let len = header.payload_len();
        if offset + HEADER_SIZE + len > capacity || len > max_payload_len {
            tracing::trace!(offset, len, capacity, "entry overruns the reader's bounds, deferring");
            break StopReason::Overrun;
        }

        let payload = if header.is_failure_marker() {
            EntryPayload::Failure
        } else {
            let mut scratch = vec![0u8; len];
            if region.read_bytes(offset + HEADER_SIZE, &mut scratch).is_err() {
                break StopReason::Overrun;
            }
            let visible = effective_len(&scratch);
            if visible != len {
                tracing::trace!(offset, len, visible, "payload not fully visible yet, deferring");
                break StopReason::Torn;
            }
            EntryPayload::Message(scratch)
        };

        entries.push(LogEntry {
            offset,
            producer_index: header.producer_index(),
            payload,
        });
        cursor.advance(header.span());
    };

    PollBatch {
        cursor,
        entries,
        stop,
    }
}

/// A consumer draining one log region.
///
/// Holds the only sequential state in the log: the cursor. A region should
/// have a single consumer; a second one would report the same entries again.
pub struct Consumer {
    region: Arc<SharedRegion>,
    cursor: Cursor,
    max_message_len: usize,
    last_stop: Option<StopReason>,
}

impl Consumer {
    pub(crate) fn new(region: Arc<SharedRegion>, max_message_len: usize) -> Self {
        Self {
            region,
            cursor: Cursor::start(),
            max_message_len,
            last_stop: None,
        }
    }

    /// Reads every entry completed since the last call.
    ///
    /// # Returns
    /// * the new entries in region order, possibly none
    pub fn poll(&mut self) -> Vec<LogEntry> {
        self.poll_batch().entries
    }

    /// Like `poll`, but also reports the cursor and why reading stopped.
    pub fn poll_batch(&mut self) -> PollBatch {
        let batch = poll_bounded(&self.region, self.cursor, self.max_message_len);
        debug_assert!(batch.cursor >= self.cursor);
        self.cursor = batch.cursor;
        self.last_stop = Some(batch.stop);
        batch
    }

    /// Polls until `producers_done` reports that every producer has finished,
    /// then polls once more to pick up entries that became visible meanwhile.
    ///
    /// The log cannot tell a finished producer from one still writing, so the
    /// caller supplies that side channel (a join counter, `waitpid`, ...).
    ///
    /// # Arguments
    /// * `producers_done` - Checked after every poll
    /// * `interval` - Sleep between polls once spinning stops paying off
    pub fn drain_until<F>(&mut self, mut producers_done: F, interval: Duration) -> Vec<LogEntry>
    where
        F: FnMut() -> bool,
    {
        let mut collected = Vec::new();
        let backoff = Backoff::new();

        loop {
            let entries = self.poll();
            if !entries.is_empty() {
                backoff.reset();
            }
            collected.extend(entries);

            if producers_done() {
                collected.extend(self.poll());
                return collected;
            }

            if backoff.is_completed() {
                std::thread::sleep(interval);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Current read position.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Entries reported so far.
    pub fn consumed(&self) -> u64 {
        self.cursor.consumed()
    }

    /// Why the most recent poll stopped, if any poll has run.
    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    /// Bytes claimed by producers that this consumer has not read past yet.
    pub fn pending_bytes(&self) -> usize {
        self.region.used_bytes().saturating_sub(self.cursor.offset())
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }
}
