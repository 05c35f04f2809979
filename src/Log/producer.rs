// Slot allocator: the producer side of the log.

use std::sync::Arc;

use super::builder::{ExhaustionPolicy, LogConfig, ScanStart};
use super::Buffer::layout::{
    align_up, declared_len, EntryHeader, HEADER_SIZE, MAX_PRODUCER_INDEX,
};
use super::Buffer::{HeaderClaim, SharedRegion};
use super::Structs::ClaimReceipt;
use crate::Core::error::{LogError, LogResult};

/// Claim a slot for `payload` and write it, scanning from the start of the
/// region.
///
/// # Returns
/// * `Ok(receipt)` once the header is published and the payload copied
/// * `Err(LogError::Exhausted)` if no slot was large enough; under
///   `ExhaustionPolicy::FailureMarker` a zero-length marker is recorded first
/// * other errors if the payload is rejected before touching the region
pub fn claim(
    region: &SharedRegion,
    producer_index: u16,
    payload: &[u8],
    config: &LogConfig,
) -> LogResult<ClaimReceipt> {
    validate_payload(payload, config.max_message_len)?;
    reserve_from(region, producer_index, payload.len(), config.exhaustion, 0)?.write(payload)
}

fn validate_len(len: usize, max_message_len: usize) -> LogResult<()> {
    if len == 0 {
        return Err(LogError::EmptyPayload);
    }
    if len > max_message_len {
        return Err(LogError::MessageTooLarge {
            len,
            max: max_message_len,
        });
    }
    Ok(())
}

fn validate_payload(payload: &[u8], max_message_len: usize) -> LogResult<()> {
    validate_len(payload.len(), max_message_len)?;
    // The reader treats the first NUL as the end of the visible payload.
    if let Some(position) = payload.iter().position(|&b| b == 0) {
        return Err(LogError::InteriorNul { position });
    }
    Ok(())
}

/// Walk the region from `start`, trying to publish `raw` at each candidate
/// offset. A lost compare-and-swap always lands on a complete header, so the
/// winner's declared length tells us how far to skip.
///
/// Returns the claimed offset (if any) and the number of attempts made.
fn scan_and_claim(
    region: &SharedRegion,
    raw: u32,
    payload_len: usize,
    start: usize,
) -> LogResult<(Option<usize>, u32)> {
    let capacity = region.capacity();
    let mut offset = align_up(start);
    let mut attempts = 0u32;

    while offset + HEADER_SIZE + payload_len <= capacity {
        attempts += 1;
        match region.claim_header(offset, raw)? {
            HeaderClaim::Claimed => return Ok((Some(offset), attempts)),
            HeaderClaim::Taken(current) => {
                offset = align_up(offset + HEADER_SIZE + declared_len(current));
            }
        }
    }

    Ok((None, attempts))
}

fn reserve_from(
    region: &SharedRegion,
    producer_index: u16,
    payload_len: usize,
    exhaustion: ExhaustionPolicy,
    start: usize,
) -> LogResult<Reservation<'_>> {
    let header = u16::try_from(payload_len)
        .ok()
        .and_then(|len| EntryHeader::new(producer_index, len))
        .ok_or(if producer_index > MAX_PRODUCER_INDEX {
            LogError::InvalidProducerIndex(producer_index)
        } else {
            LogError::MessageTooLarge {
                len: payload_len,
                max: u16::MAX as usize,
            }
        })?;

    let (claimed, attempts) = scan_and_claim(region, header.pack(), payload_len, start)?;
    if let Some(offset) = claimed {
        tracing::debug!(producer_index, offset, len = payload_len, attempts, "claimed slot");
        return Ok(Reservation {
            region,
            receipt: ClaimReceipt {
                offset,
                producer_index,
                len: payload_len,
                attempts,
            },
            written: false,
            published: None,
        });
    }

    let marker_recorded = match exhaustion {
        ExhaustionPolicy::SilentDrop => false,
        ExhaustionPolicy::FailureMarker => {
            // Validated above, so the marker header is encodable too.
            let marker = EntryHeader::failure_marker(producer_index)
                .ok_or(LogError::InvalidProducerIndex(producer_index))?;
            scan_and_claim(region, marker.pack(), 0, start)?.0.is_some()
        }
    };

    tracing::warn!(
        producer_index,
        len = payload_len,
        marker_recorded,
        "log exhausted, message dropped"
    );
    Err(LogError::Exhausted {
        producer_index,
        len: payload_len,
        marker_recorded,
    })
}

/// A claimed slot whose payload has not been written yet.
///
/// The header is already visible to the consumer, which will not get past
/// this entry until `write` completes. Dropping a reservation unwritten stalls
/// the consumer for good.
pub struct Reservation<'a> {
    region: &'a SharedRegion,
    receipt: ClaimReceipt,
    written: bool,
    /// Owning producer's message counter, bumped once the payload lands.
    published: Option<&'a mut u64>,
}

impl<'a> Reservation<'a> {
    pub fn receipt(&self) -> ClaimReceipt {
        self.receipt
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    fn counting(mut self, published: &'a mut u64) -> Self {
        self.published = Some(published);
        self
    }

    /// Copy the payload into the claimed slot.
    ///
    /// A rejected payload leaves the reservation untouched, so the caller can
    /// retry with a corrected one. Writing twice is rejected.
    pub fn write(&mut self, payload: &[u8]) -> LogResult<ClaimReceipt> {
        if self.written {
            return Err(LogError::AlreadyWritten {
                offset: self.receipt.offset,
            });
        }
        if payload.len() != self.receipt.len {
            return Err(LogError::LengthMismatch {
                expected: self.receipt.len,
                actual: payload.len(),
            });
        }
        validate_payload(payload, self.receipt.len)?;

        self.region
            .write_bytes(self.receipt.payload_offset(), payload)?;
        self.written = true;
        if let Some(published) = self.published.as_deref_mut() {
            *published += 1;
        }
        Ok(self.receipt)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.written {
            tracing::warn!(
                offset = self.receipt.offset,
                producer_index = self.receipt.producer_index,
                "slot reserved but never written; the consumer cannot pass it"
            );
        }
    }
}

/// A producer writing messages under one producer index.
pub struct Producer {
    region: Arc<SharedRegion>,
    producer_index: u16,
    config: LogConfig,
    /// Every byte below this offset is known to be claimed.
    scan_hint: usize,
    claimed: u64,
}

impl Producer {
    pub(crate) fn new(region: Arc<SharedRegion>, producer_index: u16, config: LogConfig) -> Self {
        Self {
            region,
            producer_index,
            config,
            scan_hint: 0,
            claimed: 0,
        }
    }

    fn scan_start(&self) -> usize {
        match self.config.scan_start {
            ScanStart::Origin => 0,
            ScanStart::LastClaim => self.scan_hint,
        }
    }

    fn record_claim(&mut self, receipt: &ClaimReceipt) {
        self.claimed += 1;
        self.scan_hint = self.scan_hint.max(receipt.end_offset());
    }

    /// Claims a slot and writes `message` into it.
    ///
    /// # Arguments
    /// * `message` - Non-empty payload without NUL bytes, at most
    ///   `max_message_size()` bytes
    ///
    /// # Returns
    /// * `Ok(receipt)` if the message was published
    /// * `Err(LogError::Exhausted)` if the region has no room left for it
    pub fn claim<T: AsRef<[u8]>>(&mut self, message: T) -> LogResult<ClaimReceipt> {
        let message = message.as_ref();
        validate_payload(message, self.config.max_message_len)?;

        let receipt = reserve_from(
            &self.region,
            self.producer_index,
            message.len(),
            self.config.exhaustion,
            self.scan_start(),
        )?
        .write(message)?;

        self.record_claim(&receipt);
        Ok(receipt)
    }

    /// Claims a slot of `payload_len` bytes without writing it. The payload is
    /// written later through `Reservation::write`, which is also when the
    /// message counts towards `claimed()`.
    pub fn reserve(&mut self, payload_len: usize) -> LogResult<Reservation<'_>> {
        validate_len(payload_len, self.config.max_message_len)?;

        let start = self.scan_start();
        let reservation = reserve_from(
            &self.region,
            self.producer_index,
            payload_len,
            self.config.exhaustion,
            start,
        )?;

        self.scan_hint = self.scan_hint.max(reservation.receipt().end_offset());
        Ok(reservation.counting(&mut self.claimed))
    }

    pub fn producer_index(&self) -> u16 {
        self.producer_index
    }

    /// Returns the maximum message size that can be claimed
    pub fn max_message_size(&self) -> usize {
        self.config.max_message_len
    }

    /// Messages this producer has published so far. Reservations count once
    /// their payload is written.
    pub fn claimed(&self) -> u64 {
        self.claimed
    }

    pub(crate) fn scan_hint(&self) -> usize {
        self.scan_hint
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }
}

