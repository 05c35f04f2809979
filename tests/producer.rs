use shm_msglog::Log::Buffer::layout::{EntryHeader, MAX_PRODUCER_INDEX};
use shm_msglog::{claim, ExhaustionPolicy, LogBuilder, LogError, ScanStart, SharedLog};

fn heap_log(capacity: usize, policy: ExhaustionPolicy) -> SharedLog {
    LogBuilder::new()
        .with_capacity(capacity)
        .with_exhaustion_policy(policy)
        .process_local()
        .build()
        .unwrap()
}

fn read_payload(log: &SharedLog, offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    log.region().read_bytes(offset, &mut out).unwrap();
    out
}

#[test]
fn claim_publishes_header_then_payload() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(7).unwrap();

    let receipt = producer.claim("hello").unwrap();
    assert_eq!(receipt.offset, 0);
    assert_eq!(receipt.len, 5);
    assert_eq!(receipt.attempts, 1);
    assert_eq!(receipt.end_offset(), 12);

    let raw = log.region().load_header(0).unwrap();
    assert_eq!(raw, EntryHeader::new(7, 5).unwrap().pack());
    assert_eq!(read_payload(&log, receipt.payload_offset(), 5), b"hello");
    assert_eq!(producer.claimed(), 1);

    println!("Producer: {:#?}", producer);
}

#[test]
fn later_claims_skip_over_existing_entries() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let mut first = log.producer(0).unwrap();
    let mut second = log.producer(1).unwrap();

    let a = first.claim("hello").unwrap();
    let b = second.claim("hi").unwrap();
    let c = first.claim("abcd").unwrap();

    // "hello" pads to 12 bytes, "hi" to 8
    assert_eq!(a.offset, 0);
    assert_eq!(b.offset, 12);
    assert_eq!(b.attempts, 2);
    assert_eq!(c.offset, 20);
    assert_eq!(c.attempts, 3);
    assert_eq!(log.region().used_bytes(), 28);
}

#[test]
fn invalid_payloads_are_rejected_before_allocation() {
    let log = LogBuilder::new()
        .with_capacity(4096)
        .with_max_message_len(16)
        .process_local()
        .build()
        .unwrap();
    let mut producer = log.producer(0).unwrap();

    assert!(matches!(producer.claim(""), Err(LogError::EmptyPayload)));
    assert!(matches!(
        producer.claim([b'x'; 17]),
        Err(LogError::MessageTooLarge { len: 17, max: 16 })
    ));
    assert!(matches!(
        producer.claim(b"ab\0cd"),
        Err(LogError::InteriorNul { position: 2 })
    ));

    assert_eq!(log.region().used_bytes(), 0);
    assert_eq!(producer.claimed(), 0);
}

#[test]
fn producer_index_must_be_encodable() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    assert!(log.producer(MAX_PRODUCER_INDEX).is_ok());
    assert!(matches!(
        log.producer(u16::MAX),
        Err(LogError::InvalidProducerIndex(u16::MAX))
    ));
    assert!(matches!(
        claim(log.region(), u16::MAX, b"x", log.config()),
        Err(LogError::InvalidProducerIndex(_))
    ));
}

#[test]
fn silent_drop_leaves_no_trace() {
    let log = heap_log(16, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(3).unwrap();

    producer.claim("abcdefgh").unwrap(); // 12 bytes, 4 left
    let err = producer.claim("abcdefgh").unwrap_err();
    println!("Exhausted: {err}");
    assert!(err.is_exhausted());
    assert!(matches!(
        err,
        LogError::Exhausted {
            producer_index: 3,
            len: 8,
            marker_recorded: false
        }
    ));

    assert_eq!(log.region().load_header(12).unwrap(), 0);
    assert_eq!(log.region().used_bytes(), 12);
}

#[test]
fn failure_marker_policy_records_the_loss() {
    let log = heap_log(16, ExhaustionPolicy::FailureMarker);
    let mut producer = log.producer(0).unwrap();

    producer.claim("abcdefgh").unwrap();
    let err = producer.claim("abcdefgh").unwrap_err();
    assert!(matches!(
        err,
        LogError::Exhausted {
            marker_recorded: true,
            ..
        }
    ));

    let marker = EntryHeader::unpack(log.region().load_header(12).unwrap()).unwrap();
    assert!(marker.is_failure_marker());
    assert_eq!(marker.producer_index(), 0);
    assert_eq!(log.region().used_bytes(), 16);
}

#[test]
fn failure_marker_needs_room_for_its_header() {
    let log = heap_log(16, ExhaustionPolicy::FailureMarker);
    let mut producer = log.producer(1).unwrap();

    producer.claim("abcdefghijkl").unwrap(); // fills all 16 bytes
    let err = producer.claim("z").unwrap_err();
    assert!(matches!(
        err,
        LogError::Exhausted {
            marker_recorded: false,
            ..
        }
    ));
}

#[test]
fn message_larger_than_region_is_exhausted() {
    let log = heap_log(16, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(0).unwrap();

    assert!(producer.claim([b'a'; 13]).unwrap_err().is_exhausted());
    assert_eq!(log.region().used_bytes(), 0);
}

#[test]
fn last_claim_scan_resumes_after_own_entries() {
    let origin_log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let resume_log = LogBuilder::new()
        .with_capacity(4096)
        .with_scan_start(ScanStart::LastClaim)
        .process_local()
        .build()
        .unwrap();

    let mut origin = origin_log.producer(0).unwrap();
    let mut resume = resume_log.producer(0).unwrap();
    for i in 0..10 {
        let message = format!("message-{i}");
        let from_origin = origin.claim(&message).unwrap();
        let resumed = resume.claim(&message).unwrap();

        assert_eq!(from_origin.offset, resumed.offset);
        assert_eq!(from_origin.attempts, i + 1);
        assert_eq!(resumed.attempts, 1);
    }
}

#[test]
fn last_claim_scan_still_skips_foreign_entries() {
    let log = LogBuilder::new()
        .with_capacity(4096)
        .with_scan_start(ScanStart::LastClaim)
        .process_local()
        .build()
        .unwrap();
    let mut mine = log.producer(0).unwrap();
    let mut other = log.producer(1).unwrap();

    mine.claim("aaaa").unwrap();
    other.claim("bbbb").unwrap();
    let receipt = mine.claim("cccc").unwrap();

    assert_eq!(receipt.offset, 16);
    assert_eq!(receipt.attempts, 2);
}

#[test]
fn reservation_defers_the_payload_write() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(2).unwrap();

    let mut reservation = producer.reserve(6).unwrap();
    let receipt = reservation.receipt();
    assert_ne!(log.region().load_header(receipt.offset).unwrap(), 0);
    assert_eq!(read_payload(&log, receipt.payload_offset(), 6), [0u8; 6]);

    reservation.write(b"abcdef").unwrap();
    assert_eq!(read_payload(&log, receipt.payload_offset(), 6), b"abcdef");
}

#[test]
fn reservation_rejects_mismatched_payload() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(2).unwrap();
    let mut later = log.producer(3).unwrap();
    let mut consumer = log.consumer();

    let mut reservation = producer.reserve(4).unwrap();
    assert!(matches!(
        reservation.write(b"abc"),
        Err(LogError::LengthMismatch {
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        reservation.write(b"a\0cd"),
        Err(LogError::InteriorNul { position: 1 })
    ));
    assert!(!reservation.is_written());
    later.claim("later").unwrap();

    // The slot survives the rejected writes and can still be completed.
    let receipt = reservation.write(b"abcd").unwrap();
    assert!(matches!(
        reservation.write(b"abcd"),
        Err(LogError::AlreadyWritten { offset: 0 })
    ));
    drop(reservation);

    let entries = consumer.poll();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].offset, receipt.offset);
    assert_eq!(entries[0].as_str(), Some("abcd"));
    assert_eq!(entries[1].as_str(), Some("later"));
    assert_eq!(consumer.consumed(), 2);
}

#[test]
fn claimed_counts_only_written_reservations() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    let mut producer = log.producer(4).unwrap();

    producer.claim("one").unwrap();
    assert_eq!(producer.claimed(), 1);

    let mut reservation = producer.reserve(3).unwrap();
    assert!(reservation.write(b"xy").is_err());
    drop(reservation);
    assert_eq!(producer.claimed(), 1);

    let mut reservation = producer.reserve(3).unwrap();
    reservation.write(b"two").unwrap();
    drop(reservation);
    assert_eq!(producer.claimed(), 2);
}

#[test]
fn free_function_claim_scans_from_origin() {
    let log = heap_log(4096, ExhaustionPolicy::SilentDrop);
    claim(log.region(), 0, b"first", log.config()).unwrap();
    let receipt = claim(log.region(), 1, b"second", log.config()).unwrap();

    assert_eq!(receipt.offset, 12);
    assert_eq!(read_payload(&log, receipt.payload_offset(), 6), b"second");
}

#[test]
fn invalid_configuration_is_rejected() {
    assert!(matches!(
        LogBuilder::new().with_capacity(10).process_local().build(),
        Err(LogError::InvalidConfig(_))
    ));
    assert!(matches!(
        LogBuilder::new()
            .with_max_message_len(0)
            .process_local()
            .build(),
        Err(LogError::InvalidConfig(_))
    ));
    assert!(matches!(
        LogBuilder::new()
            .with_max_message_len(70_000)
            .process_local()
            .build(),
        Err(LogError::InvalidConfig(_))
    ));
}
