// Header encoding and alignment rules of the on-region entry layout.
// These values are shared with every process attached to a region, so the
// encoding must not drift.
use shm_msglog::Log::Buffer::layout::{
    align_up, declared_len, effective_len, entry_span, EntryHeader, FREE_HEADER, HEADER_SIZE,
    MAX_PRODUCER_INDEX,
};

#[test]
fn test_header_packing() {
    let header = EntryHeader::new(3, 20).unwrap();
    let raw = header.pack();
    println!("EntryHeader(3, 20) => 0x{raw:08x}");

    // High half: producer tag (index + 1). Low half: payload length.
    assert_eq!(raw, (4 << 16) | 20);
    assert_eq!(EntryHeader::unpack(raw), Some(header));
    assert_eq!(declared_len(raw), 20);
    assert!(!header.is_failure_marker());
}

#[test]
fn test_failure_marker_is_never_free() {
    let marker = EntryHeader::failure_marker(0).unwrap();
    assert!(marker.is_failure_marker());
    assert_ne!(marker.pack(), FREE_HEADER);
    assert_eq!(marker.span(), HEADER_SIZE);

    let decoded = EntryHeader::unpack(marker.pack()).unwrap();
    assert_eq!(decoded.producer_index(), 0);
    assert_eq!(decoded.payload_len(), 0);
}

#[test]
fn test_unpack_rejects_free_and_untagged_words() {
    assert_eq!(EntryHeader::unpack(FREE_HEADER), None);
    // A length with no producer tag is never written by a producer.
    assert_eq!(EntryHeader::unpack(0x0000_0007), None);
}

#[test]
fn test_producer_index_limits() {
    assert!(EntryHeader::new(MAX_PRODUCER_INDEX, 1).is_some());
    assert!(EntryHeader::new(MAX_PRODUCER_INDEX + 1, 1).is_none());
    assert!(EntryHeader::failure_marker(u16::MAX).is_none());

    let top = EntryHeader::new(MAX_PRODUCER_INDEX, u16::MAX).unwrap();
    assert_eq!(top.pack(), u32::MAX);
    assert_eq!(EntryHeader::unpack(u32::MAX), Some(top));
}

#[test]
fn test_entry_span_alignment() {
    assert_eq!(align_up(0), 0);
    assert_eq!(align_up(1), 4);
    assert_eq!(align_up(4), 4);
    assert_eq!(align_up(13), 16);

    // header + payload, padded to 4 bytes
    assert_eq!(entry_span(0), 4);
    assert_eq!(entry_span(1), 8);
    assert_eq!(entry_span(4), 8);
    assert_eq!(entry_span(5), 12);
    assert_eq!(entry_span(8), 12);
    assert_eq!(EntryHeader::new(1, 19).unwrap().span(), 24);
}

#[test]
fn test_effective_len_stops_at_first_nul() {
    assert_eq!(effective_len(b"hello"), 5);
    assert_eq!(effective_len(b"hel\0o"), 3);
    assert_eq!(effective_len(b"\0\0\0"), 0);
    assert_eq!(effective_len(b""), 0);
}
