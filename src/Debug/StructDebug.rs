use std::fmt;
use crate::Log::Buffer::SharedRegion;
use crate::Log::{Consumer, Producer, SharedLog};

/// Debug function for SharedRegion
///
/// Shows the mapping location, capacity and how much of it is claimed.
/// Reading the claimed prefix only loads headers; payloads are never touched.
pub fn debug_shared_region(region: &SharedRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedRegion")
        .field("base", &format_args!("0x{:x}", region.base.as_ptr() as usize))
        .field("capacity", &region.capacity())
        .field("used", &region.used_bytes())
        .field("handle", &region.raw_handle())
        .finish()
}

/// Debug function for Producer
pub fn debug_producer(producer: &Producer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Producer")
        .field("producer_index", &producer.producer_index())
        .field("claimed", &producer.claimed())
        .field("scan_hint", &producer.scan_hint())
        .field("exhaustion", &producer.config().exhaustion)
        .finish_non_exhaustive()
}

/// Debug function for Consumer
///
/// Shows the cursor and the reason the last poll stopped.
pub fn debug_consumer(consumer: &Consumer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Consumer")
        .field("cursor", &consumer.cursor())
        .field("last_stop", &consumer.last_stop())
        .finish_non_exhaustive()
}

pub fn debug_shared_log(log: &SharedLog, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedLog")
        .field("region", &**log.region())
        .field("config", log.config())
        .finish()
}
