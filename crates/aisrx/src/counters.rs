//! Pipeline observability counters
//!
//! One process-wide [`Counters`] instance is shared by every stage
//! behind an `Arc`. All updates are relaxed atomic increments; nothing
//! here is on an error path or holds a lock. Counters start at zero
//! when the pipeline is constructed and are never reset while it runs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared pipeline counters
///
/// Elevated `crc_failures` or `sink_drops` are the only externally
/// visible symptom of poor RF quality or overload; none of these
/// conditions is ever surfaced as an error.
#[derive(Debug, Default)]
pub struct Counters {
    blocks_in: AtomicU64,
    blocks_skipped: AtomicU64,
    frames_attempted: AtomicU64,
    frames_ok: AtomicU64,
    crc_failures: AtomicU64,
    decode_failures: AtomicU64,
    messages_decoded: AtomicU64,
    duplicates_suppressed: AtomicU64,
    sink_drops: AtomicU64,
    sync_acquired: AtomicU64,
    sync_lost: AtomicU64,
    shutdown_drops: AtomicU64,
}

macro_rules! counter {
    ($(#[$meta:meta])* $field:ident, $adder:ident, $getter:ident) => {
        $(#[$meta])*
        #[inline]
        pub fn $adder(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        /// Current value
        pub fn $getter(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Counters {
    /// New counter set, all zeros
    pub fn new() -> Self {
        Self::default()
    }

    counter!(
        /// Count one sample block accepted from the source
        blocks_in, add_block_in, blocks_in
    );
    counter!(
        /// Count one malformed sample block skipped by the conditioner
        blocks_skipped, add_block_skipped, blocks_skipped
    );
    counter!(
        /// Count one candidate frame presented for validation
        frames_attempted, add_frame_attempted, frames_attempted
    );
    counter!(
        /// Count one frame with a passing check sequence
        frames_ok, add_frame_ok, frames_ok
    );
    counter!(
        /// Count one frame rejected for a check sequence mismatch
        crc_failures, add_crc_failure, crc_failures
    );
    counter!(
        /// Count one validated frame dropped during field decoding
        decode_failures, add_decode_failure, decode_failures
    );
    counter!(
        /// Count one fully decoded message
        messages_decoded, add_message_decoded, messages_decoded
    );
    counter!(
        /// Count one message suppressed as a duplicate
        duplicates_suppressed, add_duplicate_suppressed, duplicates_suppressed
    );
    counter!(
        /// Count one message dropped at a sink boundary
        sink_drops, add_sink_drop, sink_drops
    );
    counter!(
        /// Count one synchronizer transition into lock
        sync_acquired, add_sync_acquired, sync_acquired
    );
    counter!(
        /// Count one synchronizer transition out of lock
        sync_lost, add_sync_lost, sync_lost
    );
    counter!(
        /// Count one in-flight item discarded during shutdown
        shutdown_drops, add_shutdown_drop, shutdown_drops
    );

    /// Capture a point-in-time copy of every counter
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            blocks_in: self.blocks_in(),
            blocks_skipped: self.blocks_skipped(),
            frames_attempted: self.frames_attempted(),
            frames_ok: self.frames_ok(),
            crc_failures: self.crc_failures(),
            decode_failures: self.decode_failures(),
            messages_decoded: self.messages_decoded(),
            duplicates_suppressed: self.duplicates_suppressed(),
            sink_drops: self.sink_drops(),
            sync_acquired: self.sync_acquired(),
            sync_lost: self.sync_lost(),
            shutdown_drops: self.shutdown_drops(),
        }
    }
}

/// Point-in-time copy of the pipeline counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub blocks_in: u64,
    pub blocks_skipped: u64,
    pub frames_attempted: u64,
    pub frames_ok: u64,
    pub crc_failures: u64,
    pub decode_failures: u64,
    pub messages_decoded: u64,
    pub duplicates_suppressed: u64,
    pub sink_drops: u64,
    pub sync_acquired: u64,
    pub sync_lost: u64,
    pub shutdown_drops: u64,
}

impl std::fmt::Display for CountersSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "blocks {} (skipped {}), frames {}/{} ok, crc fail {}, \
             decode fail {}, messages {}, duplicates {}, sink drops {}, \
             sync {}/{} acq/lost, shutdown drops {}",
            self.blocks_in,
            self.blocks_skipped,
            self.frames_ok,
            self.frames_attempted,
            self.crc_failures,
            self.decode_failures,
            self.messages_decoded,
            self.duplicates_suppressed,
            self.sink_drops,
            self.sync_acquired,
            self.sync_lost,
            self.shutdown_drops
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let counters = Counters::new();
        assert_eq!(0, counters.frames_attempted());

        counters.add_frame_attempted();
        counters.add_frame_attempted();
        counters.add_crc_failure();

        let snap = counters.snapshot();
        assert_eq!(2, snap.frames_attempted);
        assert_eq!(1, snap.crc_failures);
        assert_eq!(0, snap.frames_ok);
    }
}
