//! Duplicate suppression
//!
//! The same transmission is commonly received on both radio channels
//! and decoded by more than one demodulator variant. The
//! [`DedupWindow`] collapses those copies: the first arrival of a
//! fingerprint within the retention window is delivered, and every
//! later arrival is suppressed until the window expires.
//!
//! Expired entries are evicted lazily when their fingerprint is seen
//! again, and swept in bulk whenever the store grows past a threshold,
//! so retention is bounded independent of message flow.

use std::collections::HashMap;
use std::time::{Duration, Instant};

// Sweep the store whenever it exceeds this many live entries
const SWEEP_THRESHOLD: usize = 4096;

/// Sliding-window fingerprint store
///
/// Not internally synchronized; the pipeline shares one instance
/// behind a mutex whose critical section covers only
/// [`check_and_record()`](DedupWindow::check_and_record).
#[derive(Clone, Debug)]
pub struct DedupWindow {
    window: Duration,
    seen: HashMap<u64, Instant>,
}

impl DedupWindow {
    /// New store with the given retention window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// Configured retention window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Test a fingerprint and record its arrival
    ///
    /// Returns `true` if this is the first arrival within the window:
    /// the caller should deliver the message and any later arrival of
    /// the same fingerprint inside the window will return `false`.
    /// First-arrival-wins is the tie-break between channels and
    /// demodulator variants racing to decode the same transmission.
    pub fn check_and_record(&mut self, fingerprint: u64, now: Instant) -> bool {
        if self.seen.len() >= SWEEP_THRESHOLD {
            self.sweep(now);
        }

        match self.seen.get_mut(&fingerprint) {
            Some(last_seen) if now.duration_since(*last_seen) < self.window => false,
            Some(last_seen) => {
                // expired entry: treat as new and restart its window
                *last_seen = now;
                true
            }
            None => {
                self.seen.insert(fingerprint, now);
                true
            }
        }
    }

    /// Evict every entry older than the window
    pub fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_fp, last_seen| now.duration_since(*last_seen) < window);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// True if no fingerprints are retained
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
