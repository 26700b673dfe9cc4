//! Output distribution
//!
//! The [`Distributor`] fans accepted messages out to registered
//! sinks. Every sink gets a dedicated drain thread fed by its own
//! bounded queue, so a slow or stalled sink never delays its siblings
//! and never backs up into the decode pipeline. Overflow is resolved
//! by the sink's policy: drop the oldest queued message, or wait a
//! bounded time and drop the new one. Either way the drop is counted,
//! both per sink and in the shared pipeline counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

use crate::counters::Counters;
use crate::message::AisMessage;

/// Result of one delivery attempt to a sink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliverStatus {
    /// The sink consumed the message
    Accepted,

    /// The sink discarded the message
    Dropped,
}

/// An output consumer
///
/// Sinks serialize the typed message themselves; the pipeline assumes
/// no particular wire or file format. `deliver()` runs on the sink's
/// own drain thread and may block without affecting the rest of the
/// pipeline.
pub trait Sink: Send {
    /// Consume one message
    fn deliver(&mut self, message: &AisMessage) -> DeliverStatus;
}

/// Overflow policy for one sink's queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkPolicy {
    /// Bounded queue; on overflow the oldest queued message is dropped
    ///
    /// For best-effort consumers that should always see the freshest
    /// traffic.
    QueueDropOldest {
        /// Queue capacity, in messages
        capacity: usize,
    },

    /// Bounded queue; on overflow wait up to `timeout`, then drop the
    /// new message
    ///
    /// A zero timeout turns a full queue into an immediate drop.
    BlockWithTimeout {
        /// Queue capacity, in messages
        capacity: usize,
        /// Longest time to wait for queue space
        timeout: Duration,
    },
}

impl SinkPolicy {
    fn capacity(&self) -> usize {
        match *self {
            SinkPolicy::QueueDropOldest { capacity } => capacity.max(1),
            SinkPolicy::BlockWithTimeout { capacity, .. } => capacity.max(1),
        }
    }
}

// One registered sink: its queue, policy, and drain thread
struct SinkLane {
    name: String,
    policy: SinkPolicy,
    tx: Option<Sender<Arc<AisMessage>>>,

    // second receiver handle onto the same queue, used to discard the
    // oldest queued message on overflow
    rx: Receiver<Arc<AisMessage>>,
    drops: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SinkLane {
    // Enqueue one message according to the lane policy
    fn offer(&self, message: Arc<AisMessage>, counters: &Counters) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };

        match self.policy {
            SinkPolicy::QueueDropOldest { .. } => {
                let mut message = message;
                // discarding the oldest frees space; two rounds cover
                // a race with the drain thread
                for _attempt in 0..2 {
                    match tx.try_send(message) {
                        Ok(()) => return,
                        Err(TrySendError::Full(back)) => {
                            if self.rx.try_recv().is_ok() {
                                self.count_drop(counters);
                            }
                            message = back;
                        }
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }
                self.count_drop(counters);
            }

            SinkPolicy::BlockWithTimeout { timeout, .. } => {
                match tx.send_timeout(message, timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.count_drop(counters),
                    Err(SendTimeoutError::Disconnected(_)) => {}
                }
            }
        }
    }

    fn count_drop(&self, counters: &Counters) {
        self.drops.fetch_add(1, Ordering::Relaxed);
        counters.add_sink_drop();
    }
}

/// Fans accepted messages out to registered sinks
pub struct Distributor {
    lanes: Vec<SinkLane>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
}

impl Distributor {
    /// New distributor with no sinks
    pub fn new(counters: Arc<Counters>) -> Self {
        Self {
            lanes: Vec::new(),
            counters,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a sink and start its drain thread
    pub fn register<S>(&mut self, name: &str, sink: S, policy: SinkPolicy)
    where
        S: Sink + 'static,
    {
        self.register_boxed(name, Box::new(sink), policy)
    }

    /// Register a boxed sink and start its drain thread
    pub fn register_boxed(&mut self, name: &str, mut sink: Box<dyn Sink>, policy: SinkPolicy) {
        let (tx, rx) = bounded::<Arc<AisMessage>>(policy.capacity());
        let drops = Arc::new(AtomicU64::new(0));

        let drain_rx = rx.clone();
        let drain_drops = drops.clone();
        let drain_counters = self.counters.clone();
        let drain_shutdown = self.shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(format!("sink-{}", name))
            .spawn(move || {
                for message in drain_rx.iter() {
                    if drain_shutdown.load(Ordering::SeqCst) {
                        drain_counters.add_shutdown_drop();
                        continue;
                    }
                    match sink.deliver(&message) {
                        DeliverStatus::Accepted => {}
                        DeliverStatus::Dropped => {
                            drain_drops.fetch_add(1, Ordering::Relaxed);
                            drain_counters.add_sink_drop();
                        }
                    }
                }
            })
            .expect("spawn sink drain thread");

        self.lanes.push(SinkLane {
            name: name.to_owned(),
            policy,
            tx: Some(tx),
            rx,
            drops,
            handle: Some(handle),
        });
    }

    /// Deliver one message to every sink
    ///
    /// Enqueues a shared copy per lane and returns; any blocking
    /// happens per lane within its policy's bounded wait.
    pub fn deliver(&self, message: &Arc<AisMessage>) {
        for lane in &self.lanes {
            lane.offer(message.clone(), &self.counters);
        }
    }

    /// Number of registered sinks
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// True if no sinks are registered
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Per-sink drop counts, in registration order
    pub fn sink_drops(&self) -> Vec<(String, u64)> {
        self.lanes
            .iter()
            .map(|lane| (lane.name.clone(), lane.drops.load(Ordering::Relaxed)))
            .collect()
    }

    /// Stop delivering queued messages
    ///
    /// After this call, messages still queued are counted as shutdown
    /// drops instead of being delivered. Used for prompt teardown;
    /// graceful teardown just calls [`shutdown()`](Self::shutdown).
    pub fn abort(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Close every sink queue and join the drain threads
    ///
    /// Queued messages are drained to their sinks first, unless
    /// [`abort()`](Self::abort) was called.
    pub fn shutdown(mut self) {
        for lane in self.lanes.iter_mut() {
            drop(lane.tx.take());
        }
        for lane in self.lanes.iter_mut() {
            if let Some(handle) = lane.handle.take() {
                if handle.join().is_err() {
                    warn!("sink {} panicked", lane.name);
                }
            }
        }
    }
}

impl std::fmt::Debug for Distributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("sinks", &self.lanes.len())
            .finish()
    }
}
