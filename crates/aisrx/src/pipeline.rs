//! Pipeline assembly: threads, queues, shutdown
//!
//! The [`Pipeline`] wires the stages together and owns their threads:
//!
//! - one conditioner thread consuming capture blocks from a bounded
//!   input queue and fanning per-channel baseband blocks out, shared
//!   read-only behind `Arc`, to
//! - one worker thread per (channel × demodulator variant), each
//!   running its own [`Receiver`](crate::Receiver) chain with no
//!   shared mutable state, feeding
//! - the shared deduplicator and distributor. The dedup store sits
//!   behind a mutex held only for the check-and-record; sink queues do
//!   their own bounded waiting well away from any lock.
//!
//! Per channel, messages are delivered in sample order because each
//! lane is a single thread draining a FIFO queue. Across channels and
//! variants no order is promised; the deduplicator's
//! first-arrival-wins rule resolves those races.
//!
//! Shutdown comes in two flavors: [`shutdown()`](Pipeline::shutdown)
//! drains everything already accepted, while
//! [`shutdown_now()`](Pipeline::shutdown_now) tears down promptly and
//! counts whatever it had to discard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver as QueueReceiver, Sender};
use thiserror::Error;

#[cfg(not(test))]
use log::warn;

#[cfg(test)]
use std::println as warn;

use crate::block::{ChannelId, DemodVariant, SampleBlock};
use crate::builder::{ChannelConfig, ConfigError, PipelineBuilder, TimingConfig};
use crate::conditioner::Channelizer;
use crate::counters::{Counters, CountersSnapshot};
use crate::dedup::DedupWindow;
use crate::distributor::{Distributor, Sink, SinkPolicy};
use crate::receiver::Receiver;
use crate::waveform::channel_offset_hz;

/// Structural pipeline failure
///
/// Unlike signal-quality problems, these are surfaced to the owning
/// process for a shutdown or restart decision.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline has not been started or has shut down
    #[error("pipeline is not running")]
    NotRunning,
}

/// A complete multi-threaded AIS receive pipeline
///
/// Created by a [`PipelineBuilder`](crate::PipelineBuilder). Register
/// sinks, [`start()`](Self::start), [`feed()`](Self::feed) capture
/// blocks, and finally [`shutdown()`](Self::shutdown).
pub struct Pipeline {
    input_rate: u32,
    queue_depth: usize,
    channels: Vec<ChannelConfig>,
    variants: Vec<DemodVariant>,
    timing: TimingConfig,

    counters: Arc<Counters>,
    dedup: Arc<Mutex<DedupWindow>>,
    shutdown: Arc<AtomicBool>,

    // moved into the conditioner thread at start
    channelizer: Option<Channelizer>,
    input_rx: Option<QueueReceiver<SampleBlock>>,

    input_tx: Option<Sender<SampleBlock>>,
    pending_sinks: Vec<(String, Box<dyn Sink>, SinkPolicy)>,
    distributor: Option<Arc<Distributor>>,
    threads: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub(crate) fn new(builder: &PipelineBuilder) -> Result<Self, ConfigError> {
        if builder.variants().is_empty() {
            return Err(ConfigError::NoVariants);
        }

        let counters = Arc::new(Counters::new());
        let channels: Vec<ChannelConfig> = builder
            .channels()
            .iter()
            .map(|&id| ChannelConfig::new(id, channel_offset_hz(id, builder.center_frequency())))
            .collect();
        let channelizer = Channelizer::new(builder.input_rate(), &channels, counters.clone())?;

        let (input_tx, input_rx) = bounded(builder.queue_depth());

        Ok(Self {
            input_rate: builder.input_rate(),
            queue_depth: builder.queue_depth(),
            channels,
            variants: builder.variants().to_vec(),
            timing: builder.timing(),
            counters,
            dedup: Arc::new(Mutex::new(DedupWindow::new(builder.dedup_window()))),
            shutdown: Arc::new(AtomicBool::new(false)),
            channelizer: Some(channelizer),
            input_rx: Some(input_rx),
            input_tx: Some(input_tx),
            pending_sinks: Vec::new(),
            distributor: None,
            threads: Vec::new(),
        })
    }

    /// Configured acquisition rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// True once [`start()`](Self::start) has run
    pub fn is_running(&self) -> bool {
        self.distributor.is_some()
    }

    /// Register an output sink
    ///
    /// Sinks are part of the configuration snapshot: registration is
    /// only honored before [`start()`](Self::start).
    pub fn register_sink<S>(&mut self, name: &str, sink: S, policy: SinkPolicy)
    where
        S: Sink + 'static,
    {
        if self.is_running() {
            warn!("ignoring sink {} registered on a running pipeline", name);
            return;
        }
        self.pending_sinks.push((name.to_owned(), Box::new(sink), policy));
    }

    /// Spawn the pipeline threads
    ///
    /// One conditioner thread plus one worker per (channel × variant).
    /// Calling `start` twice is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let mut dist = Distributor::new(self.counters.clone());
        for (name, sink, policy) in self.pending_sinks.drain(..) {
            dist.register_boxed(&name, sink, policy);
        }
        let dist = Arc::new(dist);
        self.distributor = Some(dist.clone());

        // one bounded queue and one worker per (channel × variant)
        let mut lane_txs: HashMap<ChannelId, Vec<Sender<Arc<SampleBlock>>>> = HashMap::new();
        for cfg in self.channels.iter() {
            let mut txs = Vec::with_capacity(self.variants.len());
            for &variant in self.variants.iter() {
                let (tx, rx) = bounded::<Arc<SampleBlock>>(self.queue_depth);
                txs.push(tx);

                let chain = Receiver::new(cfg.id, variant, self.timing, self.counters.clone());
                let dedup = self.dedup.clone();
                let distributor = dist.clone();
                let counters = self.counters.clone();
                let shutdown = self.shutdown.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("lane-{}-{}", cfg.id, variant))
                    .spawn(move || {
                        lane_worker(rx, chain, dedup, distributor, counters, shutdown)
                    })
                    .expect("spawn lane worker");
                self.threads.push(handle);
            }
            lane_txs.insert(cfg.id, txs);
        }

        let channelizer = self.channelizer.take().expect("channelizer present");
        let input_rx = self.input_rx.take().expect("input queue present");
        let counters = self.counters.clone();
        let shutdown = self.shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("conditioner".to_owned())
            .spawn(move || conditioner_worker(input_rx, channelizer, lane_txs, counters, shutdown))
            .expect("spawn conditioner");
        self.threads.push(handle);
    }

    /// Feed one capture block into the pipeline
    ///
    /// Blocks briefly when the input queue is full; that backpressure
    /// is the sample source's only flow control. An error means the
    /// pipeline is not accepting samples, which is structural: the
    /// caller should stop feeding and shut down.
    pub fn feed(&self, block: SampleBlock) -> Result<(), PipelineError> {
        if !self.is_running() {
            return Err(PipelineError::NotRunning);
        }
        self.input_tx
            .as_ref()
            .ok_or(PipelineError::NotRunning)?
            .send(block)
            .map_err(|_send_err| PipelineError::NotRunning)
    }

    /// Point-in-time copy of the pipeline counters
    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Per-sink drop counts, in registration order
    pub fn sink_drops(&self) -> Vec<(String, u64)> {
        match self.distributor.as_ref() {
            Some(dist) => dist.sink_drops(),
            None => Vec::new(),
        }
    }

    /// Drain every queue and stop
    ///
    /// Everything already accepted is processed and delivered before
    /// the threads exit. Returns the final counter totals.
    pub fn shutdown(mut self) -> CountersSnapshot {
        self.teardown(false)
    }

    /// Stop promptly, discarding queued work
    ///
    /// In-flight blocks finish, but anything still waiting in a queue
    /// is discarded and counted as a shutdown drop.
    pub fn shutdown_now(mut self) -> CountersSnapshot {
        self.teardown(true)
    }

    fn teardown(&mut self, prompt: bool) -> CountersSnapshot {
        if prompt {
            self.shutdown.store(true, Ordering::SeqCst);
            if let Some(dist) = self.distributor.as_ref() {
                dist.abort();
            }
        }

        // closing the input queue unwinds the threads in stage order
        drop(self.input_tx.take());
        drop(self.input_rx.take());
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                // a panicked lane never takes its siblings down
                warn!("pipeline worker panicked");
            }
        }

        if let Some(dist) = self.distributor.take() {
            match Arc::try_unwrap(dist) {
                Ok(dist) => dist.shutdown(),
                Err(_still_shared) => warn!("sink queues abandoned at shutdown"),
            }
        }

        self.counters.snapshot()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("input_rate", &self.input_rate)
            .field("channels", &self.channels)
            .field("variants", &self.variants)
            .field("running", &self.is_running())
            .finish()
    }
}

// Lock that survives a poisoned mutex: a lane that panicked while
// holding the dedup lock must not take its siblings with it
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Conditioner stage: split capture blocks into per-channel basebands
// and fan them out to every lane on that channel
fn conditioner_worker(
    rx: QueueReceiver<SampleBlock>,
    mut channelizer: Channelizer,
    lane_txs: HashMap<ChannelId, Vec<Sender<Arc<SampleBlock>>>>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
) {
    for block in rx.iter() {
        if shutdown.load(Ordering::SeqCst) {
            counters.add_shutdown_drop();
            continue;
        }
        for out in channelizer.process(&block) {
            let Some(channel) = out.channel else {
                continue;
            };
            let Some(txs) = lane_txs.get(&channel) else {
                continue;
            };
            let shared = Arc::new(out);
            for tx in txs {
                let _ = tx.send(shared.clone());
            }
        }
    }
    // dropping lane_txs here closes every lane queue
}

// One (channel × variant) lane: run the receive chain, then dedup and
// distribute. The dedup lock covers only check-and-record; delivery
// happens after it is released.
fn lane_worker(
    rx: QueueReceiver<Arc<SampleBlock>>,
    mut chain: Receiver,
    dedup: Arc<Mutex<DedupWindow>>,
    distributor: Arc<Distributor>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
) {
    for block in rx.iter() {
        if shutdown.load(Ordering::SeqCst) {
            counters.add_shutdown_drop();
            continue;
        }
        for message in chain.process(&block.samples) {
            let first =
                lock_unpoisoned(&dedup).check_and_record(message.fingerprint(), Instant::now());
            if first {
                distributor.deliver(&Arc::new(message));
            } else {
                counters.add_duplicate_suppressed();
            }
        }
    }
}
