//! Pipeline configuration
//!
//! [`PipelineBuilder`] collects every tunable of the receive chain:
//! the acquisition sample rate, the capture center frequency and
//! active radio channels, the demodulator variant set, the symbol
//! timing loop parameters, and the deduplication window. The builder
//! comes with a sensible set of defaults; all you really need to
//! provide is the input sampling rate.
//!
//! [`build()`](PipelineBuilder::build) validates the configuration and
//! produces a [`Pipeline`](crate::Pipeline). Once built, the
//! configuration is an immutable snapshot; nothing can be re-tuned on
//! a running pipeline.

use std::time::Duration;

use strum::IntoEnumIterator;
use thiserror::Error;

use crate::block::{ChannelId, DemodVariant};
use crate::pipeline::Pipeline;
use crate::waveform::DEFAULT_CENTER_HZ;

/// Error in the pipeline configuration
///
/// Configuration errors are structural: they are detected at build
/// time and surfaced to the owning process, never from inside the
/// running pipeline.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The acquisition rate does not decimate to the working rate
    #[error("input rate {input_rate} Hz is not an integer multiple of the 96 kHz working rate")]
    RateNotDivisible {
        /// Configured acquisition rate (Hz)
        input_rate: u32,
    },

    /// The channel set is empty
    #[error("no radio channels configured")]
    NoChannels,

    /// The demodulator variant set is empty
    #[error("no demodulator variants configured")]
    NoVariants,
}

/// One radio channel's frequency placement within the capture
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Radio channel
    pub id: ChannelId,

    /// Carrier offset from the capture center (Hz)
    pub offset_hz: f32,
}

impl ChannelConfig {
    /// New channel assignment
    pub fn new(id: ChannelId, offset_hz: f32) -> Self {
        Self { id, offset_hz }
    }
}

/// Symbol timing loop parameters
///
/// Bandwidths are fractions of the symbol rate. The loop runs wide
/// open while searching for signal and narrows once lock is declared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingConfig {
    /// Loop bandwidth while searching (fraction of symbol rate)
    pub bandwidth_unlocked: f32,

    /// Loop bandwidth while tracking (fraction of symbol rate)
    pub bandwidth_locked: f32,

    /// Maximum clock deviation from nominal (symbol periods)
    pub max_deviation: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bandwidth_unlocked: 0.125,
            bandwidth_locked: 0.05,
            max_deviation: 0.01,
        }
    }
}

/// Builds an AIS receive pipeline
///
/// ```
/// use aisrx::{ChannelId, DemodVariant, PipelineBuilder};
///
/// let pipeline = PipelineBuilder::new(768_000)
///     .with_channels(&[ChannelId::A, ChannelId::B])
///     .with_variants(&[DemodVariant::Discriminator, DemodVariant::Coherent])
///     .with_dedup_window(std::time::Duration::from_secs(5))
///     .build()
///     .expect("valid configuration");
/// assert_eq!(768_000, pipeline.input_rate());
/// ```
///
/// The setter API is part of this crate's API. The default values are
/// *not*, and are subject to revision in any minor release. If you
/// care about a setting, configure it explicitly.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineBuilder {
    input_rate: u32,
    center_hz: f64,
    channels: Vec<ChannelId>,
    variants: Vec<DemodVariant>,
    dedup_window: Duration,
    timing: TimingConfig,
    queue_depth: usize,
}

impl PipelineBuilder {
    /// New pipeline configuration with defaults
    ///
    /// `input_rate` is the acquisition sampling rate in Hz. It must be
    /// an integer multiple of the 96 kHz per-channel working rate;
    /// common SDR rates like 768 kHz, 960 kHz, and 1.536 MHz qualify.
    /// By default both AIS channels and every demodulator variant are
    /// active.
    pub fn new(input_rate: u32) -> Self {
        Self {
            input_rate,
            center_hz: DEFAULT_CENTER_HZ,
            channels: vec![ChannelId::A, ChannelId::B],
            variants: DemodVariant::iter().collect(),
            dedup_window: Duration::from_secs(5),
            timing: TimingConfig::default(),
            queue_depth: 32,
        }
    }

    /// Build the pipeline
    ///
    /// The pipeline is created stopped. Register sinks, then call
    /// [`start()`](Pipeline::start).
    pub fn build(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::new(self)
    }

    /// Capture center frequency (Hz)
    ///
    /// Per-channel mixer offsets are derived from the distance between
    /// each channel's carrier and this center. The default of 162.000
    /// MHz sits midway between the two AIS channels.
    pub fn with_center_frequency(&mut self, center_hz: f64) -> &mut Self {
        self.center_hz = center_hz;
        self
    }

    /// Active radio channels
    ///
    /// Duplicates are removed; order is preserved.
    pub fn with_channels(&mut self, channels: &[ChannelId]) -> &mut Self {
        self.channels.clear();
        for &ch in channels {
            if !self.channels.contains(&ch) {
                self.channels.push(ch);
            }
        }
        self
    }

    /// Active demodulator variants
    ///
    /// Every variant in the set runs concurrently on every channel.
    /// Duplicates are removed; order is preserved.
    pub fn with_variants(&mut self, variants: &[DemodVariant]) -> &mut Self {
        self.variants.clear();
        for &v in variants {
            if !self.variants.contains(&v) {
                self.variants.push(v);
            }
        }
        self
    }

    /// Duplicate suppression window
    ///
    /// A message fingerprint seen again within this window is
    /// suppressed. Clamped to at least one millisecond.
    pub fn with_dedup_window(&mut self, window: Duration) -> &mut Self {
        self.dedup_window = window.max(Duration::from_millis(1));
        self
    }

    /// Symbol timing loop bandwidth (fraction of symbol rate)
    ///
    /// The first value is used while searching for signal; the second
    /// once lock is declared. The locked bandwidth is clamped to the
    /// unlocked one.
    pub fn with_timing_bandwidth(&mut self, unlocked_bw: f32, locked_bw: f32) -> &mut Self {
        self.timing.bandwidth_unlocked = f32::clamp(unlocked_bw, 0.0, 1.0);
        self.timing.bandwidth_locked = f32::clamp(locked_bw, 0.0, self.timing.bandwidth_unlocked);
        self
    }

    /// Maximum symbol clock deviation (symbol periods)
    pub fn with_timing_max_deviation(&mut self, max_dev: f32) -> &mut Self {
        self.timing.max_deviation = f32::clamp(max_dev, 0.0, 0.5);
        self
    }

    /// Depth of the bounded inter-stage queues, in blocks
    pub fn with_queue_depth(&mut self, depth: usize) -> &mut Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Acquisition sampling rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Capture center frequency (Hz)
    pub fn center_frequency(&self) -> f64 {
        self.center_hz
    }

    /// Active radio channels
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Active demodulator variants
    pub fn variants(&self) -> &[DemodVariant] {
        &self.variants
    }

    /// Duplicate suppression window
    pub fn dedup_window(&self) -> Duration {
        self.dedup_window
    }

    /// Symbol timing loop parameters
    pub fn timing(&self) -> TimingConfig {
        self.timing
    }

    /// Inter-stage queue depth, in blocks
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new(768_000)
    }
}
