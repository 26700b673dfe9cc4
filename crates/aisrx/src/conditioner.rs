//! Sample conditioning: channel split, anti-alias filtering, decimation
//!
//! The [`Channelizer`] accepts composite capture blocks at the
//! acquisition rate and produces one baseband stream per configured
//! radio channel at the fixed working rate of
//! [`WORKING_RATE`](crate::waveform::WORKING_RATE). Each channel is
//! mixed to baseband with a complex oscillator, low-pass filtered, and
//! decimated by an integer factor.
//!
//! All per-channel state (oscillator phase, filter window, decimation
//! phase) carries across calls, so arbitrary input block sizes are
//! handled without losing or duplicating samples at block boundaries.

use std::sync::Arc;

#[cfg(not(test))]
use log::error;

#[cfg(test)]
use std::println as error;

use num_complex::Complex;

use crate::block::{ChannelId, SampleBlock};
use crate::builder::{ChannelConfig, ConfigError};
use crate::counters::Counters;
use crate::filter::{lowpass, FilterCoeff, Window};
use crate::waveform::WORKING_RATE;

// Anti-alias passband edge (Hz)
//
// Wide enough for the GMSK main lobe, narrow enough that the adjacent
// channel 50 kHz away lands in the stopband after decimation.
const CUTOFF_HZ: f32 = 15_000.0;

/// Splits a composite capture into per-channel baseband streams
#[derive(Clone, Debug)]
pub struct Channelizer {
    input_rate: u32,
    lanes: Vec<Downconverter>,
    counters: Arc<Counters>,
}

impl Channelizer {
    /// New channelizer
    ///
    /// `input_rate` must be an integer multiple of the working rate.
    pub fn new(
        input_rate: u32,
        channels: &[ChannelConfig],
        counters: Arc<Counters>,
    ) -> Result<Self, ConfigError> {
        if input_rate == 0 || input_rate % WORKING_RATE != 0 {
            return Err(ConfigError::RateNotDivisible { input_rate });
        }
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let decim = (input_rate / WORKING_RATE) as usize;
        let lanes = channels
            .iter()
            .map(|cfg| Downconverter::new(cfg.id, cfg.offset_hz, input_rate, decim))
            .collect();

        Ok(Self {
            input_rate,
            lanes,
            counters,
        })
    }

    /// Configured acquisition rate (Hz)
    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    /// Condition one capture block
    ///
    /// Returns one baseband block per configured channel. Malformed
    /// input (empty, or a sample rate that disagrees with the
    /// configured acquisition rate) is logged and skipped; the next
    /// call proceeds normally.
    pub fn process(&mut self, block: &SampleBlock) -> Vec<SampleBlock> {
        if block.is_empty() {
            error!(
                "conditioner: skipping empty block (sequence {})",
                block.sequence
            );
            self.counters.add_block_skipped();
            return Vec::new();
        }
        if block.sample_rate != self.input_rate {
            error!(
                "conditioner: skipping block (sequence {}): rate {} != configured {}",
                block.sequence, block.sample_rate, self.input_rate
            );
            self.counters.add_block_skipped();
            return Vec::new();
        }

        self.counters.add_block_in();
        self.lanes
            .iter_mut()
            .filter_map(|lane| lane.process(&block.samples))
            .collect()
    }

    /// Clear all DSP state back to zero initial conditions
    pub fn reset(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.reset();
        }
    }
}

// One channel's mixer, filter, and decimator
#[derive(Clone, Debug)]
struct Downconverter {
    channel: ChannelId,
    phase: f32,
    phase_inc: f32,
    taps: FilterCoeff<f32>,
    window: Window<Complex<f32>>,
    decim: usize,
    decim_phase: usize,
    out_sequence: u64,
}

impl Downconverter {
    fn new(channel: ChannelId, offset_hz: f32, input_rate: u32, decim: usize) -> Self {
        use std::f32::consts::PI;

        // mixing by exp(-j 2 pi f t) translates +offset_hz to DC
        let phase_inc = -2.0 * PI * offset_hz / input_rate as f32;
        let ntaps = 12 * decim + 1;
        let taps = FilterCoeff::from_slice(lowpass(ntaps, CUTOFF_HZ / input_rate as f32));
        let window = Window::new(ntaps);

        Self {
            channel,
            phase: 0.0,
            phase_inc,
            taps,
            window,
            decim,
            decim_phase: 0,
            out_sequence: 0,
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.window.reset();
        self.decim_phase = 0;
    }

    fn process(&mut self, samples: &[Complex<f32>]) -> Option<SampleBlock> {
        use std::f32::consts::PI;

        let mut out = Vec::with_capacity(samples.len() / self.decim + 1);
        for &sa in samples {
            let mixed = sa * Complex::from_polar(1.0, self.phase);
            self.phase += self.phase_inc;
            if self.phase > PI {
                self.phase -= 2.0 * PI;
            } else if self.phase < -PI {
                self.phase += 2.0 * PI;
            }

            self.window.push_one(mixed);
            self.decim_phase += 1;
            if self.decim_phase == self.decim {
                self.decim_phase = 0;
                out.push(self.taps.filter(self.window.as_slice()));
            }
        }

        if out.is_empty() {
            return None;
        }

        let sequence = self.out_sequence;
        self.out_sequence += 1;
        Some(SampleBlock::baseband(
            self.channel,
            sequence,
            WORKING_RATE,
            out,
        ))
    }
}
