//! Per-channel receive chain
//!
//! A [`Receiver`] is one (channel × demodulator variant) instance of
//! the signal-to-message chain: demodulation, symbol timing recovery,
//! link-layer deframing, frame validation, and message decoding. Each
//! instance is single-threaded and keeps all of its DSP state private,
//! so any number of them can run concurrently without locks.
//!
//! Transient signal problems such as loss of lock, check sequence
//! mismatches, and truncated messages are counted and recovered
//! locally.
//! Nothing in this chain returns an error or blocks.

pub mod crc;
pub mod demod;
pub mod framing;
pub mod symsync;

#[cfg(not(test))]
use log::{debug, info};

#[cfg(test)]
use std::println as debug;
#[cfg(test)]
use std::println as info;

use std::sync::Arc;

use chrono::Utc;
use num_complex::Complex;

use crate::block::{CandidateFrame, ChannelId, DemodVariant};
use crate::builder::TimingConfig;
use crate::counters::Counters;
use crate::message::AisMessage;
use crate::waveform::{samples_per_symbol, WORKING_RATE};

use self::demod::Demodulator;
use self::framing::Deframer;
use self::symsync::{BitSynchronizer, SyncState};

/// One (channel × variant) signal-to-message chain
#[derive(Clone, Debug)]
pub struct Receiver {
    channel: ChannelId,
    demod: Demodulator,
    sync: BitSynchronizer,
    deframer: Deframer,
    counters: Arc<Counters>,
}

impl Receiver {
    /// New receive chain at the working rate
    pub fn new(
        channel: ChannelId,
        variant: DemodVariant,
        timing: TimingConfig,
        counters: Arc<Counters>,
    ) -> Self {
        let sync = BitSynchronizer::new(
            samples_per_symbol(WORKING_RATE),
            timing.bandwidth_unlocked,
            timing.bandwidth_locked,
            timing.max_deviation,
        );

        Self {
            channel,
            demod: Demodulator::new(variant),
            sync,
            deframer: Deframer::new(),
            counters,
        }
    }

    /// Radio channel this chain serves
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Demodulator variant this chain runs
    pub fn variant(&self) -> DemodVariant {
        self.demod.variant()
    }

    /// Current synchronizer lock state
    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Process one baseband block into decoded messages
    ///
    /// Consumes working-rate samples and returns every message whose
    /// closing flag landed in this block. Frames that fail validation
    /// or decoding are counted and dropped here; they never surface as
    /// errors.
    pub fn process(&mut self, samples: &[Complex<f32>]) -> Vec<AisMessage> {
        let stream = self.demod.demodulate(self.channel, samples);

        let mut out = Vec::new();
        for &soft in stream.soft.iter() {
            let sync_out = self.sync.input(soft);

            if let Some((from, to)) = sync_out.transition {
                self.note_transition(from, to);
            }

            let Some(bit) = sync_out.bit else {
                continue;
            };
            let Some(raw) = self.deframer.input(bit) else {
                continue;
            };

            let candidate = CandidateFrame {
                payload: raw.payload,
                fcs: raw.fcs,
                channel: self.channel,
                variant: self.variant(),
                received_at: Utc::now(),
            };
            let Some(frame) = crc::validate(candidate, &self.counters) else {
                continue;
            };

            match AisMessage::decode(&frame) {
                Ok(message) => {
                    self.counters.add_message_decoded();
                    out.push(message);
                }
                Err(err) => {
                    debug!(
                        "receiver {}/{}: dropping message: {}",
                        self.channel,
                        self.variant(),
                        err
                    );
                    self.counters.add_decode_failure();
                }
            }
        }
        out
    }

    /// Reset every stage to zero initial conditions
    pub fn reset(&mut self) {
        use self::demod::Demod;

        self.demod.reset();
        self.sync.reset();
        self.deframer.reset();
    }

    // Count lock transitions; losing lock leaves the deframer alone so
    // a frame in progress fails its check sequence naturally
    fn note_transition(&self, from: SyncState, to: SyncState) {
        match (from, to) {
            (_, SyncState::Locked) => {
                info!("receiver {}/{}: sync acquired", self.channel, self.variant());
                self.counters.add_sync_acquired();
            }
            (SyncState::Locked, SyncState::Unlocked) => {
                info!("receiver {}/{}: sync lost", self.channel, self.variant());
                self.counters.add_sync_lost();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::message::{MessageBody, HEADING_UNAVAILABLE, SOG_UNAVAILABLE};
    use crate::waveform::{burst_line_bits, modulate_gmsk, BitWriter};

    const SPS: usize = 10;

    // type 1 position report exercising the "unavailable" sentinels:
    // the concrete scenario is 37.8199°N 122.4783°W, SOG unavailable,
    // course 90.0°
    fn scenario_payload() -> crate::block::FramePayload {
        let lat = (37.8199f64 * 600_000.0).round() as i32;
        let lon = (-122.4783f64 * 600_000.0).round() as i32;

        let mut w = BitWriter::new();
        w.push(1, 6)
            .push(0, 2)
            .push(123456789, 30)
            .push(0, 4)
            .push_i32(-128, 8)
            .push(SOG_UNAVAILABLE as u32, 10)
            .push(1, 1)
            .push_i32(lon, 28)
            .push_i32(lat, 27)
            .push(900, 12)
            .push(HEADING_UNAVAILABLE as u32, 9)
            .push(40, 6)
            .push(0, 2)
            .push(0, 3)
            .push(0, 1)
            .push(0x25981, 19);
        w.finish()
    }

    // a burst with lead-in and tail silence, at the working rate
    fn scenario_burst() -> Vec<Complex<f32>> {
        let line = burst_line_bits(&scenario_payload());
        let mut samples = vec![Complex::new(0.0, 0.0); 32];
        samples.extend(modulate_gmsk(&line, SPS));
        samples.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(32 * SPS));
        samples
    }

    fn run_variant(variant: DemodVariant) -> Vec<AisMessage> {
        let counters = Arc::new(Counters::new());
        let mut rx = Receiver::new(
            ChannelId::A,
            variant,
            TimingConfig::default(),
            counters.clone(),
        );
        let messages = rx.process(&scenario_burst());
        assert_eq!(1, counters.frames_ok(), "variant {}", variant);
        assert!(counters.sync_acquired() >= 1);
        messages
    }

    #[test]
    fn test_burst_to_message_every_variant() {
        for variant in [
            DemodVariant::Discriminator,
            DemodVariant::Coherent,
            DemodVariant::Challenger,
        ] {
            let messages = run_variant(variant);
            assert_eq!(1, messages.len(), "variant {}", variant);

            let msg = &messages[0];
            assert_eq!(1, msg.msg_type());
            assert_eq!(123456789, msg.mmsi());
            assert_eq!(ChannelId::A, msg.channel());
            assert_eq!(variant, msg.variant());

            let report = match msg.body() {
                MessageBody::Position(report) => report,
                other => panic!("wrong body: {:?}", other),
            };
            assert_eq!(None, report.sog_knots);
            assert_eq!(None, report.heading_degrees);
            assert_eq!(Some(90.0), report.cog_degrees);

            let precision = 1.0 / 600_000.0;
            assert!((report.latitude.unwrap() - 37.8199).abs() < precision);
            assert!((report.longitude.unwrap() + 122.4783).abs() < precision);
        }
    }

    #[test]
    fn test_corrupted_crc_rejected() {
        // flip one payload bit after the check sequence is computed
        let line = burst_line_bits(&scenario_payload());
        let mut corrupted = line.clone();
        let mid = corrupted.len() / 2;
        corrupted[mid] = !corrupted[mid];

        let mut samples = vec![Complex::new(0.0, 0.0); 32];
        samples.extend(modulate_gmsk(&corrupted, SPS));
        samples.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(32 * SPS));

        let counters = Arc::new(Counters::new());
        let mut rx = Receiver::new(
            ChannelId::A,
            DemodVariant::Discriminator,
            TimingConfig::default(),
            counters.clone(),
        );
        let messages = rx.process(&samples);

        assert!(messages.is_empty());
        assert_eq!(0, counters.frames_ok());
        assert_eq!(counters.frames_attempted(), counters.crc_failures());
    }

    #[test]
    fn test_silence_produces_nothing() {
        let counters = Arc::new(Counters::new());
        let mut rx = Receiver::new(
            ChannelId::B,
            DemodVariant::Discriminator,
            TimingConfig::default(),
            counters.clone(),
        );

        let silence = vec![Complex::new(0.0, 0.0); 96_000];
        assert!(rx.process(&silence).is_empty());
        assert_eq!(SyncState::Unlocked, rx.sync_state());
        assert_eq!(0, counters.frames_attempted());
    }

    #[test]
    fn test_back_to_back_bursts() {
        // two bursts separated by silence decode independently
        let counters = Arc::new(Counters::new());
        let mut rx = Receiver::new(
            ChannelId::A,
            DemodVariant::Discriminator,
            TimingConfig::default(),
            counters.clone(),
        );

        let mut samples = scenario_burst();
        samples.extend(std::iter::repeat(Complex::new(0.0, 0.0)).take(200 * SPS));
        samples.extend(scenario_burst());

        let messages = rx.process(&samples);
        assert_eq!(2, messages.len());
        assert_eq!(2, counters.frames_ok());
        assert!(counters.sync_lost() >= 1);
    }
}
