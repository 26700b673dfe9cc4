//! GMSK demodulation
//!
//! Every demodulator consumes complex baseband samples at the working
//! rate and produces one soft decision per sample: `> 0` for a one
//! bit, `< 0` for a zero, magnitude carrying confidence. A symbol
//! synchronizer downstream selects the decision instants.
//!
//! The bank is a closed set of strategies behind the [`Demod`] trait,
//! dispatched through the [`Demodulator`] enum. Running several of
//! them concurrently on the same channel trades CPU for robustness
//! against fading and multipath: a frame recovered by *any* variant is
//! accepted, and the deduplicator collapses the copies.

use num_complex::Complex;

use crate::block::{ChannelId, DemodVariant, SymbolStream};
use crate::waveform::{samples_per_symbol, WORKING_RATE};

/// A demodulation strategy
///
/// Implementations keep only their own filter and loop state and may
/// share read-only input samples with other variants.
pub trait Demod {
    /// Process one baseband sample into a soft decision
    fn process(&mut self, sample: Complex<f32>) -> f32;

    /// Reset to zero initial conditions
    fn reset(&mut self);
}

/// A configured demodulator instance
///
/// Closed enumeration over the available strategies; the variant set
/// is chosen at configuration time.
#[derive(Clone, Debug)]
pub enum Demodulator {
    Discriminator(FmDiscriminator),
    Coherent(CoherentDemod),
    Challenger(ChallengerDemod),
}

impl Demodulator {
    /// Create the demodulator for `variant` at the working rate
    pub fn new(variant: DemodVariant) -> Self {
        match variant {
            DemodVariant::Discriminator => Self::Discriminator(FmDiscriminator::new()),
            DemodVariant::Coherent => Self::Coherent(CoherentDemod::new()),
            DemodVariant::Challenger => Self::Challenger(ChallengerDemod::new()),
        }
    }

    /// Which strategy this instance runs
    pub fn variant(&self) -> DemodVariant {
        match self {
            Self::Discriminator(_) => DemodVariant::Discriminator,
            Self::Coherent(_) => DemodVariant::Coherent,
            Self::Challenger(_) => DemodVariant::Challenger,
        }
    }

    /// Demodulate a block into a stream of soft decisions
    pub fn demodulate(&mut self, channel: ChannelId, samples: &[Complex<f32>]) -> SymbolStream {
        let soft = samples.iter().map(|&sa| self.process(sa)).collect();
        SymbolStream {
            channel,
            variant: self.variant(),
            soft,
        }
    }
}

impl Demod for Demodulator {
    fn process(&mut self, sample: Complex<f32>) -> f32 {
        match self {
            Self::Discriminator(d) => d.process(sample),
            Self::Coherent(d) => d.process(sample),
            Self::Challenger(d) => d.process(sample),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Discriminator(d) => d.reset(),
            Self::Coherent(d) => d.reset(),
            Self::Challenger(d) => d.reset(),
        }
    }
}

// Soft output gain: a full-scale GMSK frequency excursion of
// ±(pi/2)/sps radians per sample maps to ±1.0
fn discriminator_gain() -> f32 {
    2.0 * samples_per_symbol(WORKING_RATE) / std::f32::consts::PI
}

/// Non-coherent FM discriminator
///
/// The phase difference between successive samples is the
/// instantaneous frequency, which for GMSK *is* the shaped data
/// signal. Simple and tolerant of moderate carrier offset, which
/// shows up only as a DC bias on the output.
#[derive(Clone, Debug)]
pub struct FmDiscriminator {
    prev: Complex<f32>,
    gain: f32,
}

impl FmDiscriminator {
    pub fn new() -> Self {
        Self {
            prev: Complex::new(0.0, 0.0),
            gain: discriminator_gain(),
        }
    }
}

impl Default for FmDiscriminator {
    fn default() -> Self {
        Self::new()
    }
}

impl Demod for FmDiscriminator {
    #[inline]
    fn process(&mut self, sample: Complex<f32>) -> f32 {
        let d = sample * self.prev.conj();
        self.prev = sample;
        if d.norm_sqr() < 1e-12 {
            return 0.0;
        }
        (d.arg() * self.gain).clamp(-2.0, 2.0)
    }

    fn reset(&mut self) {
        self.prev = Complex::new(0.0, 0.0);
    }
}

// Largest carrier offset the coherent loop will chase (Hz)
const MAX_TRACKED_OFFSET_HZ: f32 = 4000.0;

/// Carrier-tracking detector
///
/// An NCO driven by a first-order loop removes the residual carrier
/// before discrimination. GMSK data is DC-balanced over the loop time
/// constant, so the mean discriminator output is a clean frequency
/// error signal. Recovers bursts the plain discriminator loses to
/// transmitter oscillator offset.
#[derive(Clone, Debug)]
pub struct CoherentDemod {
    nco_phase: f32,
    nco_freq: f32,
    freq_limit: f32,
    loop_gain: f32,
    prev: Complex<f32>,
    gain: f32,
}

impl CoherentDemod {
    pub fn new() -> Self {
        use std::f32::consts::PI;
        Self {
            nco_phase: 0.0,
            nco_freq: 0.0,
            freq_limit: 2.0 * PI * MAX_TRACKED_OFFSET_HZ / WORKING_RATE as f32,
            loop_gain: 2.0e-3,
            prev: Complex::new(0.0, 0.0),
            gain: discriminator_gain(),
        }
    }
}

impl Default for CoherentDemod {
    fn default() -> Self {
        Self::new()
    }
}

impl Demod for CoherentDemod {
    fn process(&mut self, sample: Complex<f32>) -> f32 {
        use std::f32::consts::PI;

        let corrected = sample * Complex::from_polar(1.0, -self.nco_phase);
        self.nco_phase += self.nco_freq;
        if self.nco_phase > PI {
            self.nco_phase -= 2.0 * PI;
        } else if self.nco_phase < -PI {
            self.nco_phase += 2.0 * PI;
        }

        let d = corrected * self.prev.conj();
        self.prev = corrected;
        if d.norm_sqr() < 1e-12 {
            return 0.0;
        }

        let dphi = d.arg();
        self.nco_freq =
            (self.nco_freq + self.loop_gain * dphi).clamp(-self.freq_limit, self.freq_limit);

        (dphi * self.gain).clamp(-2.0, 2.0)
    }

    fn reset(&mut self) {
        self.nco_phase = 0.0;
        self.nco_freq = 0.0;
        self.prev = Complex::new(0.0, 0.0);
    }
}

// Hypothesis spacing for the challenger bank (Hz)
const CHALLENGER_STEP_HZ: f32 = 1500.0;

// Quality advantage a challenger branch needs before it takes over
const CHALLENGER_HYSTERESIS: f32 = 0.05;

/// Multi-hypothesis discriminator bank
///
/// Three discriminators run against fixed carrier-offset hypotheses.
/// Each branch keeps an eye-opening quality estimate (how close its
/// soft decisions sit to full scale); the best branch's output is
/// emitted. Branch states never mix, so a hypothesis switch does not
/// corrupt the winning branch's history.
#[derive(Clone, Debug)]
pub struct ChallengerDemod {
    branches: [OffsetBranch; 3],
    quality: [f32; 3],
    selected: usize,
    quality_alpha: f32,
}

impl ChallengerDemod {
    pub fn new() -> Self {
        let offsets = [-CHALLENGER_STEP_HZ, 0.0, CHALLENGER_STEP_HZ];
        Self {
            branches: [
                OffsetBranch::new(offsets[0]),
                OffsetBranch::new(offsets[1]),
                OffsetBranch::new(offsets[2]),
            ],
            quality: [0.0; 3],
            selected: 1,
            quality_alpha: 0.01,
        }
    }
}

impl Default for ChallengerDemod {
    fn default() -> Self {
        Self::new()
    }
}

impl Demod for ChallengerDemod {
    fn process(&mut self, sample: Complex<f32>) -> f32 {
        let mut soft = [0.0f32; 3];
        for (i, branch) in self.branches.iter_mut().enumerate() {
            soft[i] = branch.process(sample);
            let eye = 1.0 - (soft[i].abs() - 1.0).abs().min(1.0);
            self.quality[i] += self.quality_alpha * (eye - self.quality[i]);
        }

        let mut best = self.selected;
        for i in 0..3 {
            if self.quality[i] > self.quality[best] + CHALLENGER_HYSTERESIS {
                best = i;
            }
        }
        self.selected = best;

        soft[self.selected]
    }

    fn reset(&mut self) {
        for branch in self.branches.iter_mut() {
            branch.reset();
        }
        self.quality = [0.0; 3];
        self.selected = 1;
    }
}

// One challenger hypothesis: fixed-frequency rotator plus discriminator
#[derive(Clone, Debug)]
struct OffsetBranch {
    phase: f32,
    phase_inc: f32,
    disc: FmDiscriminator,
}

impl OffsetBranch {
    fn new(offset_hz: f32) -> Self {
        use std::f32::consts::PI;
        Self {
            phase: 0.0,
            phase_inc: -2.0 * PI * offset_hz / WORKING_RATE as f32,
            disc: FmDiscriminator::new(),
        }
    }

    fn process(&mut self, sample: Complex<f32>) -> f32 {
        use std::f32::consts::PI;
        let rotated = sample * Complex::from_polar(1.0, self.phase);
        self.phase += self.phase_inc;
        if self.phase > PI {
            self.phase -= 2.0 * PI;
        } else if self.phase < -PI {
            self.phase += 2.0 * PI;
        }
        self.disc.process(rotated)
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.disc.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::waveform::BAUD_HZ;

    // steady tone at `offset_hz` from the channel center
    fn tone(offset_hz: f32, len: usize) -> Vec<Complex<f32>> {
        use std::f32::consts::PI;
        (0..len)
            .map(|n| {
                Complex::from_polar(1.0, 2.0 * PI * offset_hz * n as f32 / WORKING_RATE as f32)
            })
            .collect()
    }

    #[test]
    fn test_discriminator_tone_polarity() {
        // a tone at +2400 Hz is a constant mark; at -2400 Hz, space
        let mut demod = FmDiscriminator::new();
        let soft: Vec<f32> = tone(BAUD_HZ / 4.0, 64)
            .into_iter()
            .map(|sa| demod.process(sa))
            .collect();
        for &s in &soft[1..] {
            assert!(s > 0.9, "mark decision {}", s);
        }

        demod.reset();
        let soft: Vec<f32> = tone(-BAUD_HZ / 4.0, 64)
            .into_iter()
            .map(|sa| demod.process(sa))
            .collect();
        for &s in &soft[1..] {
            assert!(s < -0.9, "space decision {}", s);
        }
    }

    #[test]
    fn test_discriminator_silence() {
        let mut demod = FmDiscriminator::new();
        for _i in 0..16 {
            assert_eq!(0.0, demod.process(Complex::new(0.0, 0.0)));
        }
    }

    #[test]
    fn test_coherent_tracks_out_offset() {
        // with a large carrier offset, the plain discriminator output
        // is biased; the coherent loop drives the bias out
        const OFFSET_HZ: f32 = 2000.0;

        let samples = tone(OFFSET_HZ, 8192);

        let mut plain = FmDiscriminator::new();
        let plain_tail: f32 = samples[4096..]
            .iter()
            .map(|&sa| plain.process(sa))
            .sum::<f32>()
            / 4096.0;

        let mut coherent = CoherentDemod::new();
        let mut tracked_tail = 0.0f32;
        for (n, &sa) in samples.iter().enumerate() {
            let soft = coherent.process(sa);
            if n >= 4096 {
                tracked_tail += soft;
            }
        }
        tracked_tail /= 4096.0;

        assert!(plain_tail.abs() > 0.5, "expected bias, got {}", plain_tail);
        assert!(
            tracked_tail.abs() < 0.1,
            "expected tracked-out bias, got {}",
            tracked_tail
        );
    }

    #[test]
    fn test_challenger_selects_offset_branch() {
        // an offset of one hypothesis step should hand the win to the
        // matching branch and produce unbiased output
        let samples = tone(CHALLENGER_STEP_HZ + BAUD_HZ / 4.0, 8192);

        let mut demod = ChallengerDemod::new();
        let mut tail = 0.0f32;
        for (n, &sa) in samples.iter().enumerate() {
            let soft = demod.process(sa);
            if n >= 4096 {
                tail += soft;
            }
        }
        tail /= 4096.0;

        // the +step branch sees a clean +2400 Hz mark tone
        assert_eq!(2, demod.selected);
        assert!(tail > 0.9, "expected full-scale mark, got {}", tail);
    }

    #[test]
    fn test_demodulate_stream_tagging() {
        let mut demod = Demodulator::new(DemodVariant::Discriminator);
        let stream = demod.demodulate(ChannelId::B, &tone(0.0, 32));
        assert_eq!(ChannelId::B, stream.channel);
        assert_eq!(DemodVariant::Discriminator, stream.variant);
        assert_eq!(32, stream.soft.len());
    }
}
