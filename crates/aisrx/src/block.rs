//! Data types passed between pipeline stages
//!
//! Ownership flows strictly downstream: a [`SampleBlock`] is moved (or
//! shared read-only behind an `Arc`) into the next stage and never
//! mutated after handoff. Frames are bounded-size values backed by
//! [`arrayvec`], so the hot path never allocates per frame.

use arrayvec::ArrayVec;
use chrono::{DateTime, Utc};
use num_complex::Complex;

/// Maximum frame payload length, in bits
///
/// 168 six-bit characters' worth of data. Frames longer than this are
/// discarded by the deframer.
pub const MAX_PAYLOAD_BITS: usize = 1008;

/// Maximum frame payload length, in octets
pub const MAX_PAYLOAD_OCTETS: usize = MAX_PAYLOAD_BITS / 8;

// Buffer capacity in octets: a maximum-length payload plus the FCS
// and the flag bits the deframer accumulates before a frame closes
const BUFFER_OCTETS: usize = MAX_PAYLOAD_OCTETS + 4;

/// AIS radio channel
///
/// Channel A (87B) is 161.975 MHz; channel B (88B) is 162.025 MHz.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum_macros::Display, strum_macros::EnumString)]
pub enum ChannelId {
    /// AIS channel 87B, 161.975 MHz
    #[strum(serialize = "A")]
    A,

    /// AIS channel 88B, 162.025 MHz
    #[strum(serialize = "B")]
    B,
}

impl ChannelId {
    /// Single-character channel designator, as used in VDM sentences
    pub fn designator(&self) -> char {
        match self {
            ChannelId::A => 'A',
            ChannelId::B => 'B',
        }
    }
}

/// Demodulator strategy
///
/// A closed set of interchangeable algorithms. Each variant keeps only
/// its own filter and loop state; variants never share mutable state,
/// so any subset of them may run concurrently on the same channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum_macros::Display, strum_macros::EnumString, strum_macros::EnumIter)]
pub enum DemodVariant {
    /// Non-coherent FM discriminator
    #[strum(serialize = "discriminator")]
    Discriminator,

    /// PLL-assisted detection with carrier-offset tracking
    #[strum(serialize = "coherent")]
    Coherent,

    /// Multi-hypothesis bank of offset discriminators
    #[strum(serialize = "challenger")]
    Challenger,
}

/// A block of complex baseband samples
///
/// Blocks are produced by the sample source at the acquisition rate
/// (with `channel` unset) and by the sample conditioner at the working
/// rate, one stream per radio channel. `sequence` increases
/// monotonically per stream; stages must observe blocks in
/// non-decreasing sequence order.
#[derive(Clone, Debug)]
pub struct SampleBlock {
    /// Radio channel, once assigned by the conditioner
    ///
    /// `None` marks a composite capture that has not yet been split
    /// into per-channel basebands.
    pub channel: Option<ChannelId>,

    /// Monotonically increasing block number within its stream
    pub sequence: u64,

    /// Sampling rate of `samples`, in Hz
    pub sample_rate: u32,

    /// Complex IQ samples
    pub samples: Vec<Complex<f32>>,
}

impl SampleBlock {
    /// New composite (pre-conditioner) block
    pub fn composite(sequence: u64, sample_rate: u32, samples: Vec<Complex<f32>>) -> Self {
        Self {
            channel: None,
            sequence,
            sample_rate,
            samples,
        }
    }

    /// New per-channel baseband block
    pub fn baseband(
        channel: ChannelId,
        sequence: u64,
        sample_rate: u32,
        samples: Vec<Complex<f32>>,
    ) -> Self {
        Self {
            channel: Some(channel),
            sequence,
            sample_rate,
            samples,
        }
    }

    /// Number of samples in the block
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the block contains no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Soft symbol decisions recovered from one [`SampleBlock`]
///
/// One soft decision per input sample, at the working rate. The sign
/// carries the bit estimate and the magnitude the confidence, nominally
/// within `±1.0`. Created by a demodulator, consumed by the bit
/// synchronizer, then discarded.
#[derive(Clone, Debug)]
pub struct SymbolStream {
    /// Originating radio channel
    pub channel: ChannelId,

    /// Demodulator variant that produced the decisions
    pub variant: DemodVariant,

    /// Soft decisions, one per input sample
    pub soft: Vec<f32>,
}

/// Frame payload bits, packed in arrival order
///
/// Bit `i` of the payload is stored in byte `i / 8` at position
/// `7 - (i % 8)`: the first bit received is the most significant bit
/// of the first octet. The deframer only emits byte-aligned payloads.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FramePayload {
    octets: ArrayVec<u8, BUFFER_OCTETS>,
    nbits: usize,
}

impl FramePayload {
    /// Empty payload
    pub fn new() -> Self {
        Self {
            octets: ArrayVec::new(),
            nbits: 0,
        }
    }

    /// Construct from whole octets
    ///
    /// Returns `None` if `octets` exceeds the maximum payload length.
    pub fn from_octets(octets: &[u8]) -> Option<Self> {
        if octets.len() > BUFFER_OCTETS {
            return None;
        }
        let mut out = Self::new();
        out.octets.try_extend_from_slice(octets).ok()?;
        out.nbits = octets.len() * 8;
        Some(out)
    }

    /// Append one bit
    ///
    /// Returns `false` if the payload is full.
    pub fn push_bit(&mut self, bit: bool) -> bool {
        if self.nbits >= BUFFER_OCTETS * 8 {
            return false;
        }
        if self.nbits % 8 == 0 {
            self.octets.push(0);
        }
        if bit {
            let byte = self.octets.last_mut().expect("pushed above");
            *byte |= 1 << (7 - (self.nbits % 8));
        }
        self.nbits += 1;
        true
    }

    /// Read bit `i`, in arrival order
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < self.nbits);
        (self.octets[i / 8] >> (7 - (i % 8))) & 1 == 1
    }

    /// Discard the trailing `n` bits
    pub fn truncate_bits(&mut self, n: usize) {
        self.nbits = self.nbits.saturating_sub(n);
        self.octets.truncate((self.nbits + 7) / 8);
        // zero any partial bits left in the last octet
        let tail = self.nbits % 8;
        if tail != 0 {
            if let Some(byte) = self.octets.last_mut() {
                *byte &= 0xffu8 << (8 - tail);
            }
        }
    }

    /// Remove all bits
    pub fn clear(&mut self) {
        self.octets.clear();
        self.nbits = 0;
    }

    /// Payload length in bits
    pub fn len_bits(&self) -> usize {
        self.nbits
    }

    /// True if the payload holds no bits
    pub fn is_empty(&self) -> bool {
        self.nbits == 0
    }

    /// Payload octets
    ///
    /// The final octet is zero-padded if the bit count is not a
    /// multiple of eight.
    pub fn as_octets(&self) -> &[u8] {
        self.octets.as_slice()
    }
}

impl Default for FramePayload {
    fn default() -> Self {
        Self::new()
    }
}

/// A candidate frame recovered by the link deframer
///
/// The payload is everything between two flags, less the trailing
/// 16-bit frame check sequence, which is kept separately in `fcs`.
/// Candidates have byte-aligned, non-empty payloads but have *not*
/// been CRC-checked.
#[derive(Clone, Debug)]
pub struct CandidateFrame {
    /// Payload bits, in arrival order
    pub payload: FramePayload,

    /// Trailing frame check sequence
    ///
    /// Assembled least-significant-bit first from the 16 bits that
    /// followed the payload.
    pub fcs: u16,

    /// Originating radio channel
    pub channel: ChannelId,

    /// Demodulator variant that recovered the frame
    pub variant: DemodVariant,

    /// Frame completion time
    pub received_at: DateTime<Utc>,
}

/// A frame whose check sequence matched
///
/// Construction is restricted to the frame validator, so holding a
/// `ValidatedFrame` is proof the CRC passed.
#[derive(Clone, Debug)]
pub struct ValidatedFrame {
    payload: FramePayload,
    channel: ChannelId,
    variant: DemodVariant,
    received_at: DateTime<Utc>,
}

impl ValidatedFrame {
    pub(crate) fn from_candidate(frame: CandidateFrame) -> Self {
        Self {
            payload: frame.payload,
            channel: frame.channel,
            variant: frame.variant,
            received_at: frame.received_at,
        }
    }

    /// Payload bits, in arrival order
    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    /// Originating radio channel
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Demodulator variant that recovered the frame
    pub fn variant(&self) -> DemodVariant {
        self.variant
    }

    /// Frame completion time
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_payload_bit_order() {
        let mut payload = FramePayload::new();
        // 0b1100_0001 …: first bit lands in the MSb
        for bit in [true, true, false, false, false, false, false, true, true] {
            assert!(payload.push_bit(bit));
        }
        assert_eq!(9, payload.len_bits());
        assert_eq!(&[0xc1u8, 0x80], payload.as_octets());
        assert!(payload.bit(0));
        assert!(!payload.bit(2));
        assert!(payload.bit(7));
        assert!(payload.bit(8));
    }

    #[test]
    fn test_frame_payload_truncate() {
        let mut payload = FramePayload::from_octets(&[0xff, 0xff]).unwrap();
        payload.truncate_bits(3);
        assert_eq!(13, payload.len_bits());
        assert_eq!(&[0xffu8, 0xf8], payload.as_octets());

        payload.truncate_bits(5);
        assert_eq!(8, payload.len_bits());
        assert_eq!(&[0xffu8], payload.as_octets());

        payload.truncate_bits(100);
        assert!(payload.is_empty());
        assert!(payload.as_octets().is_empty());
    }

    #[test]
    fn test_frame_payload_capacity() {
        let mut payload = FramePayload::new();
        for _i in 0..BUFFER_OCTETS * 8 {
            assert!(payload.push_bit(true));
        }
        assert!(!payload.push_bit(true));
        assert_eq!(BUFFER_OCTETS * 8, payload.len_bits());
    }
}
