//! Link-layer deframing
//!
//! The [`Deframer`] turns the synchronized raw bit stream into
//! candidate frames. Three things happen to every bit, in order:
//!
//! 1. **NRZI decode**: a level transition is a zero, no transition is
//!    a one, so each decoded bit is a function of the current and
//!    previous raw bits.
//! 2. **Destuffing**: the transmitter inserts a zero after five
//!    consecutive ones so that the flag pattern cannot occur in data.
//!    The stuffed zero is removed here; a run of *six* ones is only
//!    legal as part of a flag, and a run of seven or more aborts the
//!    frame.
//! 3. **Flag search**: frames are bracketed by `01111110` flags. The
//!    closing flag of one frame may serve as the opening flag of the
//!    next, so frame filling resumes immediately after every close.
//!
//! The state machine is the explicit two-state enumeration
//! [`FrameSearch`]; transitions are driven one decoded bit at a time,
//! which keeps every edge testable without live samples.

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::block::{FramePayload, MAX_PAYLOAD_BITS};
use crate::waveform::FLAG;

// Smallest acceptable frame: one payload octet plus the 16-bit FCS
const MIN_FRAME_BITS: usize = 24;

// Flag bits that sit in the accumulator when a closing flag is
// recognized: the leading zero and six ones
const FLAG_BITS_IN_ACCUMULATOR: usize = 7;

/// Deframer state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSearch {
    /// Searching the decoded stream for a flag
    FlagHunt,

    /// Between flags, accumulating frame bits
    Filling,
}

/// A frame as it leaves the link layer
///
/// The payload is byte-aligned and non-empty; `fcs` holds the 16
/// trailing check bits, assembled least-significant bit first. No CRC
/// comparison has happened yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub payload: FramePayload,
    pub fcs: u16,
}

/// HDLC-style deframer with NRZI decoding and destuffing
#[derive(Clone, Debug)]
pub struct Deframer {
    state: FrameSearch,

    // previous raw (line) bit, for NRZI decoding
    prev_raw: bool,

    // last eight decoded bits, for flag hunting
    search: u8,

    // consecutive decoded ones
    ones: u32,

    // accumulated frame bits, including FCS and trailing flag bits
    frame: FramePayload,

    // the accumulator overflowed; discard at the next flag
    overflowed: bool,
}

impl Deframer {
    pub fn new() -> Self {
        Self {
            state: FrameSearch::FlagHunt,
            prev_raw: false,
            search: 0,
            ones: 0,
            frame: FramePayload::new(),
            overflowed: false,
        }
    }

    /// Current search state
    pub fn state(&self) -> FrameSearch {
        self.state
    }

    /// Reset to zero initial conditions
    pub fn reset(&mut self) {
        self.state = FrameSearch::FlagHunt;
        self.prev_raw = false;
        self.search = 0;
        self.ones = 0;
        self.frame.clear();
        self.overflowed = false;
    }

    /// Process one raw line bit
    ///
    /// Returns a frame when a closing flag completes one with a
    /// plausible length. Malformed candidates are discarded silently;
    /// the closing flag still reopens the frame search.
    pub fn input(&mut self, raw: bool) -> Option<RawFrame> {
        // NRZI: transition decodes to zero
        let bit = raw == self.prev_raw;
        self.prev_raw = raw;
        self.decoded(bit)
    }

    // Advance the state machine by one decoded bit
    fn decoded(&mut self, bit: bool) -> Option<RawFrame> {
        match self.state {
            FrameSearch::FlagHunt => {
                self.search = (self.search << 1) | bit as u8;
                if self.search == FLAG {
                    self.start_fill();
                }
                None
            }

            FrameSearch::Filling => {
                if bit {
                    self.ones += 1;
                    if self.ones > 6 {
                        // stuffing violation: abort and hunt again
                        debug!("deframer: frame abort: run of {} ones", self.ones);
                        self.state = FrameSearch::FlagHunt;
                        self.search = 0xff;
                        self.frame.clear();
                        self.ones = 0;
                        return None;
                    }
                    if !self.frame.push_bit(true) {
                        self.overflowed = true;
                    }
                    None
                } else if self.ones == 5 {
                    // stuffed zero: drop it
                    self.ones = 0;
                    None
                } else if self.ones == 6 {
                    // closing flag; it doubles as the next opening flag
                    self.ones = 0;
                    let out = self.close();
                    self.start_fill();
                    out
                } else {
                    self.ones = 0;
                    if !self.frame.push_bit(false) {
                        self.overflowed = true;
                    }
                    None
                }
            }
        }
    }

    // Begin (or restart) frame accumulation after a flag
    fn start_fill(&mut self) {
        self.state = FrameSearch::Filling;
        self.frame.clear();
        self.ones = 0;
        self.overflowed = false;
    }

    // A closing flag arrived; try to produce a frame
    fn close(&mut self) -> Option<RawFrame> {
        let mut frame = std::mem::take(&mut self.frame);

        if self.overflowed {
            debug!("deframer: discarding oversize frame");
            return None;
        }
        if frame.len_bits() < FLAG_BITS_IN_ACCUMULATOR {
            // back-to-back flags
            return None;
        }

        // strip the flag bits that were tentatively accumulated
        frame.truncate_bits(FLAG_BITS_IN_ACCUMULATOR);

        let total = frame.len_bits();
        if total < MIN_FRAME_BITS || total % 8 != 0 || total > MAX_PAYLOAD_BITS + 16 {
            debug!("deframer: discarding malformed frame of {} bits", total);
            return None;
        }

        // split off the FCS, transmitted least-significant bit first
        let mut fcs = 0u16;
        for i in 0..16 {
            fcs |= (frame.bit(total - 16 + i) as u16) << i;
        }
        frame.truncate_bits(16);

        debug!("deframer: frame of {} payload bits", frame.len_bits());
        Some(RawFrame {
            payload: frame,
            fcs,
        })
    }
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}
