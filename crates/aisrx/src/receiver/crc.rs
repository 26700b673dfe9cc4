//! Frame check sequence validation
//!
//! AIS frames carry the HDLC frame check sequence: CRC-16 with the
//! CCITT polynomial in its reflected form (0x8408), initial value
//! 0xFFFF and final complement, computed over the payload octets in
//! transmission order.
//!
//! Payload octets store their first-received bit in the most
//! significant position (see [`FramePayload`]), so each octet is
//! bit-reversed before it meets the byte-wide table, which indexes by
//! first-received-bit-in-LSb convention.

use lazy_static::lazy_static;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::block::{CandidateFrame, FramePayload, ValidatedFrame};
use crate::counters::Counters;

// Reflected CCITT polynomial
const POLY: u16 = 0x8408;

lazy_static! {
    static ref CRC_TABLE: [u16; 256] = {
        let mut table = [0u16; 256];
        for (n, entry) in table.iter_mut().enumerate() {
            let mut crc = n as u16;
            for _i in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ POLY
                } else {
                    crc >> 1
                };
            }
            *entry = crc;
        }
        table
    };
}

/// Frame check sequence over a payload
///
/// Returns the value the transmitter would have appended after these
/// payload bits.
pub fn checksum(payload: &FramePayload) -> u16 {
    let mut crc = 0xffffu16;
    for &octet in payload.as_octets() {
        let byte = octet.reverse_bits();
        crc = (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u16) & 0xff) as usize];
    }
    !crc
}

/// Validate a candidate frame
///
/// Compares the computed check sequence against the received one.
/// A match produces a [`ValidatedFrame`]; a mismatch drops the
/// candidate and ticks the CRC failure counter. No error correction
/// is attempted.
pub fn validate(frame: CandidateFrame, counters: &Counters) -> Option<ValidatedFrame> {
    counters.add_frame_attempted();

    let computed = checksum(&frame.payload);
    if computed == frame.fcs {
        counters.add_frame_ok();
        Some(ValidatedFrame::from_candidate(frame))
    } else {
        debug!(
            "frame check failed: computed {:04x}, received {:04x} ({} bits, channel {}, {})",
            computed,
            frame.fcs,
            frame.payload.len_bits(),
            frame.channel,
            frame.variant
        );
        counters.add_crc_failure();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::block::{ChannelId, DemodVariant};

    #[test]
    fn test_checksum_reference_vector() {
        // CRC-16/X-25 of the ASCII digits "123456789" is 0x906e.
        // Our octets carry the first-transmitted bit in the MSb, so
        // the reference bytes are bit-reversed going in.
        let reversed: Vec<u8> = b"123456789".iter().map(|b| b.reverse_bits()).collect();
        let payload = FramePayload::from_octets(&reversed).unwrap();
        assert_eq!(0x906e, checksum(&payload));
    }

    fn candidate(payload: FramePayload, fcs: u16) -> CandidateFrame {
        CandidateFrame {
            payload,
            fcs,
            channel: ChannelId::A,
            variant: DemodVariant::Discriminator,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_good_frame() {
        let counters = Counters::new();
        let payload = FramePayload::from_octets(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        let fcs = checksum(&payload);

        let valid = validate(candidate(payload.clone(), fcs), &counters)
            .expect("expected frame to validate");
        assert_eq!(payload.as_octets(), valid.payload().as_octets());
        assert_eq!(1, counters.frames_attempted());
        assert_eq!(1, counters.frames_ok());
        assert_eq!(0, counters.crc_failures());
    }

    #[test]
    fn test_validate_rejects_any_flipped_bit() {
        let counters = Counters::new();
        let octets = [0x12u8, 0x34, 0x56, 0x78];
        let good = FramePayload::from_octets(&octets).unwrap();
        let fcs = checksum(&good);

        for bit in 0..octets.len() * 8 {
            let mut corrupt = octets;
            corrupt[bit / 8] ^= 1 << (7 - bit % 8);
            let payload = FramePayload::from_octets(&corrupt).unwrap();
            assert!(
                validate(candidate(payload, fcs), &counters).is_none(),
                "bit {} corruption passed validation",
                bit
            );
        }

        // corrupting the FCS itself also rejects
        assert!(validate(candidate(good, fcs ^ 0x0100), &counters).is_none());
        assert_eq!(33, counters.crc_failures());
    }
}
