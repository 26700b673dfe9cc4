//! Output sinks: NMEA 0183 serialization to stdout and UDP
//!
//! The pipeline hands sinks fully-decoded messages; the external
//! representation is built here. Messages are re-armored into
//! `!AIVDM` sentences, fragmenting payloads that exceed the NMEA
//! line budget and rotating the multi-sentence group id the way
//! receivers expect.

use std::io::{self, Write};
use std::net::UdpSocket;

use chrono::SecondsFormat;

use aisrx::{armor_payload, AisMessage, DeliverStatus, FramePayload, Sink};

// Armored characters per sentence fragment. Keeps every fragment
// within the 82-character NMEA line budget.
const MAX_FRAGMENT_CHARS: usize = 60;

/// Builds `!AIVDM` sentences from decoded messages
///
/// Stateful: multi-fragment messages consume sequential group ids,
/// which wrap at ten per the sentence grammar.
#[derive(Clone, Debug, Default)]
pub struct NmeaFormatter {
    group: u8,
}

impl NmeaFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sentences for one message, in transmission order
    pub fn sentences(&mut self, message: &AisMessage) -> Vec<String> {
        self.sentences_for(message.channel().designator(), message.payload())
    }

    // Armor and fragment one payload
    fn sentences_for(&mut self, channel: char, payload: &FramePayload) -> Vec<String> {
        let (armored, fill) = armor_payload(payload);
        let fragments: Vec<&str> = armored
            .as_bytes()
            .chunks(MAX_FRAGMENT_CHARS)
            .map(|chunk| std::str::from_utf8(chunk).expect("armored text is ASCII"))
            .collect();

        let total = fragments.len();
        let group_field = if total > 1 {
            let id = self.group;
            self.group = (self.group + 1) % 10;
            id.to_string()
        } else {
            String::new()
        };

        fragments
            .iter()
            .enumerate()
            .map(|(index, fragment)| {
                // fill bits apply to the final fragment only
                let fill_field = if index + 1 == total { fill } else { 0 };
                let body = format!(
                    "AIVDM,{},{},{},{},{},{}",
                    total,
                    index + 1,
                    group_field,
                    channel,
                    fragment,
                    fill_field
                );
                format!("!{}*{:02X}", body, nmea_checksum(&body))
            })
            .collect()
    }
}

// XOR of every character between `!` and `*`
fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |sum, byte| sum ^ byte)
}

/// Writes sentences to standard output
pub struct NmeaSink {
    formatter: NmeaFormatter,
    timestamps: bool,
    stdout: io::Stdout,
}

impl NmeaSink {
    pub fn new(timestamps: bool) -> Self {
        Self {
            formatter: NmeaFormatter::new(),
            timestamps,
            stdout: io::stdout(),
        }
    }
}

impl Sink for NmeaSink {
    fn deliver(&mut self, message: &AisMessage) -> DeliverStatus {
        let sentences = self.formatter.sentences(message);
        let mut out = self.stdout.lock();
        for sentence in sentences {
            let result = if self.timestamps {
                writeln!(
                    out,
                    "{} {}",
                    message
                        .received_at()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                    sentence
                )
            } else {
                writeln!(out, "{}", sentence)
            };
            if result.is_err() {
                return DeliverStatus::Dropped;
            }
        }
        let _ = out.flush();
        DeliverStatus::Accepted
    }
}

/// Sends sentences as UDP datagrams, one per sentence
pub struct UdpSink {
    formatter: NmeaFormatter,
    socket: UdpSocket,
}

impl UdpSink {
    /// Bind an ephemeral local port and aim at `target`
    pub fn connect(target: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(target)?;
        Ok(Self {
            formatter: NmeaFormatter::new(),
            socket,
        })
    }
}

impl Sink for UdpSink {
    fn deliver(&mut self, message: &AisMessage) -> DeliverStatus {
        for sentence in self.formatter.sentences(message) {
            let mut datagram = sentence;
            datagram.push_str("\r\n");
            if self.socket.send(datagram.as_bytes()).is_err() {
                return DeliverStatus::Dropped;
            }
        }
        DeliverStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use aisrx::dearmor_char;

    // rebuild the payload bits behind an armored string
    fn payload_from_armored(armored: &str, fill: usize) -> FramePayload {
        let mut payload = FramePayload::new();
        let nbits = armored.len() * 6 - fill;
        let mut pushed = 0;
        for c in armored.chars() {
            let v = dearmor_char(c).expect("armored character");
            for i in (0..6).rev() {
                if pushed < nbits {
                    assert!(payload.push_bit((v >> i) & 1 == 1));
                    pushed += 1;
                }
            }
        }
        payload
    }

    #[test]
    fn test_checksum_reference_sentence() {
        // canonical example sentence from the AIVDM protocol notes
        assert_eq!(
            0x5c,
            nmea_checksum("AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0")
        );
    }

    #[test]
    fn test_single_fragment_round_trip() {
        let armored = "177KQJ5000G?tO`K>RA1wUbN0TKH";
        let payload = payload_from_armored(armored, 0);
        assert_eq!(168, payload.len_bits());

        let mut formatter = NmeaFormatter::new();
        let sentences = formatter.sentences_for('B', &payload);
        assert_eq!(
            vec!["!AIVDM,1,1,,B,177KQJ5000G?tO`K>RA1wUbN0TKH,0*5C".to_owned()],
            sentences
        );
    }

    #[test]
    fn test_multi_fragment_message() {
        // a 424-bit static and voyage payload armors to 71 characters
        // with two fill bits and must split across two sentences
        let payload = FramePayload::from_octets(&[0x5a; 53]).unwrap();
        let (armored, fill) = armor_payload(&payload);
        assert_eq!(71, armored.len());
        assert_eq!(2, fill);

        let mut formatter = NmeaFormatter::new();
        let sentences = formatter.sentences_for('A', &payload);
        assert_eq!(2, sentences.len());

        // fragment counts, shared group id, fill on the final fragment
        assert!(sentences[0].starts_with("!AIVDM,2,1,0,A,"));
        assert!(sentences[1].starts_with("!AIVDM,2,2,0,A,"));
        assert!(sentences[0].contains(",0*"));
        assert!(sentences[1].contains(",2*"));

        // the next multipart message takes the next group id
        let sentences = formatter.sentences_for('A', &payload);
        assert!(sentences[0].starts_with("!AIVDM,2,1,1,A,"));
    }

    #[test]
    fn test_fragments_fit_line_budget() {
        let payload = FramePayload::from_octets(&[0xff; 126]).unwrap();
        let mut formatter = NmeaFormatter::new();
        for sentence in formatter.sentences_for('B', &payload) {
            assert!(sentence.len() <= 82, "sentence too long: {}", sentence.len());
        }
    }
}
