//! Typed AIS messages
//!
//! [`AisMessage::decode()`] maps a validated frame's payload into one
//! of the known message types. Fields are fixed-offset, fixed-width
//! bit groups read front to back; the leading six bits select the
//! message type.
//!
//! Many fields define a "not available" code. These are surfaced as
//! `Option` fields set to `None`, never coerced to zero, and the raw
//! sentinel constants are public so a sink can reproduce the wire
//! values exactly. Message types without a dedicated decoder become
//! [`MessageBody::Unparsed`]; the envelope still carries the type id,
//! MMSI, and raw payload. Running out of payload bits mid-field
//! invalidates the whole message: nothing is ever partially emitted.

pub mod codes;
mod reader;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::block::{ChannelId, DemodVariant, FramePayload, ValidatedFrame};

use self::codes::{AtonType, EpfdType, NavigationStatus, ShipType};
pub use self::reader::BitReader;

/// Speed over ground "not available" code (tenths of a knot)
pub const SOG_UNAVAILABLE: u16 = 1023;

/// Course over ground "not available" code (tenths of a degree)
pub const COG_UNAVAILABLE: u16 = 3600;

/// True heading "not available" code (degrees)
pub const HEADING_UNAVAILABLE: u16 = 511;

/// Rate of turn "not available" code
pub const ROT_UNAVAILABLE: i8 = -128;

/// Longitude "not available" code (181°, in 1/10000 minute)
pub const LON_UNAVAILABLE: i32 = 181 * 600_000;

/// Latitude "not available" code (91°, in 1/10000 minute)
pub const LAT_UNAVAILABLE: i32 = 91 * 600_000;

/// UTC second "not available" code
pub const UTC_SECOND_UNAVAILABLE: u8 = 60;

/// Draught "not available" code (decimeters)
pub const DRAUGHT_UNAVAILABLE: u8 = 0;

/// Error decoding a message from a validated frame
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum MessageDecodeErr {
    /// The payload ended in the middle of a fixed-length field
    #[error("message truncated: wanted {wanted} bits, {remaining} remain")]
    Truncated {
        /// Width of the field being read
        wanted: usize,
        /// Bits left in the payload
        remaining: usize,
    },
}

/// A decoded AIS message
///
/// The envelope common to every message type: type id, source MMSI,
/// receive metadata, the raw payload, and a content fingerprint for
/// duplicate suppression. The typed fields live in
/// [`body()`](AisMessage::body).
#[derive(Clone, Debug)]
pub struct AisMessage {
    msg_type: u8,
    mmsi: u32,
    channel: ChannelId,
    variant: DemodVariant,
    received_at: DateTime<Utc>,
    fingerprint: u64,
    payload: FramePayload,
    body: MessageBody,
}

impl AisMessage {
    /// Decode a validated frame into a typed message
    ///
    /// Unrecognized message types succeed with an
    /// [`Unparsed`](MessageBody::Unparsed) body. An error means the
    /// payload was too short for its declared type; the frame should
    /// be dropped and counted.
    pub fn decode(frame: &ValidatedFrame) -> Result<Self, MessageDecodeErr> {
        let payload = frame.payload();
        let mut rd = BitReader::new(payload);

        let msg_type = rd.u8(6)?;
        rd.skip(2)?; // repeat indicator
        let mmsi = rd.u32(30)?;

        let body = match msg_type {
            1..=3 => MessageBody::Position(PositionReport::decode(&mut rd)?),
            4 | 11 => MessageBody::BaseStation(BaseStationReport::decode(&mut rd)?),
            5 => MessageBody::StaticAndVoyage(StaticAndVoyage::decode(&mut rd)?),
            18 => MessageBody::StandardClassB(StandardClassBReport::decode(&mut rd)?),
            19 => MessageBody::ExtendedClassB(ExtendedClassBReport::decode(&mut rd)?),
            21 => MessageBody::AidToNavigation(AidToNavigationReport::decode(&mut rd)?),
            24 => MessageBody::StaticData(StaticDataReport::decode(&mut rd)?),
            _ => MessageBody::Unparsed,
        };

        Ok(Self {
            msg_type,
            mmsi,
            channel: frame.channel(),
            variant: frame.variant(),
            received_at: frame.received_at(),
            fingerprint: fingerprint(msg_type, mmsi, payload),
            payload: payload.clone(),
            body,
        })
    }

    /// Message type id, 1 through 27
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Source station identity
    pub fn mmsi(&self) -> u32 {
        self.mmsi
    }

    /// Radio channel the message was received on
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

    /// Content fingerprint for duplicate suppression
    ///
    /// Derived from the message type, MMSI, and the exact payload
    /// bits. Two receptions of the same transmission, from either
    /// channel and any demodulator variant, fingerprint identically.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Raw frame payload
    ///
    /// The complete bit payload, for sinks that re-armor the message
    /// into its external representation.
    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    /// Typed message fields
    pub fn body(&self) -> &MessageBody {
        &self.body
    }
}

impl std::fmt::Display for AisMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type {} from {} on {} ({})",
            self.msg_type, self.mmsi, self.channel, self.variant
        )
    }
}

// Fingerprint over (type, mmsi, payload bits)
//
// The payload is byte-aligned with no armoring fill, so hashing the
// octets and the bit count covers the exact transmitted content.
fn fingerprint(msg_type: u8, mmsi: u32, payload: &FramePayload) -> u64 {
    let mut hasher = DefaultHasher::new();
    msg_type.hash(&mut hasher);
    mmsi.hash(&mut hasher);
    payload.len_bits().hash(&mut hasher);
    payload.as_octets().hash(&mut hasher);
    hasher.finish()
}

/// Typed field sets, tagged by message type
#[derive(Clone, Debug, PartialEq)]
pub enum MessageBody {
    /// Types 1, 2, 3: Class A position report
    Position(PositionReport),

    /// Types 4 and 11: base station / UTC date response
    BaseStation(BaseStationReport),

    /// Type 5: static and voyage related data
    StaticAndVoyage(StaticAndVoyage),

    /// Type 18: standard Class B position report
    StandardClassB(StandardClassBReport),

    /// Type 19: extended Class B position report
    ExtendedClassB(ExtendedClassBReport),

    /// Type 21: aid-to-navigation report
    AidToNavigation(AidToNavigationReport),

    /// Type 24: static data report, part A or B
    StaticData(StaticDataReport),

    /// Any other type: envelope fields and raw payload only
    Unparsed,
}

/// Vessel dimensions relative to the position reference point (meters)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub to_bow: u16,
    pub to_stern: u16,
    pub to_port: u8,
    pub to_starboard: u8,
}

impl Dimensions {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        Ok(Self {
            to_bow: rd.u16(9)?,
            to_stern: rd.u16(9)?,
            to_port: rd.u8(6)?,
            to_starboard: rd.u8(6)?,
        })
    }
}

/// Class A position report (types 1, 2, 3)
#[derive(Clone, Debug, PartialEq)]
pub struct PositionReport {
    /// Navigational status
    pub status: NavigationStatus,

    /// Raw rate-of-turn field; see [`rate_of_turn()`](Self::rate_of_turn)
    pub rot_raw: i8,

    /// Speed over ground (knots); `None` when not available
    pub sog_knots: Option<f32>,

    /// High (true) or low (false) position accuracy
    pub position_accuracy: bool,

    /// Longitude (degrees, east positive); `None` when not available
    pub longitude: Option<f64>,

    /// Latitude (degrees, north positive); `None` when not available
    pub latitude: Option<f64>,

    /// Course over ground (degrees); `None` when not available
    pub cog_degrees: Option<f32>,

    /// True heading (degrees); `None` when not available
    pub heading_degrees: Option<u16>,

    /// UTC second of the position fix; `None` when not available
    pub utc_second: Option<u8>,

    /// Special maneuver indicator, 0 = not available
    pub maneuver: u8,

    /// RAIM flag
    pub raim: bool,

    /// Communication state bits
    pub radio_status: u32,
}

impl PositionReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        let status = NavigationStatus::from_raw(rd.u8(4)?);
        let rot_raw = rd.i32(8)? as i8;
        let sog = rd.u16(10)?;
        let position_accuracy = rd.flag()?;
        let lon = rd.i32(28)?;
        let lat = rd.i32(27)?;
        let cog = rd.u16(12)?;
        let heading = rd.u16(9)?;
        let second = rd.u8(6)?;
        let maneuver = rd.u8(2)?;
        rd.skip(3)?; // spare
        let raim = rd.flag()?;
        let radio_status = rd.u32(19)?;

        Ok(Self {
            status,
            rot_raw,
            sog_knots: decode_sog(sog),
            position_accuracy,
            longitude: decode_lon(lon),
            latitude: decode_lat(lat),
            cog_degrees: decode_cog(cog),
            heading_degrees: decode_heading(heading),
            utc_second: decode_second(second),
            maneuver,
            raim,
            radio_status,
        })
    }

    /// Rate of turn (degrees per minute)
    ///
    /// `None` when the field carries the "not available" code. Raw
    /// values of ±127 mean "turning faster than 5°/30 s, no turn
    /// indicator" and map to ±720°/min, the largest encodable rate.
    pub fn rate_of_turn(&self) -> Option<f32> {
        if self.rot_raw == ROT_UNAVAILABLE {
            None
        } else {
            let mag = (self.rot_raw.unsigned_abs() as f32 / 4.733).powi(2);
            Some(mag.copysign(self.rot_raw as f32))
        }
    }
}

/// Base station report (type 4) and UTC date response (type 11)
#[derive(Clone, Debug, PartialEq)]
pub struct BaseStationReport {
    /// UTC year; `None` when not available
    pub year: Option<u16>,

    /// UTC month, 1-12; `None` when not available
    pub month: Option<u8>,

    /// UTC day, 1-31; `None` when not available
    pub day: Option<u8>,

    /// UTC hour, 0-23; `None` when not available
    pub hour: Option<u8>,

    /// UTC minute; `None` when not available
    pub minute: Option<u8>,

    /// UTC second; `None` when not available
    pub second: Option<u8>,

    /// High (true) or low (false) position accuracy
    pub position_accuracy: bool,

    /// Longitude (degrees); `None` when not available
    pub longitude: Option<f64>,

    /// Latitude (degrees); `None` when not available
    pub latitude: Option<f64>,

    /// Position fixing device type
    pub epfd: EpfdType,

    /// RAIM flag
    pub raim: bool,

    /// Communication state bits
    pub radio_status: u32,
}

impl BaseStationReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        let year = rd.u16(14)?;
        let month = rd.u8(4)?;
        let day = rd.u8(5)?;
        let hour = rd.u8(5)?;
        let minute = rd.u8(6)?;
        let second = rd.u8(6)?;
        let position_accuracy = rd.flag()?;
        let lon = rd.i32(28)?;
        let lat = rd.i32(27)?;
        let epfd = EpfdType::from_raw(rd.u8(4)?);
        rd.skip(10)?; // spare
        let raim = rd.flag()?;
        let radio_status = rd.u32(19)?;

        Ok(Self {
            year: (year != 0).then_some(year),
            month: (month != 0).then_some(month),
            day: (day != 0).then_some(day),
            hour: (hour != 24).then_some(hour),
            minute: (minute != 60).then_some(minute),
            second: (second != 60).then_some(second),
            position_accuracy,
            longitude: decode_lon(lon),
            latitude: decode_lat(lat),
            epfd,
            raim,
            radio_status,
        })
    }
}

/// Static and voyage related data (type 5)
#[derive(Clone, Debug, PartialEq)]
pub struct StaticAndVoyage {
    /// AIS version indicator
    pub ais_version: u8,

    /// IMO ship identification number; `None` when not available
    pub imo: Option<u32>,

    /// Radio call sign
    pub callsign: String,

    /// Vessel name
    pub name: String,

    /// Ship and cargo type
    pub ship_type: ShipType,

    /// Vessel dimensions
    pub dimensions: Dimensions,

    /// Position fixing device type
    pub epfd: EpfdType,

    /// Estimated month of arrival, 1-12; `None` when not available
    pub eta_month: Option<u8>,

    /// Estimated day of arrival, 1-31; `None` when not available
    pub eta_day: Option<u8>,

    /// Estimated hour of arrival, 0-23; `None` when not available
    pub eta_hour: Option<u8>,

    /// Estimated minute of arrival; `None` when not available
    pub eta_minute: Option<u8>,

    /// Maximum present static draught (meters); `None` when not available
    pub draught: Option<f32>,

    /// Destination, free text
    pub destination: String,

    /// Data terminal ready
    pub dte_ready: bool,
}

impl StaticAndVoyage {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        let ais_version = rd.u8(2)?;
        let imo = rd.u32(30)?;
        let callsign = rd.sixbit_string(7)?;
        let name = rd.sixbit_string(20)?;
        let ship_type = ShipType(rd.u8(8)?);
        let dimensions = Dimensions::decode(rd)?;
        let epfd = EpfdType::from_raw(rd.u8(4)?);
        let eta_month = rd.u8(4)?;
        let eta_day = rd.u8(5)?;
        let eta_hour = rd.u8(5)?;
        let eta_minute = rd.u8(6)?;
        let draught = rd.u8(8)?;
        let destination = rd.sixbit_string(20)?;
        let dte = rd.flag()?;

        Ok(Self {
            ais_version,
            imo: (imo != 0).then_some(imo),
            callsign,
            name,
            ship_type,
            dimensions,
            epfd,
            eta_month: (eta_month != 0).then_some(eta_month),
            eta_day: (eta_day != 0).then_some(eta_day),
            eta_hour: (eta_hour != 24).then_some(eta_hour),
            eta_minute: (eta_minute != 60).then_some(eta_minute),
            draught: (draught != DRAUGHT_UNAVAILABLE).then(|| draught as f32 / 10.0),
            destination,
            // DTE is transmitted inverted: 0 means ready
            dte_ready: !dte,
        })
    }
}

/// Standard Class B position report (type 18)
#[derive(Clone, Debug, PartialEq)]
pub struct StandardClassBReport {
    /// Speed over ground (knots); `None` when not available
    pub sog_knots: Option<f32>,

    /// High (true) or low (false) position accuracy
    pub position_accuracy: bool,

    /// Longitude (degrees); `None` when not available
    pub longitude: Option<f64>,

    /// Latitude (degrees); `None` when not available
    pub latitude: Option<f64>,

    /// Course over ground (degrees); `None` when not available
    pub cog_degrees: Option<f32>,

    /// True heading (degrees); `None` when not available
    pub heading_degrees: Option<u16>,

    /// UTC second of the position fix; `None` when not available
    pub utc_second: Option<u8>,

    /// Carrier-sense unit (true) vs SOTDMA unit (false)
    pub cs_unit: bool,

    /// Unit has a display
    pub has_display: bool,

    /// Unit is attached to a VHF voice radio with DSC
    pub has_dsc: bool,

    /// Unit can use the whole marine band
    pub whole_band: bool,

    /// Unit accepts channel assignment via message 22
    pub accepts_msg22: bool,

    /// Station operating in assigned mode
    pub assigned: bool,

    /// RAIM flag
    pub raim: bool,

    /// Communication state bits
    pub radio_status: u32,
}

impl StandardClassBReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        rd.skip(8)?; // regional reserved
        let sog = rd.u16(10)?;
        let position_accuracy = rd.flag()?;
        let lon = rd.i32(28)?;
        let lat = rd.i32(27)?;
        let cog = rd.u16(12)?;
        let heading = rd.u16(9)?;
        let second = rd.u8(6)?;
        rd.skip(2)?; // regional reserved
        let cs_unit = rd.flag()?;
        let has_display = rd.flag()?;
        let has_dsc = rd.flag()?;
        let whole_band = rd.flag()?;
        let accepts_msg22 = rd.flag()?;
        let assigned = rd.flag()?;
        let raim = rd.flag()?;
        let radio_status = rd.u32(20)?;

        Ok(Self {
            sog_knots: decode_sog(sog),
            position_accuracy,
            longitude: decode_lon(lon),
            latitude: decode_lat(lat),
            cog_degrees: decode_cog(cog),
            heading_degrees: decode_heading(heading),
            utc_second: decode_second(second),
            cs_unit,
            has_display,
            has_dsc,
            whole_band,
            accepts_msg22,
            assigned,
            raim,
            radio_status,
        })
    }
}

/// Extended Class B position report (type 19)
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedClassBReport {
    /// Speed over ground (knots); `None` when not available
    pub sog_knots: Option<f32>,

    /// High (true) or low (false) position accuracy
    pub position_accuracy: bool,

    /// Longitude (degrees); `None` when not available
    pub longitude: Option<f64>,

    /// Latitude (degrees); `None` when not available
    pub latitude: Option<f64>,

    /// Course over ground (degrees); `None` when not available
    pub cog_degrees: Option<f32>,

    /// True heading (degrees); `None` when not available
    pub heading_degrees: Option<u16>,

    /// UTC second of the position fix; `None` when not available
    pub utc_second: Option<u8>,

    /// Vessel name
    pub name: String,

    /// Ship and cargo type
    pub ship_type: ShipType,

    /// Vessel dimensions
    pub dimensions: Dimensions,

    /// Position fixing device type
    pub epfd: EpfdType,

    /// RAIM flag
    pub raim: bool,

    /// Data terminal ready
    pub dte_ready: bool,

    /// Station operating in assigned mode
    pub assigned: bool,
}

impl ExtendedClassBReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        rd.skip(8)?; // regional reserved
        let sog = rd.u16(10)?;
        let position_accuracy = rd.flag()?;
        let lon = rd.i32(28)?;
        let lat = rd.i32(27)?;
        let cog = rd.u16(12)?;
        let heading = rd.u16(9)?;
        let second = rd.u8(6)?;
        rd.skip(4)?; // regional reserved
        let name = rd.sixbit_string(20)?;
        let ship_type = ShipType(rd.u8(8)?);
        let dimensions = Dimensions::decode(rd)?;
        let epfd = EpfdType::from_raw(rd.u8(4)?);
        let raim = rd.flag()?;
        let dte = rd.flag()?;
        let assigned = rd.flag()?;

        Ok(Self {
            sog_knots: decode_sog(sog),
            position_accuracy,
            longitude: decode_lon(lon),
            latitude: decode_lat(lat),
            cog_degrees: decode_cog(cog),
            heading_degrees: decode_heading(heading),
            utc_second: decode_second(second),
            name,
            ship_type,
            dimensions,
            epfd,
            raim,
            dte_ready: !dte,
            assigned,
        })
    }
}

/// Aid-to-navigation report (type 21)
#[derive(Clone, Debug, PartialEq)]
pub struct AidToNavigationReport {
    /// Aid type
    pub aton_type: AtonType,

    /// Name of the aid, including any name extension
    pub name: String,

    /// High (true) or low (false) position accuracy
    pub position_accuracy: bool,

    /// Longitude (degrees); `None` when not available
    pub longitude: Option<f64>,

    /// Latitude (degrees); `None` when not available
    pub latitude: Option<f64>,

    /// Aid dimensions
    pub dimensions: Dimensions,

    /// Position fixing device type
    pub epfd: EpfdType,

    /// UTC second of the position fix; `None` when not available
    pub utc_second: Option<u8>,

    /// Aid is off its charted position
    pub off_position: bool,

    /// Regional reserved bits
    pub regional: u8,

    /// RAIM flag
    pub raim: bool,

    /// Virtual (true) vs physical (false) aid
    pub virtual_aid: bool,

    /// Station operating in assigned mode
    pub assigned: bool,
}

impl AidToNavigationReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        let aton_type = AtonType(rd.u8(5)?);
        let mut name = rd.sixbit_string(20)?;
        let position_accuracy = rd.flag()?;
        let lon = rd.i32(28)?;
        let lat = rd.i32(27)?;
        let dimensions = Dimensions::decode(rd)?;
        let epfd = EpfdType::from_raw(rd.u8(4)?);
        let second = rd.u8(6)?;
        let off_position = rd.flag()?;
        let regional = rd.u8(8)?;
        let raim = rd.flag()?;
        let virtual_aid = rd.flag()?;
        let assigned = rd.flag()?;
        rd.skip(1)?; // spare

        // optional name extension, in whole six-bit characters
        let extension_chars = rd.remaining() / 6;
        if extension_chars > 0 {
            name.push_str(&rd.sixbit_string(extension_chars)?);
        }

        Ok(Self {
            aton_type,
            name,
            position_accuracy,
            longitude: decode_lon(lon),
            latitude: decode_lat(lat),
            dimensions,
            epfd,
            utc_second: decode_second(second),
            off_position,
            regional,
            raim,
            virtual_aid,
            assigned,
        })
    }
}

/// Static data report (type 24)
///
/// Class B stations transmit their static data split across two
/// parts, selected by a part number field.
#[derive(Clone, Debug, PartialEq)]
pub enum StaticDataReport {
    /// Part A: vessel name
    PartA {
        /// Vessel name
        name: String,
    },

    /// Part B: type, identity, and dimensions
    PartB {
        /// Ship and cargo type
        ship_type: ShipType,

        /// Vendor id, free text
        vendor_id: String,

        /// Radio call sign
        callsign: String,

        /// Vessel dimensions
        dimensions: Dimensions,
    },
}

impl StaticDataReport {
    fn decode(rd: &mut BitReader<'_>) -> Result<Self, MessageDecodeErr> {
        let part = rd.u8(2)?;
        if part == 0 {
            Ok(Self::PartA {
                name: rd.sixbit_string(20)?,
            })
        } else {
            let ship_type = ShipType(rd.u8(8)?);
            let vendor_id = rd.sixbit_string(7)?;
            let callsign = rd.sixbit_string(7)?;
            let dimensions = Dimensions::decode(rd)?;
            Ok(Self::PartB {
                ship_type,
                vendor_id,
                callsign,
                dimensions,
            })
        }
    }
}

fn decode_sog(raw: u16) -> Option<f32> {
    (raw != SOG_UNAVAILABLE).then(|| raw as f32 / 10.0)
}

fn decode_cog(raw: u16) -> Option<f32> {
    (raw != COG_UNAVAILABLE).then(|| raw as f32 / 10.0)
}

fn decode_heading(raw: u16) -> Option<u16> {
    (raw != HEADING_UNAVAILABLE).then_some(raw)
}

fn decode_second(raw: u8) -> Option<u8> {
    (raw < UTC_SECOND_UNAVAILABLE).then_some(raw)
}

// Positions are transmitted in units of 1/10000 of a minute of arc
fn decode_lon(raw: i32) -> Option<f64> {
    (raw != LON_UNAVAILABLE).then(|| raw as f64 / 600_000.0)
}

fn decode_lat(raw: i32) -> Option<f64> {
    (raw != LAT_UNAVAILABLE).then(|| raw as f64 / 600_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::block::CandidateFrame;
    use crate::counters::Counters;
    use crate::receiver::crc;
    use crate::waveform::BitWriter;

    // validate a synthesized payload into a frame
    fn validated(payload: FramePayload) -> ValidatedFrame {
        let fcs = crc::checksum(&payload);
        crc::validate(
            CandidateFrame {
                payload,
                fcs,
                channel: ChannelId::A,
                variant: DemodVariant::Discriminator,
                received_at: Utc::now(),
            },
            &Counters::new(),
        )
        .expect("checksum mismatch")
    }

    // type 1 position report with the given position and motion fields
    fn position_payload(mmsi: u32, lon: i32, lat: i32, sog: u16, cog: u16) -> FramePayload {
        let mut w = BitWriter::new();
        w.push(1, 6) // type
            .push(0, 2) // repeat
            .push(mmsi, 30)
            .push(0, 4) // under way using engine
            .push_i32(ROT_UNAVAILABLE as i32, 8)
            .push(sog as u32, 10)
            .push(1, 1) // high accuracy
            .push_i32(lon, 28)
            .push_i32(lat, 27)
            .push(cog as u32, 12)
            .push(HEADING_UNAVAILABLE as u32, 9)
            .push(33, 6) // UTC second
            .push(0, 2) // maneuver
            .push(0, 3) // spare
            .push(1, 1) // raim
            .push(0x1af25, 19);
        w.finish()
    }

    #[test]
    fn test_position_report_concrete() {
        // 37.8199°N 122.4783°W, speed not available, course 90.0°
        let lat = (37.8199f64 * 600_000.0).round() as i32;
        let lon = (-122.4783f64 * 600_000.0).round() as i32;
        let payload = position_payload(123456789, lon, lat, SOG_UNAVAILABLE, 900);
        let msg = AisMessage::decode(&validated(payload)).unwrap();

        assert_eq!(1, msg.msg_type());
        assert_eq!(123456789, msg.mmsi());
        assert_eq!(ChannelId::A, msg.channel());

        let report = match msg.body() {
            MessageBody::Position(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!(NavigationStatus::UnderWayEngine, report.status);
        assert_eq!(None, report.sog_knots);
        assert_eq!(None, report.rate_of_turn());
        assert_eq!(None, report.heading_degrees);
        assert_eq!(Some(90.0), report.cog_degrees);
        assert_eq!(Some(33), report.utc_second);
        assert!(report.raim);
        assert_eq!(0x1af25, report.radio_status);

        let precision = 1.0 / 600_000.0;
        assert!((report.latitude.unwrap() - 37.8199).abs() < precision);
        assert!((report.longitude.unwrap() + 122.4783).abs() < precision);
    }

    #[test]
    fn test_position_sentinels_not_zero() {
        let payload = position_payload(1, LON_UNAVAILABLE, LAT_UNAVAILABLE, 0, 0);
        let msg = AisMessage::decode(&validated(payload)).unwrap();
        let report = match msg.body() {
            MessageBody::Position(report) => report,
            other => panic!("wrong body: {:?}", other),
        };

        // unavailable position is None, while a true zero survives
        assert_eq!(None, report.longitude);
        assert_eq!(None, report.latitude);
        assert_eq!(Some(0.0), report.sog_knots);
        assert_eq!(Some(0.0), report.cog_degrees);
    }

    #[test]
    fn test_rate_of_turn_scaling() {
        let mut payload = position_payload(1, 0, 0, 0, 0);
        // patch in a raw ROT of +38: (38/4.733)^2 ≈ 64.5 deg/min
        let mut w = BitWriter::new();
        for i in 0..payload.len_bits() {
            let bit = if (42..50).contains(&i) {
                (38u8 >> (49 - i)) & 1 == 1
            } else {
                payload.bit(i)
            };
            w.push(bit as u32, 1);
        }
        payload = w.finish();

        let msg = AisMessage::decode(&validated(payload)).unwrap();
        let report = match msg.body() {
            MessageBody::Position(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        let rot = report.rate_of_turn().unwrap();
        assert!((rot - 64.5).abs() < 0.5, "rot {}", rot);
    }

    #[test]
    fn test_base_station_report() {
        let mut w = BitWriter::new();
        w.push(4, 6)
            .push(0, 2)
            .push(3669702, 30)
            .push(2024, 14)
            .push(7, 4)
            .push(19, 5)
            .push(12, 5)
            .push(30, 6)
            .push(59, 6)
            .push(1, 1)
            .push_i32(-73_486_980, 28)
            .push_i32(22_691_940, 27)
            .push(7, 4) // surveyed
            .push(0, 10)
            .push(0, 1)
            .push(0, 19);
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        let report = match msg.body() {
            MessageBody::BaseStation(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!(Some(2024), report.year);
        assert_eq!(Some(7), report.month);
        assert_eq!(Some(19), report.day);
        assert_eq!(Some(12), report.hour);
        assert_eq!(Some(30), report.minute);
        assert_eq!(Some(59), report.second);
        assert_eq!(EpfdType::Surveyed, report.epfd);
    }

    #[test]
    fn test_static_and_voyage() {
        let mut w = BitWriter::new();
        w.push(5, 6)
            .push(0, 2)
            .push(366123456, 30)
            .push(1, 2) // ais version
            .push(9074729, 30) // imo
            .push_sixbit_str("WDE4178", 7)
            .push_sixbit_str("EVER GIVEN", 20)
            .push(70, 8) // cargo
            .push(200, 9)
            .push(200, 9)
            .push(29, 6)
            .push(30, 6)
            .push(1, 4) // gps
            .push(3, 4)
            .push(23, 5)
            .push(14, 5)
            .push(30, 6)
            .push(156, 8) // draught 15.6 m
            .push_sixbit_str("ROTTERDAM", 20)
            .push(0, 1) // dte ready
            .push(0, 1);
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        assert_eq!(5, msg.msg_type());
        let sv = match msg.body() {
            MessageBody::StaticAndVoyage(sv) => sv,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!(Some(9074729), sv.imo);
        assert_eq!("WDE4178", sv.callsign);
        assert_eq!("EVER GIVEN", sv.name);
        assert_eq!("cargo", sv.ship_type.category());
        assert_eq!(400, sv.dimensions.to_bow as u32 + sv.dimensions.to_stern as u32);
        assert_eq!(Some(3), sv.eta_month);
        assert_eq!(Some(15.6), sv.draught);
        assert_eq!("ROTTERDAM", sv.destination);
        assert!(sv.dte_ready);
    }

    #[test]
    fn test_class_b_reports() {
        let mut w = BitWriter::new();
        w.push(18, 6)
            .push(0, 2)
            .push(338123456, 30)
            .push(0, 8)
            .push(57, 10) // 5.7 kt
            .push(0, 1)
            .push_i32(0, 28)
            .push_i32(0, 27)
            .push(COG_UNAVAILABLE as u32, 12)
            .push(90, 9)
            .push(UTC_SECOND_UNAVAILABLE as u32, 6)
            .push(0, 2)
            .push(1, 1) // cs unit
            .push(0, 1)
            .push(1, 1)
            .push(1, 1)
            .push(0, 1)
            .push(0, 1)
            .push(0, 1)
            .push(0, 20);
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        let report = match msg.body() {
            MessageBody::StandardClassB(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!(Some(5.7), report.sog_knots);
        assert_eq!(None, report.cog_degrees);
        assert_eq!(Some(90), report.heading_degrees);
        assert_eq!(None, report.utc_second);
        assert!(report.cs_unit);
        assert!(!report.has_display);
    }

    #[test]
    fn test_extended_class_b_report() {
        let mut w = BitWriter::new();
        w.push(19, 6)
            .push(0, 2)
            .push(367000123, 30)
            .push(0, 8)
            .push(102, 10) // 10.2 kt
            .push(0, 1)
            .push_i32(0, 28)
            .push_i32(0, 27)
            .push(455, 12)
            .push(44, 9)
            .push(21, 6)
            .push(0, 4);
        w.push_sixbit_str("MISS BEHAVIN", 20);
        w.push(37, 8); // pleasure craft
        w.push(8, 9).push(4, 9).push(2, 6).push(2, 6);
        w.push(1, 4) // gps
            .push(0, 1)
            .push(1, 1) // dte not ready
            .push(0, 1)
            .push(0, 4); // spare
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        let report = match msg.body() {
            MessageBody::ExtendedClassB(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!(Some(10.2), report.sog_knots);
        assert_eq!(Some(45.5), report.cog_degrees);
        assert_eq!(Some(44), report.heading_degrees);
        assert_eq!("MISS BEHAVIN", report.name);
        assert_eq!("pleasure craft", report.ship_type.category());
        assert_eq!(EpfdType::Gps, report.epfd);
        assert!(!report.dte_ready);
    }

    #[test]
    fn test_aid_to_navigation_with_name_extension() {
        let lat = (40.7030f64 * 600_000.0).round() as i32;
        let lon = (-74.0160f64 * 600_000.0).round() as i32;

        let mut w = BitWriter::new();
        w.push(21, 6).push(0, 2).push(993672085, 30);
        w.push(30, 5); // special mark
        w.push_sixbit_str("AMBROSE CHANNEL", 20);
        w.push(1, 1)
            .push_i32(lon, 28)
            .push_i32(lat, 27)
            .push(0, 9)
            .push(0, 9)
            .push(0, 6)
            .push(0, 6)
            .push(7, 4) // surveyed
            .push(UTC_SECOND_UNAVAILABLE as u32, 6)
            .push(0, 1)
            .push(0, 8)
            .push(1, 1)
            .push(1, 1) // virtual aid
            .push(0, 1)
            .push(0, 1); // spare
        w.push_sixbit_str(" BY 7", 8); // name extension, `@`-padded
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        let report = match msg.body() {
            MessageBody::AidToNavigation(report) => report,
            other => panic!("wrong body: {:?}", other),
        };
        assert_eq!("special mark", report.aton_type.name());
        assert_eq!("AMBROSE CHANNEL BY 7", report.name);
        assert_eq!(None, report.utc_second);
        assert!(report.virtual_aid);
        assert!(!report.off_position);

        let precision = 1.0 / 600_000.0;
        assert!((report.latitude.unwrap() - 40.7030).abs() < precision);
        assert!((report.longitude.unwrap() + 74.0160).abs() < precision);
    }

    #[test]
    fn test_static_data_report_parts() {
        let mut w = BitWriter::new();
        w.push(24, 6).push(0, 2).push(111, 30).push(0, 2);
        w.push_sixbit_str("SALTY DOG", 20);
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();
        match msg.body() {
            MessageBody::StaticData(StaticDataReport::PartA { name }) => {
                assert_eq!("SALTY DOG", name);
            }
            other => panic!("wrong body: {:?}", other),
        }

        let mut w = BitWriter::new();
        w.push(24, 6).push(0, 2).push(111, 30).push(1, 2);
        w.push(36, 8); // sailing
        w.push_sixbit_str("GARMIN", 7);
        w.push_sixbit_str("WDX9871", 7);
        w.push(5, 9).push(5, 9).push(2, 6).push(2, 6);
        w.push(0, 6); // spare
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();
        match msg.body() {
            MessageBody::StaticData(StaticDataReport::PartB {
                ship_type,
                vendor_id,
                callsign,
                ..
            }) => {
                assert_eq!("sailing", ship_type.category());
                assert_eq!("GARMIN", vendor_id);
                assert_eq!("WDX9871", callsign);
            }
            other => panic!("wrong body: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_unparsed() {
        let mut w = BitWriter::new();
        w.push(9, 6).push(0, 2).push(999, 30).push(0xdead, 16);
        let msg = AisMessage::decode(&validated(w.finish())).unwrap();

        assert_eq!(9, msg.msg_type());
        assert_eq!(999, msg.mmsi());
        assert_eq!(MessageBody::Unparsed, *msg.body());
        assert_eq!(54, msg.payload().len_bits());
    }

    #[test]
    fn test_truncated_message_is_an_error() {
        // declares type 1 but carries only the envelope fields
        let mut w = BitWriter::new();
        w.push(1, 6).push(0, 2).push(123, 30).push(0, 10);
        assert!(matches!(
            AisMessage::decode(&validated(w.finish())),
            Err(MessageDecodeErr::Truncated { .. })
        ));
    }

    #[test]
    fn test_fingerprint_ignores_receive_path() {
        let lat = 22_691_940;
        let payload = position_payload(123456789, 0, lat, 0, 0);
        let fcs = crc::checksum(&payload);
        let counters = Counters::new();

        let on_a = crc::validate(
            CandidateFrame {
                payload: payload.clone(),
                fcs,
                channel: ChannelId::A,
                variant: DemodVariant::Discriminator,
                received_at: Utc::now(),
            },
            &counters,
        )
        .unwrap();
        let on_b = crc::validate(
            CandidateFrame {
                payload: payload.clone(),
                fcs,
                channel: ChannelId::B,
                variant: DemodVariant::Coherent,
                received_at: Utc::now(),
            },
            &counters,
        )
        .unwrap();

        let msg_a = AisMessage::decode(&on_a).unwrap();
        let msg_b = AisMessage::decode(&on_b).unwrap();
        assert_eq!(msg_a.fingerprint(), msg_b.fingerprint());

        // and differing content fingerprints differently
        let other = position_payload(123456789, 0, lat + 600, 0, 0);
        let msg_c = AisMessage::decode(&validated(other)).unwrap();
        assert_ne!(msg_a.fingerprint(), msg_c.fingerprint());
    }
}
