//! Enumerated field codes
//!
//! Code tables from the AIS message catalog: navigational status,
//! position-fix (EPFD) types, ship and cargo types, and aid-to-
//! navigation types. Raw values outside the defined tables are
//! preserved rather than rejected; an unknown code never invalidates
//! a message.

use strum_macros::{Display, FromRepr};

/// Navigational status from position reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum NavigationStatus {
    #[strum(serialize = "under way using engine")]
    UnderWayEngine = 0,
    #[strum(serialize = "at anchor")]
    AtAnchor = 1,
    #[strum(serialize = "not under command")]
    NotUnderCommand = 2,
    #[strum(serialize = "restricted maneuverability")]
    RestrictedManeuverability = 3,
    #[strum(serialize = "constrained by her draught")]
    ConstrainedByDraught = 4,
    #[strum(serialize = "moored")]
    Moored = 5,
    #[strum(serialize = "aground")]
    Aground = 6,
    #[strum(serialize = "engaged in fishing")]
    Fishing = 7,
    #[strum(serialize = "under way sailing")]
    UnderWaySailing = 8,
    #[strum(serialize = "reserved (HSC)")]
    ReservedHsc = 9,
    #[strum(serialize = "reserved (WIG)")]
    ReservedWig = 10,
    #[strum(serialize = "power-driven vessel towing astern")]
    TowingAstern = 11,
    #[strum(serialize = "power-driven vessel pushing ahead")]
    PushingAhead = 12,
    #[strum(serialize = "reserved")]
    Reserved13 = 13,
    #[strum(serialize = "AIS-SART active")]
    AisSart = 14,
    #[strum(serialize = "undefined")]
    Undefined = 15,
}

impl NavigationStatus {
    /// Decode a four-bit status field
    pub fn from_raw(raw: u8) -> Self {
        Self::from_repr(raw & 0x0f).unwrap_or(Self::Undefined)
    }
}

/// Electronic position fixing device type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum EpfdType {
    #[strum(serialize = "undefined")]
    Undefined = 0,
    #[strum(serialize = "GPS")]
    Gps = 1,
    #[strum(serialize = "GLONASS")]
    Glonass = 2,
    #[strum(serialize = "combined GPS/GLONASS")]
    CombinedGpsGlonass = 3,
    #[strum(serialize = "Loran-C")]
    LoranC = 4,
    #[strum(serialize = "Chayka")]
    Chayka = 5,
    #[strum(serialize = "integrated navigation system")]
    IntegratedNavigation = 6,
    #[strum(serialize = "surveyed")]
    Surveyed = 7,
    #[strum(serialize = "Galileo")]
    Galileo = 8,
    #[strum(serialize = "internal GNSS")]
    InternalGnss = 15,
}

impl EpfdType {
    /// Decode a four-bit EPFD field
    ///
    /// Codes 9 through 14 are reserved and map to `Undefined`.
    pub fn from_raw(raw: u8) -> Self {
        Self::from_repr(raw & 0x0f).unwrap_or(Self::Undefined)
    }
}

/// Ship and cargo type
///
/// A two-digit code: the tens digit selects the vessel category and,
/// for some categories, the units digit carries a hazard class. The
/// raw code is kept so sinks can reproduce it exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShipType(pub u8);

impl ShipType {
    /// Human-readable category
    pub fn category(&self) -> &'static str {
        match self.0 {
            0 => "not available",
            20..=29 => "wing in ground",
            30 => "fishing",
            31 | 32 => "towing",
            33 => "dredging or underwater ops",
            34 => "diving ops",
            35 => "military ops",
            36 => "sailing",
            37 => "pleasure craft",
            40..=49 => "high speed craft",
            50 => "pilot vessel",
            51 => "search and rescue vessel",
            52 => "tug",
            53 => "port tender",
            54 => "anti-pollution equipment",
            55 => "law enforcement",
            58 => "medical transport",
            60..=69 => "passenger",
            70..=79 => "cargo",
            80..=89 => "tanker",
            90..=99 => "other",
            _ => "reserved",
        }
    }

    /// True if the type field carries the "not available" code
    pub fn is_available(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ShipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.category(), self.0)
    }
}

/// Aid-to-navigation type from type 21 reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AtonType(pub u8);

impl AtonType {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "not specified",
            1 => "reference point",
            2 => "RACON",
            3 => "fixed offshore structure",
            4 => "emergency wreck marking buoy",
            5 => "light, without sectors",
            6 => "light, with sectors",
            7 => "leading light front",
            8 => "leading light rear",
            9 => "beacon, cardinal N",
            10 => "beacon, cardinal E",
            11 => "beacon, cardinal S",
            12 => "beacon, cardinal W",
            13 => "beacon, port hand",
            14 => "beacon, starboard hand",
            15 => "beacon, preferred channel port hand",
            16 => "beacon, preferred channel starboard hand",
            17 => "beacon, isolated danger",
            18 => "beacon, safe water",
            19 => "beacon, special mark",
            20 => "cardinal mark N",
            21 => "cardinal mark E",
            22 => "cardinal mark S",
            23 => "cardinal mark W",
            24 => "port hand mark",
            25 => "starboard hand mark",
            26 => "preferred channel port hand",
            27 => "preferred channel starboard hand",
            28 => "isolated danger",
            29 => "safe water",
            30 => "special mark",
            31 => "light vessel / LANBY / rig",
            _ => "reserved",
        }
    }
}

impl std::fmt::Display for AtonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_status() {
        assert_eq!(NavigationStatus::UnderWayEngine, NavigationStatus::from_raw(0));
        assert_eq!(NavigationStatus::Moored, NavigationStatus::from_raw(5));
        assert_eq!(NavigationStatus::Undefined, NavigationStatus::from_raw(15));
        // masked, never panics
        assert_eq!(NavigationStatus::UnderWayEngine, NavigationStatus::from_raw(16));
        assert_eq!("moored", NavigationStatus::Moored.to_string());
    }

    #[test]
    fn test_epfd_reserved_codes() {
        assert_eq!(EpfdType::Gps, EpfdType::from_raw(1));
        assert_eq!(EpfdType::Galileo, EpfdType::from_raw(8));
        for raw in 9..=14 {
            assert_eq!(EpfdType::Undefined, EpfdType::from_raw(raw));
        }
        assert_eq!(EpfdType::InternalGnss, EpfdType::from_raw(15));
    }

    #[test]
    fn test_ship_type_categories() {
        assert_eq!("not available", ShipType(0).category());
        assert!(!ShipType(0).is_available());
        assert_eq!("fishing", ShipType(30).category());
        assert_eq!("cargo", ShipType(70).category());
        assert_eq!("tanker", ShipType(84).category());
        assert_eq!("reserved", ShipType(10).category());
    }

    #[test]
    fn test_aton_names() {
        assert_eq!("not specified", AtonType(0).name());
        assert_eq!("RACON", AtonType(2).name());
        assert_eq!("special mark", AtonType(30).name());
    }
}
