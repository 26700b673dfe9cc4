//! # aisrx: AIS Demodulation and Decoding
//!
//! This crate provides a digital receiver for the maritime
//! [Automatic Identification System](https://en.wikipedia.org/wiki/Automatic_identification_system)
//! (AIS). It turns a stream of complex IQ samples captured around
//! 162 MHz into validated, typed AIS traffic messages and fans them
//! out to registered sinks.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate has not been certified for navigation or for any other
//! purpose. The author **strongly discourages** its use in any
//! safety-critical applications. AIS reception is inherently
//! best-effort: transmissions collide, fade, and arrive corrupted.
//!
//! ## Example
//!
//! You will need complex baseband samples covering both AIS channels,
//! such as an SDR capture centered at 162.000 MHz. Obtaining the
//! samples is beyond the scope of this crate; any rate that is an
//! integer multiple of 96 kHz will do.
//!
//! ```
//! use aisrx::{AisMessage, DeliverStatus, PipelineBuilder, Sink, SinkPolicy};
//!
//! struct Printer;
//!
//! impl Sink for Printer {
//!     fn deliver(&mut self, message: &AisMessage) -> DeliverStatus {
//!         println!("{}", message);
//!         DeliverStatus::Accepted
//!     }
//! }
//!
//! let mut pipeline = PipelineBuilder::new(768_000)
//!     .with_dedup_window(std::time::Duration::from_secs(5))
//!     .build()
//!     .expect("valid configuration");
//!
//! pipeline.register_sink(
//!     "printer",
//!     Printer,
//!     SinkPolicy::QueueDropOldest { capacity: 64 },
//! );
//! pipeline.start();
//!
//! // feed() accepts capture blocks from your sample source; an
//! // empty run still shuts down cleanly
//! let totals = pipeline.shutdown();
//! assert_eq!(0, totals.frames_attempted);
//! ```
//!
//! The pipeline runs one demodulation chain per (channel ×
//! demodulator variant) combination, all concurrently. Running
//! several variants trades CPU for robustness against fading and
//! multipath: a transmission recovered by *any* variant on *any*
//! channel is delivered exactly once, with the duplicate receptions
//! suppressed by a sliding-window deduplicator.
//!
//! Sinks receive fully-typed [`AisMessage`] values (position
//! reports, static and voyage data, base station reports, and the
//! other defined types) with "not available" field codes preserved
//! as explicit `None` values. Serialization (for example to NMEA 0183
//! `!AIVDM` sentences) is the sink's concern; the raw frame payload
//! and the armoring helpers in this crate are available for it.
//!
//! For lower-level use, [`Receiver`] exposes a single-threaded
//! signal-to-message chain for one channel, and the pipeline's
//! building blocks ([`Channelizer`], [`DedupWindow`],
//! [`Distributor`]) are public.
//!
//! ## Observability
//!
//! The pipeline keeps process-wide [`Counters`]: frames attempted,
//! check sequence failures, decode failures, duplicates suppressed,
//! per-sink drops, and synchronizer lock transitions. Sustained
//! elevated failure counters are the only externally visible symptom
//! of poor RF quality or overload; malformed input is never an error.

#![allow(dead_code)]

mod block;
mod builder;
mod conditioner;
mod counters;
mod dedup;
mod distributor;
mod filter;
mod message;
mod pipeline;
mod receiver;
mod waveform;

pub use block::{
    CandidateFrame, ChannelId, DemodVariant, FramePayload, SampleBlock, SymbolStream,
    ValidatedFrame, MAX_PAYLOAD_BITS,
};
pub use builder::{ChannelConfig, ConfigError, PipelineBuilder, TimingConfig};
pub use conditioner::Channelizer;
pub use counters::{Counters, CountersSnapshot};
pub use dedup::DedupWindow;
pub use distributor::{DeliverStatus, Distributor, Sink, SinkPolicy};
pub use message::{
    codes, AidToNavigationReport, AisMessage, BaseStationReport, BitReader, Dimensions,
    ExtendedClassBReport, MessageBody, MessageDecodeErr, PositionReport, StandardClassBReport,
    StaticAndVoyage, StaticDataReport, COG_UNAVAILABLE, DRAUGHT_UNAVAILABLE, HEADING_UNAVAILABLE,
    LAT_UNAVAILABLE, LON_UNAVAILABLE, ROT_UNAVAILABLE, SOG_UNAVAILABLE, UTC_SECOND_UNAVAILABLE,
};
pub use pipeline::{Pipeline, PipelineError};
pub use receiver::symsync::SyncState;
pub use receiver::Receiver;
pub use waveform::{
    armor_payload, channel_offset_hz, dearmor_char, samples_per_symbol, BAUD_HZ, CHANNEL_A_HZ,
    CHANNEL_B_HZ, DEFAULT_CENTER_HZ, GMSK_BT, WORKING_RATE,
};
