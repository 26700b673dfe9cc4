//! Main processing loop
//!
//! Reads IQ capture blocks from the input source, feeds them to the
//! pipeline, and reports the counter totals when the source runs dry.

use std::io;
use std::time::Duration;

use anyhow::Context;
use byteorder::{NativeEndian, ReadBytesExt};
use log::info;
use num_complex::Complex;

use aisrx::{Pipeline, SampleBlock, SinkPolicy};

use crate::cli::{Args, SampleFormat};
use crate::sinks::{NmeaSink, UdpSink};

// Samples per capture block handed to the pipeline
const BLOCK_SAMPLES: usize = 65_536;

/// Run the decoder until the input is exhausted
///
/// Registers the configured sinks, starts the pipeline, and streams
/// capture blocks into it. Returns once everything accepted from the
/// input has been decoded and delivered.
pub fn run<R>(args: &Args, mut pipeline: Pipeline, input: &mut R) -> Result<(), anyhow::Error>
where
    R: io::Read,
{
    if !args.quiet {
        pipeline.register_sink(
            "nmea",
            NmeaSink::new(args.timestamps),
            SinkPolicy::QueueDropOldest { capacity: 256 },
        );
    }
    if let Some(target) = &args.udp {
        let sink = UdpSink::connect(target)
            .with_context(|| format!("unable to open --udp \"{}\"", target))?;
        pipeline.register_sink(
            "udp",
            sink,
            SinkPolicy::BlockWithTimeout {
                capacity: 256,
                timeout: Duration::from_millis(100),
            },
        );
    }
    pipeline.start();

    let mut sequence = 0u64;
    loop {
        let samples = read_block(input, args.format).context("error reading input samples")?;
        if samples.is_empty() {
            break;
        }
        let block = SampleBlock::composite(sequence, args.rate, samples);
        sequence += 1;
        if pipeline.feed(block).is_err() {
            break;
        }
    }

    info!("input exhausted after {} blocks; draining", sequence);
    let sink_drops = pipeline.sink_drops();
    let totals = pipeline.shutdown();
    info!("{}", totals);
    for (name, drops) in sink_drops {
        if drops > 0 {
            info!("sink {}: {} messages dropped", name, drops);
        }
    }

    Ok(())
}

// Read up to one block of interleaved IQ pairs
//
// A short read at end of input yields a short (or empty) block; any
// other I/O failure is structural and propagates.
fn read_block<R>(input: &mut R, format: SampleFormat) -> io::Result<Vec<Complex<f32>>>
where
    R: io::Read,
{
    let mut out = Vec::with_capacity(BLOCK_SAMPLES);
    while out.len() < BLOCK_SAMPLES {
        match next_sample(input, format)? {
            Some(sample) => out.push(sample),
            None => break,
        }
    }
    Ok(out)
}

// Read one complex sample, or None at end of input
fn next_sample<R>(input: &mut R, format: SampleFormat) -> io::Result<Option<Complex<f32>>>
where
    R: io::Read,
{
    fn eof_ok<T>(result: io::Result<T>) -> io::Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err),
        }
    }

    let sample = match format {
        SampleFormat::Cu8 => {
            let Some(i) = eof_ok(input.read_u8())? else {
                return Ok(None);
            };
            let Some(q) = eof_ok(input.read_u8())? else {
                return Ok(None);
            };
            Complex::new((i as f32 - 127.5) / 127.5, (q as f32 - 127.5) / 127.5)
        }
        SampleFormat::Cs16 => {
            let Some(i) = eof_ok(input.read_i16::<NativeEndian>())? else {
                return Ok(None);
            };
            let Some(q) = eof_ok(input.read_i16::<NativeEndian>())? else {
                return Ok(None);
            };
            Complex::new(i as f32 / 32_768.0, q as f32 / 32_768.0)
        }
        SampleFormat::Cf32 => {
            let Some(i) = eof_ok(input.read_f32::<NativeEndian>())? else {
                return Ok(None);
            };
            let Some(q) = eof_ok(input.read_f32::<NativeEndian>())? else {
                return Ok(None);
            };
            Complex::new(i, q)
        }
    };
    Ok(Some(sample))
}
