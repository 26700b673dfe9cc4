use std::fmt::Display;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};

use aisrx::{ChannelId, DemodVariant};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts raw complex IQ samples, at the given sampling --rate and --format, and decodes any AIS transmissions that are present. Decoded messages are printed as NMEA 0183 !AIVDM sentences.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts raw complex IQ samples, at the given sampling --rate and --format, and decodes any AIS transmissions that are present. Decoded messages are printed as NMEA 0183 !AIVDM sentences.

The sampling rate must be an integer multiple of 96000 Hz, and the capture should be centered between the two AIS channels (162.000 MHz). You can pipe in samples from rtl_sdr:

    rtl_sdr -f 162000000 -s 1536000 - \
        | aisdec --rate 1536000 --format cu8

Interleaved I/Q pairs are expected: unsigned 8-bit (cu8), signed 16-bit native-endian (cs16), or 32-bit float (cf32).

Every demodulator variant in --variants runs concurrently on every channel; a transmission recovered by any of them is reported exactly once. Use --udp to stream the same sentences to an NMEA consumer like OpenCPN.
"#;

const ADVANCED: &str = "Advanced Demodulator Options";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even decoded sentences
    #[arg(short, long)]
    pub quiet: bool,

    /// Sampling rate (Hz)
    ///
    /// Set to the rate of your IQ source. Must be an integer multiple
    /// of 96000 Hz.
    #[arg(short, long, default_value_t = 1_536_000)]
    pub rate: u32,

    /// IQ sample format
    #[arg(short, long, value_enum, default_value_t = SampleFormat::Cs16)]
    pub format: SampleFormat,

    /// Input file (or "-" for stdin)
    ///
    /// The input must be interleaved I/Q pairs in --format at --rate.
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// Capture center frequency (Hz)
    #[arg(long, default_value_t = 162_000_000.0)]
    pub center: f64,

    /// Radio channels to receive (comma separated)
    #[arg(long, value_delimiter = ',', default_values_t = vec![ChannelId::A, ChannelId::B])]
    pub channels: Vec<ChannelId>,

    /// Demodulator variants to run (comma separated)
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = vec![
            DemodVariant::Discriminator,
            DemodVariant::Coherent,
            DemodVariant::Challenger,
        ]
    )]
    pub variants: Vec<DemodVariant>,

    /// Duplicate suppression window (milliseconds)
    #[arg(long = "dedup-window", default_value_t = 5000)]
    pub dedup_window_ms: u64,

    /// Also send sentences as UDP datagrams to HOST:PORT
    #[arg(long, value_name = "HOST:PORT")]
    pub udp: Option<String>,

    /// Prefix each sentence with its receive timestamp
    #[arg(long)]
    pub timestamps: bool,

    /// Symbol timing loop bandwidth, searching (fsym)
    #[arg(long, default_value_t = 0.125)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub timing_bw_unlocked: f32,

    /// Symbol timing loop bandwidth, tracking (fsym)
    #[arg(long, default_value_t = 0.05)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub timing_bw_locked: f32,

    /// Symbol timing maximum deviation (fsym)
    #[arg(long, default_value_t = 0.01)]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub timing_max_dev: f32,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }
}

/// Interleaved IQ sample encodings
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit pairs, 127.5 offset (rtl_sdr)
    Cu8,

    /// Signed 16-bit native-endian pairs
    Cs16,

    /// 32-bit float native-endian pairs
    Cf32,
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_channels_and_variants() {
        let args = Args::try_parse_from([
            "aisdec",
            "--rate",
            "768000",
            "--channels",
            "A",
            "--variants",
            "discriminator,coherent",
        ])
        .unwrap();

        assert_eq!(768_000, args.rate);
        assert_eq!(vec![ChannelId::A], args.channels);
        assert_eq!(
            vec![DemodVariant::Discriminator, DemodVariant::Coherent],
            args.variants
        );
        assert!(args.input_is_stdin());
    }
}
