use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use log::{info, LevelFilter};

use aisrx::PipelineBuilder;

mod app;
mod cli;
mod sinks;

use cli::{Args, CliError};

fn main() {
    match aisdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn aisdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // create the pipeline
    let pipeline = PipelineBuilder::new(args.rate)
        .with_center_frequency(args.center)
        .with_channels(&args.channels)
        .with_variants(&args.variants)
        .with_dedup_window(Duration::from_millis(args.dedup_window_ms))
        .with_timing_bandwidth(args.timing_bw_unlocked, args.timing_bw_locked)
        .with_timing_max_deviation(args.timing_max_dev)
        .build()
        .map_err(|err| CliError::from(anyhow::Error::new(err)))?;

    // file setup: locks stdin in case we need it
    let stdin = io::stdin();
    let stdin_handle = stdin.lock();
    let mut inbuf = file_setup(&args, stdin_handle)?;

    // processing: read IQ blocks until the source runs dry
    app::run(&args, pipeline, &mut inbuf)?;

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("aisrx", log_filter)
            .filter_module("aisdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

fn file_setup<'stdin>(
    args: &Args,
    stdin: std::io::StdinLock<'stdin>,
) -> Result<Box<dyn io::BufRead + 'stdin>, anyhow::Error> {
    if args.input_is_stdin() {
        info!("AIS decoder reading standard input");
        if !is_terminal(&std::io::stdin()) {
            Ok(Box::new(io::BufReader::new(stdin)))
        } else {
            Err(anyhow!(
                "cowardly refusing to read IQ samples from a terminal.

Pipe a source of raw complex samples from rtl_sdr or similar into
this program."
            ))
        }
    } else {
        info!("AIS decoder reading file: \"{}\"", &args.file);
        Ok(Box::new(io::BufReader::new(
            std::fs::File::open(&args.file)
                .with_context(|| format!("Unable to open --file \"{}\"", args.file))?,
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::fd::AsRawFd,
{
    terminal_size::terminal_size_using_fd(stream.as_raw_fd()).is_some()
}

#[cfg(target_os = "windows")]
fn is_terminal<S>(stream: &S) -> bool
where
    S: std::os::windows::io::AsRawHandle,
{
    terminal_size::terminal_size_using_handle(stream.as_raw_handle()).is_some()
}
