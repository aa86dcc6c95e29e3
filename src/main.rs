//! # wifi-doctor
//!
//! Single-pass 802.11 capture analyser.
//!
//! Reads a Radiotap pcap/pcapng capture and derives live network-quality
//! indicators:
//!
//! - **Channel density**: access points per channel weighted by their
//!   strongest RSSI, normalised by channel width.
//! - **Performance monitor**: average / max / min data rate, loss (retry)
//!   rate and throughput of data frames.
//! - **Performance analysis**: network and channel configuration grades
//!   from PHY, bandwidth, guard interval, MCS and signal thresholds, plus the
//!   PHY gap between the MCS the signal allows and the MCS in use.
//!
//! Every `--stride` processed frames a time-series sample and a report are
//! emitted; a final report is always printed at the end of the run.
//!
//! ## Examples
//!
//! ```text
//! cargo run -- --filename capture.pcapng
//! cargo run -- -f capture.pcap --src 10:7c:61:df:7a:d2 --dst aa:bb:cc:dd:ee:ff --limit 5000
//! cargo run -- -f capture.pcap --samples samples.jsonl --quiet
//! ```

mod analysis;
mod capture;
mod density;
mod error;
mod frame;
mod monitor;
mod parser;
mod phy;
mod pipeline;
mod report;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

use crate::capture::PcapFileSource;
use crate::frame::MacAddr;
use crate::monitor::AddressFilter;
use crate::pipeline::{FrameLimit, Pipeline, RunConfig};
use crate::report::{ConsoleSink, JsonLinesSink, ReportSink};

#[derive(Parser)]
#[command(name = "wifi-doctor")]
#[command(version, about = "802.11 capture analyser: channel density, throughput and link quality")]
struct Cli {
    /// Path to the pcap/pcapng capture (Radiotap + 802.11).
    #[arg(short, long)]
    filename: PathBuf,

    /// Only count frames transmitted by this address.
    #[arg(short, long)]
    src: Option<MacAddr>,

    /// Only count frames received by this address.
    #[arg(short, long)]
    dst: Option<MacAddr>,

    /// Maximum number of frames to read (negative for no limit).
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    limit: i64,

    /// Processed frames between samples / interim reports.
    #[arg(short = 'e', long, default_value = "5")]
    stride: NonZeroUsize,

    /// Write every time-series sample as a JSON line to this file.
    #[arg(short = 'o', long)]
    samples: Option<PathBuf>,

    /// Only print the final report.
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    // ── Ctrl-C handler ──────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            log::info!("Interrupt received, finishing the current frame");
            running.store(false, Ordering::Relaxed);
        })
        .expect("Failed to set Ctrl-C handler");
    }

    if let Err(e) = run(cli, &running) {
        log::error!("{e}");
        std::process::exit(1);
    }
    log::info!("Done.");
}

fn run(cli: Cli, running: &AtomicBool) -> error::Result<()> {
    let config = RunConfig {
        limit: FrameLimit::from_arg(cli.limit),
        filter: AddressFilter {
            source: cli.src,
            destination: cli.dst,
        },
        stride: cli.stride,
    };

    let mut source = PcapFileSource::open(&cli.filename)?;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleSink { quiet: cli.quiet })];
    if let Some(path) = &cli.samples {
        sinks.push(Box::new(JsonLinesSink::create(path)?));
        log::info!("Writing samples to {}", path.display());
    }

    let limit = match config.limit {
        FrameLimit::Unlimited => "no limit".to_string(),
        FrameLimit::Frames(n) => format!("limit {n} frames"),
    };
    println!(
        "\n{}",
        format!("  Analysing {} ({limit})", cli.filename.display()).bold()
    );
    match (cli.src, cli.dst) {
        (Some(src), Some(dst)) => println!("  Throughput between {src} and {dst}"),
        (Some(src), None) => println!("  Frames from {src}"),
        (None, Some(dst)) => println!("  Frames to {dst}"),
        (None, None) => {}
    }

    Pipeline::new(config).run(&mut source, &mut sinks, running)?;
    Ok(())
}
