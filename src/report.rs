//! Report text, time-series samples and the sinks that receive them.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::analysis::AnalysisSummary;
use crate::density::ChannelDensity;
use crate::error::SinkError;
use crate::monitor::MonitorStats;

const SEPARATOR_WIDTH: usize = 80;

/// One point of the live time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualizationSample {
    /// Processed-frame count at which the sample was taken.
    pub frame: u64,
    /// Recent-window mean data rate scaled by the loss rate (Mbps).
    pub throughput: f64,
    pub phy: u8,
    pub bandwidth: u8,
    pub short_gi: bool,
    pub signal_dbm: i8,
    pub phy_gap: i32,
}

/// Snapshot of all accumulators, rendered as plain text by `Display`.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub processed: u64,
    pub densities: Vec<ChannelDensity>,
    pub monitor_frames: u64,
    pub monitor: Option<MonitorStats>,
    pub analysis_frames: u64,
    pub analysis: Option<AnalysisSummary>,
    pub elapsed: Duration,
}

/// Whether a report is a periodic tick or the end-of-run flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Interim,
    Final,
}

fn pct(ratio: f64) -> String {
    format!("{:.2} %", ratio * 100.0)
}

impl Report {
    fn write_density(&self, out: &mut String) -> fmt::Result {
        out.push_str("\n\nDensity");
        if self.densities.is_empty() {
            out.push_str("\n|    Density: 0.00");
            out.push_str("\n|    Classification: Not dense channel");
            return Ok(());
        }
        for d in &self.densities {
            match d.frequency_mhz {
                Some(freq) => write!(out, "\n|Channel {freq} MHz")?,
                None => write!(out, "\n|Channel {} (-- MHz)", d.channel)?,
            }
            write!(out, "\n|    Access points: {}", d.access_points)?;
            write!(out, "\n|    Density: {:.2}", d.density)?;
            write!(out, "\n|    Classification: {}", d.classification)?;
        }
        Ok(())
    }

    fn write_monitor(&self, out: &mut String) -> fmt::Result {
        write!(out, "\n\nPerformance Monitor on {} packets:", self.monitor_frames)?;
        match &self.monitor {
            Some(m) => {
                write!(out, "\n|    Avg data rate: {:.2} Mbps", m.avg_rate)?;
                write!(out, "\n|    Max data rate: {:.2} Mbps", m.max_rate)?;
                write!(out, "\n|    Min data rate: {:.2} Mbps", m.min_rate)?;
                write!(out, "\n|    Loss rate: {}", pct(m.loss_rate))?;
                write!(out, "\n|    Throughput: {:.2} Mbps", m.throughput)?;
            }
            None => {
                out.push_str("\n|    Avg data rate: 0.00 Mbps");
                out.push_str("\n|    Max data rate: 0.00 Mbps");
                out.push_str("\n|    Min data rate: 0.00 Mbps");
                out.push_str("\n|    Loss rate: -- %");
                out.push_str("\n|    Throughput: 0.00 Mbps");
            }
        }
        Ok(())
    }

    fn write_analysis(&self, out: &mut String) -> fmt::Result {
        write!(out, "\n\nPerformance Analysis on {} packets:", self.analysis_frames)?;
        let Some(a) = &self.analysis else {
            out.push_str("\n|Network Configuration: No data");
            out.push_str("\n|    Good PHY: -- %");
            out.push_str("\n|    Good Bandwidth: -- %");
            out.push_str("\n|    Good Short GI: -- %");
            out.push_str("\n|Channel Configuration: No data");
            out.push_str("\n|    Good MCS: -- %");
            out.push_str("\n|    Good SSI: -- %");
            out.push_str("\n|PHY Gap: No data");
            out.push_str("\n|    PHY Gap: --");
            out.push_str("\n\nControl Packets: No data");
            return Ok(());
        };

        write!(out, "\n|Network Configuration: {}", a.net_config)?;
        write!(out, "\n|    Good PHY: {}", pct(a.ratio(a.passes.phy)))?;
        write!(out, "\n|    Good Bandwidth: {}", pct(a.ratio(a.passes.bandwidth)))?;
        write!(out, "\n|    Good Short GI: {}", pct(a.ratio(a.passes.sgi)))?;
        write!(out, "\n|Channel Configuration: {}", a.channel_config)?;
        write!(out, "\n|    Good MCS: {}", pct(a.ratio(a.passes.mcs)))?;
        write!(out, "\n|    Good SSI: {}", pct(a.ratio(a.passes.signal)))?;
        write!(out, "\n|PHY Gap: {}", a.phy_gap_grade)?;
        write!(out, "\n|    PHY Gap: {:.2}", a.avg_phy_gap)?;
        write!(out, "\n\n{} {}", a.discarded, a.control_impact.describe())?;
        Ok(())
    }

    fn render(&self) -> Result<String, fmt::Error> {
        let separator = format!("\n\n{}", "-".repeat(SEPARATOR_WIDTH));
        let mut out = String::new();
        write!(out, "\nProcessing {} packets", self.processed)?;
        out.push_str(&separator);
        self.write_density(&mut out)?;
        out.push_str(&separator);
        self.write_monitor(&mut out)?;
        out.push_str(&separator);
        self.write_analysis(&mut out)?;
        out.push_str(&separator);
        write!(out, "\n\nProcessing runtime {:.3} seconds.", self.elapsed.as_secs_f64())?;
        Ok(out)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render()?)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Receiver of samples and reports produced by the processing loop.
pub trait ReportSink {
    fn sample(&mut self, sample: &VisualizationSample) -> Result<(), SinkError>;

    fn report(&mut self, report: &Report, kind: ReportKind) -> Result<(), SinkError>;
}

impl ReportSink for Vec<Box<dyn ReportSink>> {
    fn sample(&mut self, sample: &VisualizationSample) -> Result<(), SinkError> {
        self.iter_mut().try_for_each(|s| s.sample(sample))
    }

    fn report(&mut self, report: &Report, kind: ReportKind) -> Result<(), SinkError> {
        self.iter_mut().try_for_each(|s| s.report(report, kind))
    }
}

/// Prints reports to stdout with highlighted headers and grades.
pub struct ConsoleSink {
    /// Skip interim reports; the final one is always printed.
    pub quiet: bool,
}

impl ConsoleSink {
    fn styled_line(line: &str) -> String {
        if line.starts_with("---") {
            return line.dimmed().to_string();
        }
        if !line.starts_with('|') {
            return line.bold().to_string();
        }
        let Some((label, value)) = line.split_once(": ") else {
            return line.to_string();
        };
        let value = match value {
            "Pristine" | "Good" => value.green().bold(),
            "Fair" => value.yellow().bold(),
            "Bad" => value.red().bold(),
            "Not dense channel" => value.green(),
            "Moderately dense" => value.yellow(),
            "Dense" | "Very dense" => value.red(),
            _ => value.normal(),
        };
        format!("{label}: {value}")
    }
}

impl ReportSink for ConsoleSink {
    fn sample(&mut self, sample: &VisualizationSample) -> Result<(), SinkError> {
        log::debug!(
            "sample @{}: throughput={:.2} phy={} bw={} sgi={} signal={} gap={}",
            sample.frame,
            sample.throughput,
            sample.phy,
            sample.bandwidth,
            sample.short_gi,
            sample.signal_dbm,
            sample.phy_gap
        );
        Ok(())
    }

    fn report(&mut self, report: &Report, kind: ReportKind) -> Result<(), SinkError> {
        if kind == ReportKind::Interim && self.quiet {
            return Ok(());
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if kind == ReportKind::Final {
            writeln!(out, "\n{}", "  ── Final report ──".bold().cyan())?;
        }
        for line in report.to_string().lines() {
            writeln!(out, "{}", Self::styled_line(line))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Writes every sample as one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
}

impl JsonLinesSink<File> {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn sample(&mut self, sample: &VisualizationSample) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, sample)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn report(&mut self, _report: &Report, kind: ReportKind) -> Result<(), SinkError> {
        if kind == ReportKind::Final {
            self.writer.flush()?;
        }
        Ok(())
    }
}
