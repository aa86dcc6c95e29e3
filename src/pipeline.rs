//! The single-pass processing loop.
//!
//! Pulls one record at a time from a [`FrameSource`], normalises it, feeds
//! the density tracker, performance monitor and analysis classifier, and
//! every `stride` processed frames hands a sample plus a report to the
//! [`ReportSink`].

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::analysis::PerformanceAnalysis;
use crate::capture::FrameSource;
use crate::density::ChannelDensityTracker;
use crate::error::{FrameError, Result};
use crate::frame::{self, FrameObservation};
use crate::monitor::{AddressFilter, PerformanceMonitor};
use crate::report::{Report, ReportKind, ReportSink, VisualizationSample};

/// Default number of processed frames between samples.
pub const DEFAULT_STRIDE: usize = 5;

/// Upper bound on frames read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLimit {
    Unlimited,
    Frames(u64),
}

impl FrameLimit {
    /// Negative values mean unlimited.
    pub fn from_arg(limit: i64) -> Self {
        u64::try_from(limit).map_or(Self::Unlimited, Self::Frames)
    }

    fn reached(&self, read: u64) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Frames(n) => read >= *n,
        }
    }
}

/// Run parameters.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub limit: FrameLimit,
    pub filter: AddressFilter,
    pub stride: NonZeroUsize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            limit: FrameLimit::Unlimited,
            filter: AddressFilter::default(),
            stride: NonZeroUsize::new(DEFAULT_STRIDE).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Per-run frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Records pulled from the source, skipped ones included.
    pub read: u64,
    /// Records that normalised into an observation.
    pub processed: u64,
    pub skipped_not_wireless: u64,
    pub skipped_decode: u64,
    pub samples: u64,
}

/// Countdown deciding which processed frames produce a sample: the first
/// one, then every `stride`-th.
#[derive(Debug, Clone)]
pub struct Sampler {
    stride: usize,
    countdown: usize,
}

impl Sampler {
    pub fn new(stride: NonZeroUsize) -> Self {
        Self {
            stride: stride.get(),
            countdown: stride.get(),
        }
    }

    /// Advance by one processed frame.  `processed` is the 1-based count
    /// including this frame.
    pub fn tick(&mut self, processed: u64) -> bool {
        self.countdown -= 1;
        if self.countdown == 0 {
            self.countdown = self.stride;
            return true;
        }
        processed == 1
    }
}

/// Accumulators for one run.
pub struct Pipeline {
    filter: AddressFilter,
    limit: FrameLimit,
    density: ChannelDensityTracker,
    monitor: PerformanceMonitor,
    analysis: PerformanceAnalysis,
    sampler: Sampler,
    stats: RunStats,
    started: Instant,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Self {
        Self {
            filter: config.filter,
            limit: config.limit,
            density: ChannelDensityTracker::new(),
            monitor: PerformanceMonitor::new(),
            analysis: PerformanceAnalysis::new(),
            sampler: Sampler::new(config.stride),
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    /// Fold one observation into every accumulator.  Returns a sample when
    /// this frame is a sampling tick.
    pub fn process(&mut self, obs: &FrameObservation) -> Option<VisualizationSample> {
        log::trace!(
            "type {:#04x} ta={} ra={} ssid={:?} mcs={:?} nss={} gap={:?}",
            obs.type_subtype,
            obs.transmitter_addr.map(|a| a.to_string()).unwrap_or_default(),
            obs.receiver_addr.map(|a| a.to_string()).unwrap_or_default(),
            obs.ssid,
            obs.mcs_index,
            obs.spatial_streams,
            obs.phy_gap
        );
        self.density.observe(obs);

        if self.filter.matches(obs) {
            if obs.is_data() {
                self.monitor.record(obs);
            }
            self.analysis.record(obs);
        }

        self.stats.processed += 1;
        if !self.sampler.tick(self.stats.processed) {
            return None;
        }
        self.stats.samples += 1;
        Some(VisualizationSample {
            frame: self.stats.processed,
            throughput: self.monitor.smoothed_throughput(),
            phy: obs.phy.unwrap_or(0),
            bandwidth: obs.bandwidth_code.unwrap_or(0),
            short_gi: obs.short_gi.unwrap_or(false),
            signal_dbm: obs.signal_dbm.unwrap_or(0),
            phy_gap: obs.phy_gap.unwrap_or(0),
        })
    }

    /// Snapshot of the current state.
    pub fn report(&self) -> Report {
        Report {
            processed: self.stats.processed,
            densities: self.density.densities().to_vec(),
            monitor_frames: self.monitor.total_frames(),
            monitor: self.monitor.stats(),
            analysis_frames: self.analysis.total(),
            analysis: self.analysis.summary(),
            elapsed: self.started.elapsed(),
        }
    }

    /// Drain `source` until end of stream, the frame limit, or `running`
    /// turning false.  Always closes the source and emits a final report.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K, running: &AtomicBool) -> Result<RunStats>
    where
        S: FrameSource + ?Sized,
        K: ReportSink + ?Sized,
    {
        let outcome = self.drain(source, sink, running);
        source.close();
        outcome?;

        let stats = self.stats;
        log::info!(
            "Read {} frames: {} processed, {} not 802.11, {} malformed; {} data frames, {} control/management; {} samples",
            stats.read,
            stats.processed,
            stats.skipped_not_wireless,
            stats.skipped_decode,
            self.analysis.total(),
            self.analysis.discarded(),
            stats.samples
        );
        sink.report(&self.report(), ReportKind::Final)?;
        Ok(stats)
    }

    fn drain<S, K>(&mut self, source: &mut S, sink: &mut K, running: &AtomicBool) -> Result<()>
    where
        S: FrameSource + ?Sized,
        K: ReportSink + ?Sized,
    {
        loop {
            if !running.load(Ordering::Relaxed) {
                log::info!("Stop requested after {} frames", self.stats.read);
                return Ok(());
            }
            if self.limit.reached(self.stats.read) {
                log::info!("Frame limit reached ({} frames)", self.stats.read);
                return Ok(());
            }
            let Some(record) = source.next_frame() else {
                return Ok(());
            };
            self.stats.read += 1;

            let obs = match record.and_then(|raw| frame::normalize(&raw)) {
                Ok(obs) => obs,
                Err(FrameError::NotAWirelessFrame) => {
                    self.stats.skipped_not_wireless += 1;
                    log::debug!("Frame {}: not an 802.11 frame, skipped", self.stats.read);
                    continue;
                }
                Err(e @ FrameError::Decode(_)) => {
                    self.stats.skipped_decode += 1;
                    log::debug!("Frame {}: {e}, skipped", self.stats.read);
                    continue;
                }
            };

            if let Some(sample) = self.process(&obs) {
                sink.sample(&sample)?;
                sink.report(&self.report(), ReportKind::Interim)?;
            }
        }
    }
}
