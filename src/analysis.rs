//! Link-quality grading against fixed thresholds.
//!
//! Each data frame is checked against five "good link" thresholds.  Pass
//! counts are folded into a network-configuration grade (PHY, bandwidth,
//! guard interval) and a channel-configuration grade (signal, MCS).

use std::fmt;

use crate::frame::FrameObservation;

// A value strictly above each threshold is a pass.
const BAD_PHY: u8 = 5;
const BAD_BANDWIDTH: u8 = 0;
const BAD_MCS: u8 = 6;
const BAD_SIGNAL_DBM: i8 = -80;

/// Four-tier quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Pristine,
    Good,
    Fair,
    Bad,
}

impl Grade {
    /// Banding for pass ratios in `[0, 1]`, higher is better.
    pub fn from_score(score: f64) -> Self {
        if score > 0.9 {
            Self::Pristine
        } else if score > 0.6 {
            Self::Good
        } else if score > 0.3 {
            Self::Fair
        } else {
            Self::Bad
        }
    }

    /// Banding for the average PHY gap, lower is better.
    pub fn from_phy_gap(gap: f64) -> Self {
        if gap < 1.0 {
            Self::Pristine
        } else if gap < 2.0 {
            Self::Good
        } else if gap < 5.0 {
            Self::Fair
        } else {
            Self::Bad
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pristine => "Pristine",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Bad => "Bad",
        })
    }
}

/// How much non-data (control/management) traffic weighs on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlImpact {
    Heavy,
    Moderate,
    Minimal,
    None,
}

impl ControlImpact {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.9 {
            Self::Heavy
        } else if ratio > 0.6 {
            Self::Moderate
        } else if ratio > 0.2 {
            Self::Minimal
        } else {
            Self::None
        }
    }

    /// Sentence fragment following the discarded-frame count.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Heavy => "control packets heavily impact performance",
            Self::Moderate => "control packets moderately impact performance",
            Self::Minimal => "control packets minimally impact performance",
            Self::None => "control packets have no impact on performance",
        }
    }
}

/// Per-factor pass counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactorCounts {
    pub phy: u64,
    pub bandwidth: u64,
    pub sgi: u64,
    pub mcs: u64,
    pub signal: u64,
}

/// Grades derived from the analysis counters.  Only produced once a data
/// frame was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSummary {
    pub total: u64,
    pub discarded: u64,
    pub net_config: Grade,
    pub channel_config: Grade,
    pub avg_phy_gap: f64,
    pub phy_gap_grade: Grade,
    pub control_impact: ControlImpact,
    pub passes: FactorCounts,
}

impl AnalysisSummary {
    /// Share of data frames passing a factor.
    pub fn ratio(&self, passes: u64) -> f64 {
        passes as f64 / self.total as f64
    }
}

/// Cumulative pass/fail counters.
#[derive(Debug, Clone, Default)]
pub struct PerformanceAnalysis {
    total: u64,
    discarded: u64,
    passes: FactorCounts,
    phy_gap_sum: i64,
}

impl PerformanceAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a frame that passed the address filter.  Frames without a
    /// modulation index are counted as discarded control traffic.
    pub fn record(&mut self, obs: &FrameObservation) {
        let Some(mcs) = obs.mcs_index else {
            self.discarded += 1;
            return;
        };
        self.total += 1;

        let p = &mut self.passes;
        if obs.phy.is_some_and(|phy| phy > BAD_PHY) {
            p.phy += 1;
        }
        if obs.bandwidth_code.is_some_and(|bw| bw > BAD_BANDWIDTH) {
            p.bandwidth += 1;
        }
        if obs.short_gi == Some(true) {
            p.sgi += 1;
        }
        if mcs > BAD_MCS {
            p.mcs += 1;
        }
        if obs.signal_dbm.is_some_and(|s| s > BAD_SIGNAL_DBM) {
            p.signal += 1;
        }
        if let Some(gap) = obs.phy_gap {
            self.phy_gap_sum += i64::from(gap);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Grades, `None` until the first data frame.
    pub fn summary(&self) -> Option<AnalysisSummary> {
        if self.total == 0 {
            return None;
        }
        let total = self.total as f64;
        let p = &self.passes;

        let net_config_score = (p.phy + p.bandwidth + p.sgi) as f64 / (3.0 * total);
        let channel_config_score = (p.signal + p.mcs) as f64 / (2.0 * total);
        let avg_phy_gap = self.phy_gap_sum as f64 / total;
        let control_ratio = self.discarded as f64 / (self.discarded + self.total) as f64;

        Some(AnalysisSummary {
            total: self.total,
            discarded: self.discarded,
            net_config: Grade::from_score(net_config_score),
            channel_config: Grade::from_score(channel_config_score),
            avg_phy_gap,
            phy_gap_grade: Grade::from_phy_gap(avg_phy_gap),
            control_impact: ControlImpact::from_ratio(control_ratio),
            passes: *p,
        })
    }
}
