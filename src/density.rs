//! Per-channel access-point density.
//!
//! Every access point (BSSID) heard on a channel contributes its strongest
//! absolute RSSI once.  The channel's density is the sum of those values
//! divided by the channel width, and is banded into four congestion classes.

use std::collections::BTreeMap;
use std::fmt;

use crate::frame::{FrameObservation, MacAddr};
use crate::phy;

/// Width used when the frame carries no bandwidth code (802.11b channel
/// spacing).
pub const FALLBACK_WIDTH_MHZ: u32 = 22;

/// Congestion class of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityClass {
    NotDense,
    Moderate,
    Dense,
    VeryDense,
}

impl DensityClass {
    pub fn from_density(density: f64) -> Self {
        if density < 8.0 {
            Self::NotDense
        } else if density < 16.0 {
            Self::Moderate
        } else if density < 24.0 {
            Self::Dense
        } else {
            Self::VeryDense
        }
    }
}

impl fmt::Display for DensityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotDense => "Not dense channel",
            Self::Moderate => "Moderately dense",
            Self::Dense => "Dense",
            Self::VeryDense => "Very dense",
        })
    }
}

/// Density snapshot for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDensity {
    pub channel: u16,
    /// Most recent frequency observed on the channel.
    pub frequency_mhz: Option<u16>,
    pub access_points: usize,
    pub density: f64,
    pub classification: DensityClass,
}

#[derive(Debug, Default)]
struct ChannelState {
    frequency_mhz: Option<u16>,
    /// BSSID → strongest absolute RSSI seen.
    best_signal: BTreeMap<MacAddr, u32>,
}

/// Accumulates access points per channel and recomputes densities after
/// each qualifying observation.
#[derive(Debug)]
pub struct ChannelDensityTracker {
    channels: BTreeMap<u16, ChannelState>,
    width_mhz: u32,
    latest: Vec<ChannelDensity>,
}

impl Default for ChannelDensityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDensityTracker {
    pub fn new() -> Self {
        Self {
            channels: BTreeMap::new(),
            width_mhz: FALLBACK_WIDTH_MHZ,
            latest: Vec::new(),
        }
    }

    /// Feed one observation.  Frames without a BSSID, signal reading and
    /// channel are ignored; returns whether the frame was used.
    pub fn observe(&mut self, obs: &FrameObservation) -> bool {
        let (Some(bssid), Some(signal), Some(channel)) = (obs.bssid, obs.signal_dbm, obs.channel) else {
            return false;
        };

        let strength = i32::from(signal).unsigned_abs();
        let state = self.channels.entry(channel).or_default();
        state
            .best_signal
            .entry(bssid)
            .and_modify(|best| *best = (*best).max(strength))
            .or_insert(strength);
        if obs.frequency_mhz.is_some() {
            state.frequency_mhz = obs.frequency_mhz;
        }

        self.width_mhz = obs
            .bandwidth_code
            .and_then(phy::channel_width_mhz)
            .unwrap_or(FALLBACK_WIDTH_MHZ);
        self.latest = self.recompute();
        true
    }

    fn recompute(&self) -> Vec<ChannelDensity> {
        let width = f64::from(self.width_mhz);
        self.channels
            .iter()
            .filter(|(_, state)| !state.best_signal.is_empty())
            .map(|(&channel, state)| {
                let total: u32 = state.best_signal.values().sum();
                let density = f64::from(total) / width;
                ChannelDensity {
                    channel,
                    frequency_mhz: state.frequency_mhz,
                    access_points: state.best_signal.len(),
                    density,
                    classification: DensityClass::from_density(density),
                }
            })
            .collect()
    }

    /// Densities as of the last qualifying observation, ordered by channel.
    /// Empty until the first one.
    pub fn densities(&self) -> &[ChannelDensity] {
        &self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(bssid: u8, signal: i8, channel: u16, bandwidth: Option<u8>) -> FrameObservation {
        FrameObservation {
            bssid: Some(MacAddr([0, 0, 0, 0, 0, bssid])),
            signal_dbm: Some(signal),
            channel: Some(channel),
            frequency_mhz: Some(2407 + 5 * channel),
            bandwidth_code: bandwidth,
            ..Default::default()
        }
    }

    #[test]
    fn test_keeps_strongest_absolute_signal() {
        let mut t = ChannelDensityTracker::new();
        let ap = MacAddr([0, 0, 0, 0, 0, 1]);
        t.observe(&beacon(1, -60, 6, None));
        t.observe(&beacon(1, -70, 6, None));
        assert_eq!(t.channels[&6].best_signal[&ap], 70);
        t.observe(&beacon(1, -65, 6, None));
        assert_eq!(t.channels[&6].best_signal[&ap], 70);
        assert_eq!(t.densities()[0].access_points, 1);
        assert!((t.densities()[0].density - 70.0 / 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_independent() {
        let frames = [beacon(1, -60, 6, None), beacon(1, -70, 6, None), beacon(2, -80, 6, None)];
        let mut forward = ChannelDensityTracker::new();
        let mut backward = ChannelDensityTracker::new();
        for f in &frames {
            forward.observe(f);
        }
        for f in frames.iter().rev() {
            backward.observe(f);
        }
        assert_eq!(forward.densities(), backward.densities());
        // (70 + 80) / 22
        assert!((forward.densities()[0].density - 150.0 / 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_incomplete_frames() {
        let mut t = ChannelDensityTracker::new();
        let mut f = beacon(1, -60, 6, None);
        f.channel = None;
        assert!(!t.observe(&f));
        let mut f = beacon(1, -60, 6, None);
        f.bssid = None;
        assert!(!t.observe(&f));
        assert!(t.densities().is_empty());
    }

    #[test]
    fn test_width_from_bandwidth_code() {
        let mut t = ChannelDensityTracker::new();
        t.observe(&beacon(1, -80, 36, Some(1)));
        let d = &t.densities()[0];
        assert!((d.density - 2.0).abs() < 1e-9);
        assert_eq!(d.classification, DensityClass::NotDense);
    }

    #[test]
    fn test_per_channel_entries() {
        let mut t = ChannelDensityTracker::new();
        t.observe(&beacon(1, -88, 1, Some(0)));
        t.observe(&beacon(2, -90, 1, Some(0)));
        t.observe(&beacon(1, -50, 11, Some(0)));
        let d = t.densities();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].channel, 1);
        assert_eq!(d[0].frequency_mhz, Some(2412));
        assert!((d[0].density - 8.9).abs() < 1e-9);
        assert_eq!(d[0].classification, DensityClass::Moderate);
        assert_eq!(d[1].channel, 11);
        assert_eq!(d[1].classification, DensityClass::NotDense);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(DensityClass::from_density(7.99), DensityClass::NotDense);
        assert_eq!(DensityClass::from_density(8.0), DensityClass::Moderate);
        assert_eq!(DensityClass::from_density(16.0), DensityClass::Dense);
        assert_eq!(DensityClass::from_density(24.0), DensityClass::VeryDense);
        assert_eq!(DensityClass::VeryDense.to_string(), "Very dense");
    }
}
