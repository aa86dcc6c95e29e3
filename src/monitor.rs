//! Throughput and loss statistics over data frames.

use std::collections::VecDeque;

use crate::frame::{FrameObservation, MacAddr};

/// Number of recent data rates kept for the smoothed throughput sample.
pub const RECENT_WINDOW: usize = 30;

/// Optional transmitter / receiver address restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressFilter {
    pub source: Option<MacAddr>,
    pub destination: Option<MacAddr>,
}

impl AddressFilter {
    /// A frame matches when every configured address equals the frame's.
    pub fn matches(&self, obs: &FrameObservation) -> bool {
        let src_ok = self.source.map_or(true, |src| obs.transmitter_addr == Some(src));
        let dst_ok = self.destination.map_or(true, |dst| obs.receiver_addr == Some(dst));
        src_ok && dst_ok
    }
}

/// Derived monitor statistics.  Only produced once a data frame was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorStats {
    pub avg_rate: f64,
    pub max_rate: f64,
    pub min_rate: f64,
    pub loss_rate: f64,
    pub throughput: f64,
}

/// Cumulative data-rate and retry counters.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    total_frames: u64,
    retry_frames: u64,
    sum_data_rate: f64,
    max_data_rate: f64,
    min_data_rate: f64,
    recent: VecDeque<f64>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            retry_frames: 0,
            sum_data_rate: 0.0,
            max_data_rate: 0.0,
            min_data_rate: f64::INFINITY,
            recent: VecDeque::with_capacity(RECENT_WINDOW),
        }
    }

    /// Record one eligible data frame.  An absent data rate counts as 0 Mbps.
    pub fn record(&mut self, obs: &FrameObservation) {
        let rate = obs.data_rate_or_zero();
        self.total_frames += 1;
        self.retry_frames += u64::from(obs.retry);
        self.sum_data_rate += rate;
        self.max_data_rate = self.max_data_rate.max(rate);
        self.min_data_rate = self.min_data_rate.min(rate);
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(rate);
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Fraction of data frames flagged as retries, `None` without data.
    pub fn loss_rate(&self) -> Option<f64> {
        (self.total_frames > 0).then(|| self.retry_frames as f64 / self.total_frames as f64)
    }

    /// Cumulative statistics, `None` until the first data frame.
    pub fn stats(&self) -> Option<MonitorStats> {
        let loss_rate = self.loss_rate()?;
        let avg_rate = self.sum_data_rate / self.total_frames as f64;
        Some(MonitorStats {
            avg_rate,
            max_rate: self.max_data_rate,
            min_rate: self.min_data_rate,
            loss_rate,
            throughput: avg_rate * (1.0 - loss_rate),
        })
    }

    /// Mean of the recent window scaled by the cumulative loss rate.  0 when
    /// no data frame was seen.
    pub fn smoothed_throughput(&self) -> f64 {
        match self.loss_rate() {
            Some(loss) if !self.recent.is_empty() => {
                let mean = self.recent.iter().sum::<f64>() / self.recent.len() as f64;
                mean * (1.0 - loss)
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(rate: f64, retry: bool) -> FrameObservation {
        FrameObservation {
            data_rate_mbps: Some(rate),
            retry,
            mcs_index: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_data() {
        let m = PerformanceMonitor::new();
        assert_eq!(m.loss_rate(), None);
        assert_eq!(m.stats(), None);
        assert_eq!(m.smoothed_throughput(), 0.0);
    }

    #[test]
    fn test_three_frames_no_retries() {
        let mut m = PerformanceMonitor::new();
        for rate in [50.0, 100.0, 150.0] {
            m.record(&data(rate, false));
        }
        let s = m.stats().unwrap();
        assert_eq!(m.total_frames(), 3);
        assert_eq!(s.avg_rate, 100.0);
        assert_eq!(s.max_rate, 150.0);
        assert_eq!(s.min_rate, 50.0);
        assert_eq!(s.loss_rate, 0.0);
        assert_eq!(s.throughput, 100.0);
    }

    #[test]
    fn test_retries_reduce_throughput() {
        let mut m = PerformanceMonitor::new();
        m.record(&data(100.0, true));
        m.record(&data(100.0, false));
        let s = m.stats().unwrap();
        assert_eq!(s.loss_rate, 0.5);
        assert_eq!(s.throughput, 50.0);
        assert_eq!(m.smoothed_throughput(), 50.0);
    }

    #[test]
    fn test_absent_rate_counts_as_zero() {
        let mut m = PerformanceMonitor::new();
        let mut f = data(0.0, false);
        f.data_rate_mbps = None;
        m.record(&f);
        m.record(&data(10.0, false));
        let s = m.stats().unwrap();
        assert_eq!(s.min_rate, 0.0);
        assert_eq!(s.avg_rate, 5.0);
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let mut m = PerformanceMonitor::new();
        for i in 0..40 {
            m.record(&data(i as f64, false));
        }
        let recent: Vec<f64> = m.recent.iter().copied().collect();
        assert_eq!(recent.len(), RECENT_WINDOW);
        assert_eq!(recent[0], 10.0);
        // Cumulative statistics still cover every frame.
        assert_eq!(m.stats().unwrap().min_rate, 0.0);
        assert_eq!(m.total_frames(), 40);
        // Mean of 10..=39.
        assert_eq!(m.smoothed_throughput(), 24.5);
    }

    #[test]
    fn test_address_filter() {
        let a = MacAddr([1; 6]);
        let b = MacAddr([2; 6]);
        let obs = FrameObservation {
            transmitter_addr: Some(a),
            receiver_addr: Some(b),
            ..Default::default()
        };
        assert!(AddressFilter::default().matches(&obs));
        assert!(AddressFilter { source: Some(a), destination: Some(b) }.matches(&obs));
        assert!(!AddressFilter { source: Some(b), destination: None }.matches(&obs));
        assert!(!AddressFilter { source: None, destination: Some(a) }.matches(&obs));

        let ack = FrameObservation { receiver_addr: Some(b), ..Default::default() };
        assert!(!AddressFilter { source: Some(a), destination: None }.matches(&ack));
    }
}
