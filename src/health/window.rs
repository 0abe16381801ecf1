// src/health/window.rs
use crate::codec::ProbeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency: Duration,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl From<&ProbeResult> for Sample {
    fn from(result: &ProbeResult) -> Self {
        Self {
            timestamp: result.timestamp,
            success: result.success,
            latency: result.latency(),
            status_code: result.status_code,
            error: result.error_message().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

/// Fixed-capacity FIFO of the most recent samples.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns the evicted sample when the window was full.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn success_ratio(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let ok = self.samples.iter().filter(|s| s.success).count();
        Some(ok as f64 / self.samples.len() as f64)
    }

    /// Computed over successful samples only.
    pub fn latency_stats(&self) -> Option<LatencyStats> {
        let mut latencies: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.latency.as_secs_f64() * 1000.0)
            .collect();
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = latencies.iter().sum();
        Some(LatencyStats {
            avg_ms: sum / latencies.len() as f64,
            min_ms: latencies[0],
            max_ms: latencies[latencies.len() - 1],
            p50_ms: nearest_rank(&latencies, 50.0),
            p95_ms: nearest_rank(&latencies, 95.0),
        })
    }
}

fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(success: bool, latency_ms: u64) -> Sample {
        Sample {
            timestamp: Utc::now(),
            success,
            latency: Duration::from_millis(latency_ms),
            status_code: None,
            error: None,
        }
    }

    #[test]
    fn test_eviction_order() {
        let mut window = RollingWindow::new(2);
        assert!(window.push(sample(true, 1)).is_none());
        assert!(window.push(sample(true, 2)).is_none());

        let evicted = window.push(sample(false, 3)).unwrap();
        assert_eq!(evicted.latency, Duration::from_millis(1));
        assert_eq!(window.len(), 2);
        assert!(!window.last().unwrap().success);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = RollingWindow::new(0);
        window.push(sample(true, 1));
        window.push(sample(true, 2));
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_stats_ignore_failures() {
        let mut window = RollingWindow::new(10);
        for ms in [10, 20, 30, 40] {
            window.push(sample(true, ms));
        }
        window.push(sample(false, 5000));

        assert_eq!(window.success_ratio(), Some(0.8));
        let stats = window.latency_stats().unwrap();
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 40.0);
        assert_eq!(stats.avg_ms, 25.0);
        assert_eq!(stats.p50_ms, 20.0);
        assert_eq!(stats.p95_ms, 40.0);
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(5);
        assert_eq!(window.success_ratio(), None);
        assert!(window.latency_stats().is_none());
    }

    proptest! {
        #[test]
        fn window_never_exceeds_capacity(
            capacity in 1usize..32,
            outcomes in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let mut window = RollingWindow::new(capacity);
            for (i, ok) in outcomes.iter().enumerate() {
                window.push(sample(*ok, i as u64));
                prop_assert!(window.len() <= capacity);
            }
            prop_assert_eq!(window.len(), outcomes.len().min(capacity));

            if let Some(ratio) = window.success_ratio() {
                prop_assert!((0.0..=1.0).contains(&ratio));
            }
        }

        #[test]
        fn percentiles_are_ordered(latencies in proptest::collection::vec(1u64..10_000, 1..50)) {
            let mut window = RollingWindow::new(latencies.len());
            for ms in &latencies {
                window.push(sample(true, *ms));
            }
            let stats = window.latency_stats().unwrap();
            prop_assert!(stats.min_ms <= stats.p50_ms);
            prop_assert!(stats.p50_ms <= stats.p95_ms);
            prop_assert!(stats.p95_ms <= stats.max_ms);
        }
    }
}
