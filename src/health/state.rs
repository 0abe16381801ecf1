// src/health/state.rs
use super::RollingWindow;
use crate::config::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }

    /// Gauge encoding (0=unknown, 1=healthy, 2=degraded, 3=unhealthy)
    pub fn gauge_value(&self) -> i64 {
        match self {
            HealthState::Unknown => 0,
            HealthState::Healthy => 1,
            HealthState::Degraded => 2,
            HealthState::Unhealthy => 3,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub degraded_success_ratio: f64,
    pub degraded_latency_ms: Option<u64>,
}

impl From<&MonitorConfig> for HealthPolicy {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            healthy_threshold: config.healthy_threshold.max(1),
            unhealthy_threshold: config.unhealthy_threshold.max(1),
            degraded_success_ratio: config.degraded_success_ratio,
            degraded_latency_ms: config.degraded_latency_ms,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl HealthPolicy {
    pub fn evaluate(
        &self,
        current: HealthState,
        window: &RollingWindow,
        consecutive_successes: u32,
        consecutive_failures: u32,
    ) -> HealthState {
        if window.is_empty() {
            return HealthState::Unknown;
        }
        if consecutive_failures >= self.unhealthy_threshold {
            return HealthState::Unhealthy;
        }

        match current {
            HealthState::Unknown | HealthState::Unhealthy => {
                if consecutive_successes >= self.healthy_threshold {
                    self.classify_up(window)
                } else {
                    current
                }
            }
            HealthState::Healthy | HealthState::Degraded => self.classify_up(window),
        }
    }

    fn classify_up(&self, window: &RollingWindow) -> HealthState {
        let ratio = window.success_ratio().unwrap_or(0.0);
        if ratio < self.degraded_success_ratio {
            return HealthState::Degraded;
        }

        if let (Some(limit), Some(stats)) = (self.degraded_latency_ms, window.latency_stats()) {
            if stats.p95_ms > limit as f64 {
                return HealthState::Degraded;
            }
        }

        HealthState::Healthy
    }
}
