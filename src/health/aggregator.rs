// src/health/aggregator.rs
use super::{HealthPolicy, HealthState, LatencyStats, RollingWindow, Sample};
use crate::codec::ProbeResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub state: HealthState,
    pub samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub total_samples: u64,
    pub total_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sample_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

impl StateCounts {
    fn add(&mut self, state: HealthState) {
        self.total += 1;
        match state {
            HealthState::Healthy => self.healthy += 1,
            HealthState::Degraded => self.degraded += 1,
            HealthState::Unhealthy => self.unhealthy += 1,
            HealthState::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub counts: StateCounts,
    pub endpoints: Vec<EndpointHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub endpoint: String,
    pub from: HealthState,
    pub to: HealthState,
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
struct EndpointTracker {
    window: RollingWindow,
    state: HealthState,
    consecutive_successes: u32,
    consecutive_failures: u32,
    total_samples: u64,
    total_failures: u64,
    last_sample_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_transition_at: Option<DateTime<Utc>>,
}

impl EndpointTracker {
    fn new(window_size: usize) -> Self {
        Self {
            window: RollingWindow::new(window_size),
            state: HealthState::Unknown,
            consecutive_successes: 0,
            consecutive_failures: 0,
            total_samples: 0,
            total_failures: 0,
            last_sample_at: None,
            last_error: None,
            last_transition_at: None,
        }
    }

    fn record(&mut self, sample: Sample, policy: &HealthPolicy) -> Option<(HealthState, HealthState)> {
        self.total_samples += 1;
        if sample.success {
            self.consecutive_failures = 0;
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        } else {
            self.total_failures += 1;
            self.consecutive_successes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.last_error = sample.error.clone();
        }
        self.last_sample_at = Some(sample.timestamp);
        self.window.push(sample);

        let previous = self.state;
        let next = policy.evaluate(
            previous,
            &self.window,
            self.consecutive_successes,
            self.consecutive_failures,
        );

        if next == previous {
            return None;
        }
        self.state = next;
        self.last_transition_at = self.last_sample_at;
        Some((previous, next))
    }

    fn snapshot(&self, endpoint: &str) -> EndpointHealth {
        EndpointHealth {
            endpoint: endpoint.to_string(),
            state: self.state,
            samples: self.window.len(),
            success_ratio: self.window.success_ratio(),
            latency: self.window.latency_stats(),
            consecutive_successes: self.consecutive_successes,
            consecutive_failures: self.consecutive_failures,
            total_samples: self.total_samples,
            total_failures: self.total_failures,
            last_sample_at: self.last_sample_at,
            last_error: self.last_error.clone(),
            last_transition_at: self.last_transition_at,
        }
    }
}

/// Rolling health state for every monitored endpoint.
pub struct HealthAggregator {
    policy: HealthPolicy,
    window_size: usize,
    endpoints: DashMap<String, Arc<RwLock<EndpointTracker>>>,
}

impl HealthAggregator {
    pub fn new(policy: HealthPolicy, window_size: usize) -> Self {
        Self {
            policy,
            window_size: window_size.max(1),
            endpoints: DashMap::new(),
        }
    }

    pub fn register(&self, endpoint: &str) {
        let window_size = self.window_size;
        self.endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(EndpointTracker::new(window_size))));
    }

    pub fn remove(&self, endpoint: &str) -> bool {
        self.endpoints.remove(endpoint).is_some()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    fn tracker(&self, endpoint: &str) -> Arc<RwLock<EndpointTracker>> {
        let window_size = self.window_size;
        self.endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(EndpointTracker::new(window_size))))
            .clone()
    }

    /// Records a result and returns the state change it caused, if any.
    /// Results for unregistered endpoints register them on the fly.
    pub async fn record(&self, result: &ProbeResult) -> Option<StateTransition> {
        let tracker = self.tracker(&result.endpoint);
        let mut tracker = tracker.write().await;

        let (from, to) = tracker.record(Sample::from(result), &self.policy)?;
        let transition = StateTransition {
            endpoint: result.endpoint.clone(),
            from,
            to,
            at: result.timestamp,
        };

        match to {
            HealthState::Healthy => info!(
                "Endpoint {} is now healthy after {} consecutive successes",
                result.endpoint, tracker.consecutive_successes
            ),
            HealthState::Unhealthy => warn!(
                "Endpoint {} is now unhealthy after {} consecutive failures",
                result.endpoint, tracker.consecutive_failures
            ),
            HealthState::Degraded => warn!(
                endpoint = %result.endpoint,
                success_ratio = ?tracker.window.success_ratio(),
                "Endpoint {} is degraded", result.endpoint
            ),
            HealthState::Unknown => debug!("Endpoint {} state reset", result.endpoint),
        }

        Some(transition)
    }

    pub async fn snapshot(&self, endpoint: &str) -> Option<EndpointHealth> {
        let tracker = self.endpoints.get(endpoint).map(|entry| entry.value().clone())?;
        let tracker = tracker.read().await;
        Some(tracker.snapshot(endpoint))
    }

    pub async fn state(&self, endpoint: &str) -> Option<HealthState> {
        let tracker = self.endpoints.get(endpoint).map(|entry| entry.value().clone())?;
        let state = tracker.read().await.state;
        Some(state)
    }

    pub async fn report(&self) -> HealthReport {
        // Clone the handles first so no DashMap guard is held across an await.
        let trackers: Vec<(String, Arc<RwLock<EndpointTracker>>)> = self
            .endpoints
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut endpoints = Vec::with_capacity(trackers.len());
        let mut counts = StateCounts::default();
        for (id, tracker) in trackers {
            let snapshot = tracker.read().await.snapshot(&id);
            counts.add(snapshot.state);
            endpoints.push(snapshot);
        }
        endpoints.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));

        HealthReport {
            generated_at: Utc::now(),
            counts,
            endpoints,
        }
    }

    pub async fn counts(&self) -> StateCounts {
        self.report().await.counts
    }
}
