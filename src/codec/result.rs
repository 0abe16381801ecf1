// src/codec/result.rs
use crate::config::EndpointConfig;
use crate::transport::{ProbeError, ProbeKind, ProbeSuccess};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One probe outcome, the unit every sink and the aggregator consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint: String,
    pub target: String,
    pub kind: ProbeKind,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: f64,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: String,
    pub message: String,
}

impl From<&ProbeError> for ProbeFailure {
    fn from(err: &ProbeError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl ProbeResult {
    /// `elapsed` is used as latency for failures; successes report the
    /// transport-measured latency of the winning attempt.
    pub fn from_outcome(
        endpoint: &EndpointConfig,
        kind: ProbeKind,
        outcome: &Result<ProbeSuccess, ProbeError>,
        attempts: u32,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        let (success, latency, status_code, detail, error) = match outcome {
            Ok(ok) => (true, ok.latency, ok.status_code, ok.detail.clone(), None),
            Err(e) => (false, elapsed, e.status_code(), None, Some(ProbeFailure::from(e))),
        };

        Self {
            endpoint: endpoint.id(),
            target: endpoint.url.to_string(),
            kind,
            timestamp: started_at,
            success,
            latency_ms: round_ms(latency),
            attempts,
            status_code,
            detail,
            error,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.latency_ms.max(0.0) / 1000.0)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

fn round_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1_000_000.0).round() / 1000.0
}
