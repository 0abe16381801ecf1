// src/metrics/collector.rs
use crate::codec::ProbeResult;
use crate::health::{HealthState, StateCounts};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub probe_errors_total: IntCounterVec,

    // Health metrics
    pub endpoint_health_state: IntGaugeVec,
    pub state_transitions_total: IntCounterVec,
    pub endpoints_healthy: IntGauge,
    pub endpoints_total: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probes_total = IntCounterVec::new(
            Opts::new("netmon_probes_total", "Total number of probes"),
            &["endpoint", "outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new("netmon_probe_duration_seconds", "Probe latency in seconds"),
            &["endpoint"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let probe_errors_total = IntCounterVec::new(
            Opts::new("netmon_probe_errors_total", "Failed probes by error kind"),
            &["endpoint", "kind"],
        )?;
        registry.register(Box::new(probe_errors_total.clone()))?;

        let endpoint_health_state = IntGaugeVec::new(
            Opts::new(
                "netmon_endpoint_health_state",
                "Endpoint health (0=unknown, 1=healthy, 2=degraded, 3=unhealthy)",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(endpoint_health_state.clone()))?;

        let state_transitions_total = IntCounterVec::new(
            Opts::new(
                "netmon_state_transitions_total",
                "Health state transitions by target state",
            ),
            &["endpoint", "to"],
        )?;
        registry.register(Box::new(state_transitions_total.clone()))?;

        let endpoints_healthy =
            IntGauge::new("netmon_endpoints_healthy", "Number of healthy endpoints")?;
        registry.register(Box::new(endpoints_healthy.clone()))?;

        let endpoints_total =
            IntGauge::new("netmon_endpoints_total", "Total number of monitored endpoints")?;
        registry.register(Box::new(endpoints_total.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            probe_errors_total,
            endpoint_health_state,
            state_transitions_total,
            endpoints_healthy,
            endpoints_total,
        })
    }

    pub fn record_probe(&self, result: &ProbeResult) {
        let outcome = if result.success { "success" } else { "failure" };
        self.probes_total
            .with_label_values(&[&result.endpoint, outcome])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[&result.endpoint])
            .observe(result.latency().as_secs_f64());

        if let Some(error) = &result.error {
            self.probe_errors_total
                .with_label_values(&[&result.endpoint, &error.kind])
                .inc();
        }
    }

    pub fn update_endpoint_state(&self, endpoint: &str, state: HealthState) {
        self.endpoint_health_state
            .with_label_values(&[endpoint])
            .set(state.gauge_value());
    }

    pub fn record_transition(&self, endpoint: &str, to: HealthState) {
        self.state_transitions_total
            .with_label_values(&[endpoint, to.as_str()])
            .inc();
        self.update_endpoint_state(endpoint, to);
    }

    pub fn update_endpoint_counts(&self, counts: &StateCounts) {
        self.endpoints_healthy.set(counts.healthy as i64);
        self.endpoints_total.set(counts.total as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ProbeFailure;
    use crate::transport::ProbeKind;
    use chrono::Utc;

    fn failed(endpoint: &str) -> ProbeResult {
        ProbeResult {
            endpoint: endpoint.into(),
            target: "tcp://db:5432".into(),
            kind: ProbeKind::Tcp,
            timestamp: Utc::now(),
            success: false,
            latency_ms: 3.0,
            attempts: 1,
            status_code: None,
            detail: None,
            error: Some(ProbeFailure {
                kind: "timeout".into(),
                message: "timed out".into(),
            }),
        }
    }

    #[test]
    fn test_gather_exposes_probe_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        let metrics = registry.collector();

        metrics.record_probe(&failed("db"));
        metrics.record_transition("db", HealthState::Unhealthy);
        metrics.update_endpoint_counts(&StateCounts {
            total: 1,
            unhealthy: 1,
            ..StateCounts::default()
        });

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains(r#"netmon_probes_total{endpoint="db",outcome="failure"} 1"#));
        assert!(text.contains(r#"netmon_probe_errors_total{endpoint="db",kind="timeout"} 1"#));
        assert!(text.contains(r#"netmon_endpoint_health_state{endpoint="db"} 3"#));
        assert!(text.contains("netmon_endpoints_total 1"));
        assert!(text.contains("netmon_endpoints_healthy 0"));
    }
}
