// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::transport::ProbeKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    /// Optional JSON document (`{"endpoints": [...]}`) merged in at start-up.
    #[serde(default)]
    pub endpoints_url: Option<Url>,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,
    #[serde(default = "default_degraded_success_ratio")]
    pub degraded_success_ratio: f64,
    /// p95 latency above this marks an otherwise healthy endpoint degraded.
    #[serde(default)]
    pub degraded_latency_ms: Option<u64>,
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            window_size: default_window_size(),
            healthy_threshold: default_healthy_threshold(),
            unhealthy_threshold: default_unhealthy_threshold(),
            degraded_success_ratio: default_degraded_success_ratio(),
            degraded_latency_ms: None,
            max_concurrent_probes: default_max_concurrent_probes(),
            jitter: true,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub url: Url,
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub expected_status: Option<Vec<u16>>,
    /// WebSocket payload the server is expected to echo back.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl EndpointConfig {
    pub fn new(url: Url) -> Self {
        Self {
            id: None,
            url,
            interval_secs: None,
            timeout_secs: None,
            method: HttpMethod::default(),
            expected_status: None,
            message: None,
            headers: BTreeMap::new(),
        }
    }

    /// Explicit id, or `host:port` of the target.
    pub fn id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}",
                self.url.host_str().unwrap_or("unknown"),
                self.url.port_or_known_default().unwrap_or(0)
            ),
        }
    }

    pub fn kind(&self) -> Option<ProbeKind> {
        ProbeKind::from_scheme(self.url.scheme())
    }

    pub fn interval(&self, defaults: &MonitorConfig) -> Duration {
        Duration::from_secs(self.interval_secs.unwrap_or(defaults.interval_secs))
    }

    pub fn timeout(&self, defaults: &MonitorConfig) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(defaults.timeout_secs))
    }

    pub fn accepts_status(&self, status: u16) -> bool {
        match &self.expected_status {
            Some(codes) => codes.contains(&status),
            None => (200..300).contains(&status),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// PEM bundle added to the system roots.
    #[serde(default)]
    pub ca_cert_file: Option<PathBuf>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines file every probe result is appended to.
    #[serde(default)]
    pub results_file: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub log_results: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file: None,
            log_results: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() && self.endpoints_url.is_none() {
            bail!("No endpoints configured");
        }

        let m = &self.monitor;
        if m.interval_secs == 0 {
            bail!("monitor.interval_secs must be greater than 0");
        }
        if m.timeout_secs == 0 {
            bail!("monitor.timeout_secs must be greater than 0");
        }
        if m.window_size == 0 {
            bail!("monitor.window_size must be at least 1");
        }
        if m.healthy_threshold == 0 || m.unhealthy_threshold == 0 {
            bail!("health thresholds must be at least 1");
        }
        if !(0.0..=1.0).contains(&m.degraded_success_ratio) {
            bail!(
                "monitor.degraded_success_ratio must be within [0, 1], got {}",
                m.degraded_success_ratio
            );
        }
        if m.max_concurrent_probes == 0 {
            bail!("monitor.max_concurrent_probes must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        validate_endpoints(&self.endpoints)
    }
}

pub fn validate_endpoints(endpoints: &[EndpointConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for endpoint in endpoints {
        let id = endpoint.id();
        if !seen.insert(id.clone()) {
            bail!("Duplicate endpoint id: {}", id);
        }
        if endpoint.kind().is_none() {
            bail!(
                "Endpoint {} uses unsupported scheme '{}'",
                id,
                endpoint.url.scheme()
            );
        }
        if endpoint.url.host_str().is_none() {
            bail!("Endpoint {} has no host", id);
        }
        if endpoint.url.port_or_known_default().is_none() {
            bail!("Endpoint {} needs an explicit port", id);
        }
        if endpoint.interval_secs == Some(0) || endpoint.timeout_secs == Some(0) {
            bail!("Endpoint {} has a zero interval or timeout", id);
        }
    }
    Ok(())
}

fn default_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_window_size() -> usize {
    20
}

fn default_healthy_threshold() -> u32 {
    2
}

fn default_unhealthy_threshold() -> u32 {
    3
}

fn default_degraded_success_ratio() -> f64 {
    0.9
}

fn default_max_concurrent_probes() -> usize {
    64
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    2000
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9090))
}

fn default_true() -> bool {
    true
}
