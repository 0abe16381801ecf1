// src/transport/prober.rs
use super::ProbeError;
use crate::config::EndpointConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Http,
    Tcp,
    WebSocket,
}

impl ProbeKind {
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" | "https" => Some(ProbeKind::Http),
            "tcp" => Some(ProbeKind::Tcp),
            "ws" | "wss" => Some(ProbeKind::WebSocket),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Http => "http",
            ProbeKind::Tcp => "tcp",
            ProbeKind::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSuccess {
    pub latency: Duration,
    pub status_code: Option<u16>,
    /// Peer address, echoed payload, or whatever else the transport learned.
    pub detail: Option<String>,
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        endpoint: &EndpointConfig,
        timeout: Duration,
    ) -> Result<ProbeSuccess, ProbeError>;

    fn kind(&self) -> ProbeKind;
}
