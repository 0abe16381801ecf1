// src/transport/mod.rs
mod error;
mod http;
mod prober;
mod tcp;
mod tls;
mod websocket;

pub use error::ProbeError;
pub use http::HttpProber;
pub use prober::{ProbeKind, ProbeSuccess, Prober};
pub use tcp::TcpProber;
pub use tls::TlsMaterial;
pub use websocket::WebSocketProber;

use crate::config::EndpointConfig;
use anyhow::Result;
use std::sync::Arc;

/// One shared prober per transport kind.
#[derive(Clone)]
pub struct ProberSet {
    http: Arc<dyn Prober>,
    tcp: Arc<dyn Prober>,
    websocket: Arc<dyn Prober>,
}

impl ProberSet {
    pub fn new(tls: &TlsMaterial) -> Result<Self> {
        Ok(Self {
            http: Arc::new(HttpProber::new(tls)?),
            tcp: Arc::new(TcpProber::new()),
            websocket: Arc::new(WebSocketProber::new(tls)?),
        })
    }

    pub fn for_kind(&self, kind: ProbeKind) -> Arc<dyn Prober> {
        match kind {
            ProbeKind::Http => self.http.clone(),
            ProbeKind::Tcp => self.tcp.clone(),
            ProbeKind::WebSocket => self.websocket.clone(),
        }
    }

    pub fn for_endpoint(&self, endpoint: &EndpointConfig) -> Option<Arc<dyn Prober>> {
        endpoint.kind().map(|kind| self.for_kind(kind))
    }
}
