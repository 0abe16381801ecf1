// src/transport/http.rs
use super::error::{chain_has_tls_error, error_chain};
use super::{ProbeError, ProbeKind, ProbeSuccess, Prober, TlsMaterial};
use crate::config::{EndpointConfig, HttpMethod};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};
use tokio::time::timeout;

pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(tls: &TlsMaterial) -> Result<Self> {
        Ok(Self {
            client: tls.http_client()?,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(
        &self,
        endpoint: &EndpointConfig,
        probe_timeout: Duration,
    ) -> Result<ProbeSuccess, ProbeError> {
        let method = match endpoint.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
        };

        let mut request = self
            .client
            .request(method, endpoint.url.clone())
            .timeout(probe_timeout);
        for (name, value) in &endpoint.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        let response = match timeout(probe_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify(e, probe_timeout)),
            Err(_) => return Err(ProbeError::Timeout(probe_timeout)),
        };
        let latency = start.elapsed();

        let status = response.status().as_u16();
        if !endpoint.accepts_status(status) {
            return Err(ProbeError::HttpStatus(status));
        }

        Ok(ProbeSuccess {
            latency,
            status_code: Some(status),
            detail: response.remote_addr().map(|addr| addr.to_string()),
        })
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Http
    }
}

fn classify(err: reqwest::Error, probe_timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout(probe_timeout);
    }
    if chain_has_tls_error(&err) {
        return ProbeError::Tls(error_chain(&err));
    }

    let message = error_chain(&err);
    if err.is_connect() {
        if message.contains("dns error") {
            ProbeError::Resolve(message)
        } else {
            ProbeError::Connect(message)
        }
    } else if err.is_redirect() {
        ProbeError::Protocol(format!("redirect loop: {}", message))
    } else {
        ProbeError::Protocol(message)
    }
}
