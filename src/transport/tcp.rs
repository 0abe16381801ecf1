// src/transport/tcp.rs
use super::{ProbeError, ProbeKind, ProbeSuccess, Prober};
use crate::config::EndpointConfig;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use url::Url;

/// Resolve plus TCP connect; latency covers both.
#[derive(Debug, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

/// Resolves the URL's `host:port` and opens a TCP connection to the first
/// address. DNS failures map to `Resolve`, connect failures to `Connect`.
pub(crate) async fn open_stream(url: &Url) -> Result<(TcpStream, SocketAddr), ProbeError> {
    let host = url
        .host_str()
        .ok_or_else(|| ProbeError::Resolve("missing host".to_string()))?;
    // IPv6 literals come back bracketed from the URL.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ProbeError::Protocol("TCP endpoint requires a port".to_string()))?;

    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| ProbeError::Resolve(format!("{}: {}", host, e)))?;
    let addr = addrs
        .next()
        .ok_or_else(|| ProbeError::Resolve(format!("no addresses for {}", host)))?;

    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ProbeError::Connect(format!("{}: {}", addr, e)))?;

    Ok((stream, addr))
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(
        &self,
        endpoint: &EndpointConfig,
        probe_timeout: Duration,
    ) -> Result<ProbeSuccess, ProbeError> {
        let start = Instant::now();
        match timeout(probe_timeout, open_stream(&endpoint.url)).await {
            Ok(Ok((_stream, addr))) => Ok(ProbeSuccess {
                latency: start.elapsed(),
                status_code: None,
                detail: Some(addr.to_string()),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProbeError::Timeout(probe_timeout)),
        }
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Tcp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn endpoint(url: &str) -> EndpointConfig {
        EndpointConfig::new(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_connects_to_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = TcpProber::new()
            .probe(&endpoint(&format!("tcp://{}", addr)), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(result.detail, Some(addr.to_string()));
        assert_eq!(result.status_code, None);
    }

    #[tokio::test]
    async fn test_closed_port_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = TcpProber::new()
            .probe(&endpoint(&format!("tcp://{}", addr)), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Connect(_)));
    }

    #[tokio::test]
    async fn test_unknown_host_is_resolve_error() {
        let err = TcpProber::new()
            .probe(&endpoint("tcp://no-such-host.invalid:80"), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "resolve");
    }

    #[tokio::test]
    async fn test_missing_port() {
        let err = TcpProber::new()
            .probe(&endpoint("tcp://localhost"), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Protocol(_)));
    }
}
