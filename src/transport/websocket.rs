// src/transport/websocket.rs
// WebSocket handshake (TLS for wss://), optional echo check, then close.
use super::error::error_chain;
use super::tcp::open_stream;
use super::{ProbeError, ProbeKind, ProbeSuccess, Prober, TlsMaterial};
use crate::config::EndpointConfig;
use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{client_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SWITCHING_PROTOCOLS: u16 = 101;

pub struct WebSocketProber {
    connector: native_tls::TlsConnector,
}

impl WebSocketProber {
    pub fn new(tls: &TlsMaterial) -> Result<Self> {
        Ok(Self {
            connector: tls.native_connector()?,
        })
    }

    async fn exchange(&self, endpoint: &EndpointConfig) -> Result<Option<String>, ProbeError> {
        // Resolve and connect like a TCP check so failures classify the same way.
        let (stream, _addr) = open_stream(&endpoint.url).await?;

        // SNI comes from the URL host.
        let connector = Connector::NativeTls(self.connector.clone());
        let (mut ws, _response) =
            client_async_tls_with_config(endpoint.url.as_str(), stream, None, Some(connector))
                .await
                .map_err(classify)?;

        let outcome = match &endpoint.message {
            Some(payload) => echo(&mut ws, payload).await.map(Some),
            None => Ok(None),
        };

        if let Err(e) = ws.close(None).await {
            debug!(endpoint = %endpoint.id(), error = %e, "websocket close failed");
        }

        outcome
    }
}

async fn echo(ws: &mut WsStream, payload: &str) -> Result<String, ProbeError> {
    ws.send(Message::Text(payload.to_string()))
        .await
        .map_err(classify)?;

    while let Some(frame) = ws.next().await {
        match frame.map_err(classify)? {
            Message::Text(reply) => {
                return if reply == payload {
                    Ok(reply)
                } else {
                    Err(ProbeError::Protocol(format!("unexpected reply: {}", reply)))
                };
            }
            Message::Binary(_) => {
                return Err(ProbeError::Protocol("unexpected binary reply".to_string()))
            }
            Message::Close(_) => {
                return Err(ProbeError::Protocol(
                    "connection closed before reply".to_string(),
                ))
            }
            // ping/pong/raw frames
            _ => continue,
        }
    }

    Err(ProbeError::Protocol("stream ended before reply".to_string()))
}

fn classify(err: tungstenite::Error) -> ProbeError {
    match err {
        tungstenite::Error::Io(e) => ProbeError::Connect(e.to_string()),
        tungstenite::Error::Tls(e) => ProbeError::Tls(error_chain(&e)),
        tungstenite::Error::Http(response) => ProbeError::HttpStatus(response.status().as_u16()),
        other => ProbeError::Protocol(other.to_string()),
    }
}

#[async_trait]
impl Prober for WebSocketProber {
    async fn probe(
        &self,
        endpoint: &EndpointConfig,
        probe_timeout: Duration,
    ) -> Result<ProbeSuccess, ProbeError> {
        let start = Instant::now();
        match timeout(probe_timeout, self.exchange(endpoint)).await {
            Ok(Ok(detail)) => Ok(ProbeSuccess {
                latency: start.elapsed(),
                status_code: Some(SWITCHING_PROTOCOLS),
                detail,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProbeError::Timeout(probe_timeout)),
        }
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::WebSocket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use url::Url;

    /// Accepts one connection and answers every text frame with `reply`
    /// (or the frame itself when `reply` is None).
    async fn spawn_server(reply: Option<&'static str>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => {
                        let answer = reply.map(str::to_string).unwrap_or(text);
                        if ws.send(Message::Text(answer)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        addr
    }

    fn endpoint(addr: SocketAddr, message: Option<&str>) -> EndpointConfig {
        let mut ep = EndpointConfig::new(Url::parse(&format!("ws://{}/echo", addr)).unwrap());
        ep.message = message.map(str::to_string);
        ep
    }

    #[tokio::test]
    async fn test_echo_roundtrip() {
        let addr = spawn_server(None).await;
        let prober = WebSocketProber::new(&TlsMaterial::default()).unwrap();

        let result = prober
            .probe(&endpoint(addr, Some("Hello WebSocket")), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(result.status_code, Some(101));
        assert_eq!(result.detail.as_deref(), Some("Hello WebSocket"));
    }

    #[tokio::test]
    async fn test_handshake_only() {
        let addr = spawn_server(None).await;
        let prober = WebSocketProber::new(&TlsMaterial::default()).unwrap();

        let result = prober
            .probe(&endpoint(addr, None), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(result.detail, None);
    }

    #[tokio::test]
    async fn test_mismatched_reply() {
        let addr = spawn_server(Some("ERROR")).await;
        let prober = WebSocketProber::new(&TlsMaterial::default()).unwrap();

        let err = prober
            .probe(&endpoint(addr, Some("ping")), Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        // Accepts the TCP connection but never answers the upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            futures::future::pending::<()>().await;
        });

        let prober = WebSocketProber::new(&TlsMaterial::default()).unwrap();
        let err = prober
            .probe(&endpoint(addr, None), Duration::from_millis(300))
            .await
            .unwrap_err();

        assert_eq!(err, ProbeError::Timeout(Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn test_unknown_host_is_resolve_error() {
        let ep = EndpointConfig::new(Url::parse("ws://no-such-host.invalid/socket").unwrap());
        let prober = WebSocketProber::new(&TlsMaterial::default()).unwrap();

        let err = prober.probe(&ep, Duration::from_secs(5)).await.unwrap_err();

        assert_eq!(err.kind(), "resolve");
    }
}
