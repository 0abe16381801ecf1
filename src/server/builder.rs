// src/server/builder.rs
use anyhow::{Context, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::Service;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder so the monitor can inject its status handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Binds the configured address and serves until `shutdown` flips to true.
    pub async fn serve(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind status server on {}", self.addr))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let handler = self
            .handler
            .context("Status server handler must be set via with_handler()")?;
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!("Status server listening on http://{}", local);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        // e.g. EMFILE; back off instead of spinning
                        tracing::warn!(%err, "status server accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            let svc = handler.clone();

            tokio::spawn(async move {
                if let Err(err) = Http::new().serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "status connection error");
                }
            });
        }

        tracing::info!("Status server on {} stopped", local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthAggregator, HealthPolicy};
    use crate::metrics::MetricsRegistry;
    use crate::server::StatusHandler;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn handler() -> StatusHandler {
        let aggregator = Arc::new(HealthAggregator::new(HealthPolicy::default(), 5));
        aggregator.register("db");
        StatusHandler::new(aggregator, Arc::new(MetricsRegistry::new().unwrap()))
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);

        let server = tokio::spawn(
            ServerBuilder::new(addr)
                .with_handler(handler())
                .serve_on(listener, rx),
        );

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health/db HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#""endpoint":"db""#));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_keeps_serving_after_aborted_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);

        let server = tokio::spawn(
            ServerBuilder::new(addr)
                .with_handler(handler())
                .serve_on(listener, rx),
        );

        for _ in 0..20 {
            let stream = TcpStream::connect(addr).await.unwrap();
            stream.set_linger(Some(Duration::ZERO)).unwrap();
            drop(stream);
        }

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(!server.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_handler_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_tx, rx) = watch::channel(false);

        let result = ServerBuilder::<StatusHandler>::new(addr)
            .serve_on(listener, rx)
            .await;
        assert!(result.is_err());
    }
}
