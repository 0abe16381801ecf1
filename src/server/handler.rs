// src/server/handler.rs
use crate::codec::{encode_as, encode_report, ReportFormat};
use crate::health::HealthAggregator;
use crate::metrics::MetricsRegistry;
use hyper::{header, Body, Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serves the health report and Prometheus metrics.
#[derive(Clone)]
pub struct StatusHandler {
    aggregator: Arc<HealthAggregator>,
    metrics: Arc<MetricsRegistry>,
}

impl StatusHandler {
    pub fn new(aggregator: Arc<HealthAggregator>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            aggregator,
            metrics,
        }
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, BoxError> {
        if req.method() != Method::GET {
            return not_found();
        }

        let path = req.uri().path();
        match path {
            "/health" => {
                let report = self.aggregator.report().await;
                json(StatusCode::OK, encode_report(&report, ReportFormat::Json)?)
            }
            "/metrics" => {
                let body = self.metrics.gather().map_err(BoxError::from)?;
                Ok(Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                    .body(Body::from(body))?)
            }
            _ => match path.strip_prefix("/health/").and_then(endpoint_id) {
                Some(id) => match self.aggregator.snapshot(&id).await {
                    Some(health) => json(StatusCode::OK, encode_as(&health, ReportFormat::Json)?),
                    None => not_found(),
                },
                None => not_found(),
            },
        }
    }
}

/// Percent-decoded endpoint id from the last path segment.
fn endpoint_id(segment: &str) -> Option<String> {
    let id = percent_decode_str(segment).decode_utf8().ok()?;
    (!id.is_empty()).then(|| id.into_owned())
}

fn json(status: StatusCode, body: String) -> Result<Response<Body>, BoxError> {
    Ok(Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))?)
}

fn not_found() -> Result<Response<Body>, BoxError> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from("Not Found"))?)
}

impl Service<Request<Body>> for StatusHandler {
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move {
            let path = req.uri().path().to_string();
            handler.route(req).await.map_err(|e| {
                tracing::error!(%path, %e, "status request failed");
                e
            })
        })
    }
}
