// src/monitor.rs
use crate::codec::ProbeResult;
use crate::config::{Config, EndpointConfig, RetryConfig, TlsConfig};
use crate::download::fetch_endpoints;
use crate::health::{HealthAggregator, HealthPolicy, HealthState};
use crate::metrics::{MetricsCollector, MetricsRegistry};
use crate::output::{JsonLinesSink, ResultSink, TracingSink};
use crate::retry::RetryStrategy;
use crate::scheduler::{sample_once, SampleJob, Scheduler};
use crate::server::{ServerBuilder, StatusHandler};
use crate::transport::{ProberSet, TlsMaterial};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Results queued between samplers and the aggregator.
pub const RESULTS_CHANNEL_CAPACITY: usize = 1024;

pub struct NetworkMonitor {
    config: Config,
    endpoints: Vec<EndpointConfig>,
    probers: ProberSet,
    aggregator: Arc<HealthAggregator>,
    metrics: Arc<MetricsRegistry>,
    sinks: Vec<Box<dyn ResultSink>>,
}

impl NetworkMonitor {
    pub async fn new(config: Config) -> Result<Self> {
        let tls = TlsMaterial::load(&config.tls)?;
        let probers = ProberSet::new(&tls)?;

        let mut endpoints = config.endpoints.clone();
        if let Some(url) = &config.endpoints_url {
            match fetch_endpoints(url, config.tls.ca_cert_file.as_deref()).await {
                Ok(remote) => endpoints = merge_endpoints(endpoints, remote),
                Err(e) if !endpoints.is_empty() => {
                    warn!("Using local endpoints only: {}", e);
                }
                Err(e) => return Err(e).context("Failed to fetch endpoint list"),
            }
        }
        if endpoints.is_empty() {
            bail!("No endpoints to monitor");
        }

        let aggregator = Arc::new(HealthAggregator::new(
            HealthPolicy::from(&config.monitor),
            config.monitor.window_size,
        ));
        let metrics = Arc::new(MetricsRegistry::new()?);
        let collector = metrics.collector();
        for endpoint in &endpoints {
            let id = endpoint.id();
            aggregator.register(&id);
            collector.update_endpoint_state(&id, HealthState::Unknown);
        }
        collector.update_endpoint_counts(&aggregator.counts().await);

        let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
        if config.output.log_results {
            sinks.push(Box::new(TracingSink));
        }
        if let Some(path) = &config.output.results_file {
            sinks.push(Box::new(JsonLinesSink::open(path).await?));
        }

        Ok(Self {
            config,
            endpoints,
            probers,
            aggregator,
            metrics,
            sinks,
        })
    }

    pub fn endpoints(&self) -> &[EndpointConfig] {
        &self.endpoints
    }

    pub fn aggregator(&self) -> Arc<HealthAggregator> {
        self.aggregator.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    /// Samples every endpoint until `shutdown` flips to true, then drains
    /// queued results and flushes the sinks.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let NetworkMonitor {
            config,
            endpoints,
            probers,
            aggregator,
            metrics,
            sinks,
        } = self;

        let mut scheduler = Scheduler::new(
            RetryStrategy::new(config.retry.clone()),
            config.monitor.max_concurrent_probes,
            config.monitor.jitter,
        );
        for endpoint in endpoints {
            match probers.for_endpoint(&endpoint) {
                Some(prober) => {
                    scheduler.add_job(SampleJob::new(endpoint, prober, &config.monitor))
                }
                None => warn!("Skipping {}: unsupported scheme", endpoint.url),
            }
        }

        // Bind before any task starts so a taken port fails start-up.
        let status_listener = if config.server.enabled {
            let addr = config.server.listen;
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind status server on {}", addr))?;
            Some(listener)
        } else {
            None
        };

        let (tx, rx) = mpsc::channel(RESULTS_CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump_results(
            rx,
            aggregator.clone(),
            metrics.collector(),
            sinks,
        ));
        let samplers = scheduler.start(tx);

        let server = status_listener.map(|listener| {
            let builder = ServerBuilder::new(config.server.listen)
                .with_handler(StatusHandler::new(aggregator.clone(), metrics.clone()));
            tokio::spawn(builder.serve_on(listener, shutdown.clone()))
        });

        info!("Monitoring {} endpoints", samplers.len());

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        info!("Stopping monitor");
        samplers.shutdown();
        samplers.join().await;

        match pump.await {
            Ok(processed) => debug!("Result pump finished after {} results", processed),
            Err(e) => error!("Result pump failed: {}", e),
        }

        if let Some(server) = server {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Status server error: {:#}", e),
                Err(e) => error!("Status server task failed: {}", e),
            }
        }

        Ok(())
    }
}

/// Feeds results into the aggregator, metrics and sinks until every sender
/// is gone. Returns the number of results handled.
async fn pump_results(
    mut results: mpsc::Receiver<ProbeResult>,
    aggregator: Arc<HealthAggregator>,
    metrics: Arc<MetricsCollector>,
    sinks: Vec<Box<dyn ResultSink>>,
) -> u64 {
    let mut processed = 0;

    while let Some(result) = results.recv().await {
        metrics.record_probe(&result);

        if let Some(transition) = aggregator.record(&result).await {
            metrics.record_transition(&transition.endpoint, transition.to);
            metrics.update_endpoint_counts(&aggregator.counts().await);
        }

        for sink in &sinks {
            if let Err(e) = sink.write(&result).await {
                error!(sink = sink.name(), "Failed to write result: {}", e);
            }
        }
        processed += 1;

        if results.is_empty() {
            flush_sinks(&sinks).await;
        }
    }

    flush_sinks(&sinks).await;
    processed
}

async fn flush_sinks(sinks: &[Box<dyn ResultSink>]) {
    for sink in sinks {
        if let Err(e) = sink.flush().await {
            error!(sink = sink.name(), "Failed to flush results: {}", e);
        }
    }
}

/// Appends remote endpoints whose ids are not already defined locally.
pub fn merge_endpoints(
    local: Vec<EndpointConfig>,
    remote: Vec<EndpointConfig>,
) -> Vec<EndpointConfig> {
    let mut seen: HashSet<String> = local.iter().map(EndpointConfig::id).collect();
    let mut merged = local;

    for endpoint in remote {
        if seen.insert(endpoint.id()) {
            merged.push(endpoint);
        } else {
            debug!("Ignoring remote endpoint {}: defined locally", endpoint.id());
        }
    }
    merged
}

/// Probes a single endpoint once, outside any scheduler.
pub async fn probe_once(
    endpoint: EndpointConfig,
    tls: &TlsConfig,
    retry: RetryConfig,
    timeout: Duration,
) -> Result<ProbeResult> {
    let probers = ProberSet::new(&TlsMaterial::load(tls)?)?;
    let Some(prober) = probers.for_endpoint(&endpoint) else {
        bail!("Unsupported scheme: {}", endpoint.url.scheme());
    };

    let mut job = SampleJob::new(endpoint, prober, &Default::default());
    job.timeout = timeout;
    Ok(sample_once(&job, &RetryStrategy::new(retry)).await)
}
