// src/scheduler/sampler.rs
use crate::codec::ProbeResult;
use crate::config::{EndpointConfig, MonitorConfig};
use crate::retry::RetryStrategy;
use crate::transport::{ProbeKind, Prober};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Everything needed to sample one endpoint.
#[derive(Clone)]
pub struct SampleJob {
    pub endpoint: EndpointConfig,
    pub kind: ProbeKind,
    pub prober: Arc<dyn Prober>,
    pub interval: Duration,
    pub timeout: Duration,
}

impl SampleJob {
    pub fn new(endpoint: EndpointConfig, prober: Arc<dyn Prober>, defaults: &MonitorConfig) -> Self {
        Self {
            kind: prober.kind(),
            interval: endpoint.interval(defaults),
            timeout: endpoint.timeout(defaults),
            endpoint,
            prober,
        }
    }

    pub fn id(&self) -> String {
        self.endpoint.id()
    }
}

/// Probes once (with retries) and packages the outcome.
pub async fn sample_once(job: &SampleJob, retry: &RetryStrategy) -> ProbeResult {
    let started_at = Utc::now();
    let start = std::time::Instant::now();

    let (outcome, attempts) = retry
        .execute_counted(
            || job.prober.probe(&job.endpoint, job.timeout),
            RetryStrategy::probe_decision,
        )
        .await;

    ProbeResult::from_outcome(
        &job.endpoint,
        job.kind,
        &outcome,
        attempts,
        started_at,
        start.elapsed(),
    )
}

pub(crate) struct SamplerTask {
    pub job: SampleJob,
    pub retry: RetryStrategy,
    pub limiter: Arc<Semaphore>,
    pub first_delay: Duration,
    pub results: mpsc::Sender<ProbeResult>,
    pub shutdown: watch::Receiver<bool>,
}

impl SamplerTask {
    pub(crate) async fn run(self) {
        let SamplerTask {
            job,
            retry,
            limiter,
            first_delay,
            results,
            mut shutdown,
        } = self;

        let id = job.id();
        if *shutdown.borrow() {
            return;
        }

        let mut ticker = interval_at(Instant::now() + first_delay, job.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            endpoint = %id,
            interval = ?job.interval,
            first_delay = ?first_delay,
            "Sampler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let sample = async {
                let _permit = limiter.acquire().await.ok()?;
                Some(sample_once(&job, &retry).await)
            };

            // Shutdown cancels an in-flight probe.
            let result = tokio::select! {
                result = sample => result,
                _ = shutdown.changed() => break,
            };

            let Some(result) = result else {
                debug!(endpoint = %id, "Probe limiter closed");
                break;
            };

            if results.send(result).await.is_err() {
                debug!(endpoint = %id, "Results channel closed");
                break;
            }
        }

        info!(endpoint = %id, "Sampler stopped");
    }
}
