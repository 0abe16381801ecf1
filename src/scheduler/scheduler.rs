// src/scheduler/scheduler.rs
use super::sampler::{SampleJob, SamplerTask};
use crate::codec::ProbeResult;
use crate::retry::RetryStrategy;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Scheduler {
    jobs: Vec<SampleJob>,
    retry: RetryStrategy,
    max_concurrent: usize,
    jitter: bool,
}

impl Scheduler {
    pub fn new(retry: RetryStrategy, max_concurrent: usize, jitter: bool) -> Self {
        Self {
            jobs: Vec::new(),
            retry,
            max_concurrent: max_concurrent.max(1),
            jitter,
        }
    }

    pub fn with_job(mut self, job: SampleJob) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn add_job(&mut self, job: SampleJob) {
        self.jobs.push(job);
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Spawns one task per endpoint; each ticks on its own interval.
    pub fn start(self, results: mpsc::Sender<ProbeResult>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let limiter = Arc::new(Semaphore::new(self.max_concurrent));

        info!(
            "Starting scheduler for {} endpoints (max {} concurrent probes)",
            self.jobs.len(),
            self.max_concurrent
        );

        let mut tasks = Vec::with_capacity(self.jobs.len());
        for job in self.jobs {
            let id = job.id();
            let first_delay = if self.jitter {
                first_tick_offset(job.interval)
            } else {
                Duration::ZERO
            };

            let task = SamplerTask {
                job,
                retry: self.retry.clone(),
                limiter: limiter.clone(),
                first_delay,
                results: results.clone(),
                shutdown: shutdown_rx.clone(),
            };
            tasks.push((id, tokio::spawn(task.run())));
        }

        SchedulerHandle {
            shutdown_tx,
            tasks,
        }
    }
}

/// Random offset in `[0, interval)` so endpoints sharing an interval spread out.
fn first_tick_offset(interval: Duration) -> Duration {
    let millis = interval.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..millis))
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every sampler task to exit.
    pub async fn join(self) {
        for (id, task) in self.tasks {
            if let Err(e) = task.await {
                error!("Sampler task for {} failed: {}", id, e);
            }
        }
    }
}
