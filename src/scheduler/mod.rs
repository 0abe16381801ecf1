// src/scheduler/mod.rs
mod sampler;
mod scheduler;

pub use sampler::{sample_once, SampleJob};
pub use scheduler::{Scheduler, SchedulerHandle};
