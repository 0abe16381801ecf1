// src/health/mod.rs
mod aggregator;
mod state;
mod window;

pub use aggregator::{EndpointHealth, HealthAggregator, HealthReport, StateCounts, StateTransition};
pub use state::{HealthPolicy, HealthState};
pub use window::{LatencyStats, RollingWindow, Sample};
