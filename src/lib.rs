// src/lib.rs
pub mod codec;
pub mod config;
pub mod download;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod output;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod transport;

pub use monitor::NetworkMonitor;
