// src/output/mod.rs
mod sink;

pub use sink::{JsonLinesSink, ResultSink, SinkError, TracingSink};
