// src/output/sink.rs
use crate::codec::{encode_line, CodecError, ProbeResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to encode result: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to write results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn write(&self, result: &ProbeResult) -> Result<(), SinkError>;

    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// Appends one JSON document per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;

        debug!("Writing probe results to {}", path.display());
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    async fn write(&self, result: &ProbeResult) -> Result<(), SinkError> {
        let line = encode_line(result)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.map_err(|e| self.io_error(e))
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|e| self.io_error(e))
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

/// One structured log event per result.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl ResultSink for TracingSink {
    async fn write(&self, result: &ProbeResult) -> Result<(), SinkError> {
        if result.success {
            debug!(
                endpoint = %result.endpoint,
                kind = %result.kind,
                latency_ms = result.latency_ms,
                status = ?result.status_code,
                attempts = result.attempts,
                "probe succeeded"
            );
        } else {
            warn!(
                endpoint = %result.endpoint,
                kind = %result.kind,
                latency_ms = result.latency_ms,
                attempts = result.attempts,
                error = ?result.error_message(),
                "probe failed"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_lines;
    use crate::transport::ProbeKind;
    use chrono::Utc;

    fn result(endpoint: &str) -> ProbeResult {
        ProbeResult {
            endpoint: endpoint.into(),
            target: "https://example.com/".into(),
            kind: ProbeKind::Http,
            timestamp: Utc::now(),
            success: true,
            latency_ms: 1.5,
            attempts: 1,
            status_code: Some(200),
            detail: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.jsonl");

        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.write(&result("a")).await.unwrap();
        sink.write(&result("b")).await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);

        // Reopening appends rather than truncating.
        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.write(&result("c")).await.unwrap();
        sink.flush().await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let decoded = decode_lines(&text).unwrap();
        let ids: Vec<_> = decoded.iter().map(|r| r.endpoint.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        let sink = TracingSink;
        assert!(sink.write(&result("a")).await.is_ok());
        assert_eq!(sink.name(), "tracing");
    }
}
