// src/download/mod.rs
// HTTPS file download with a custom CA bundle, plus lenient JSON file parsing.
use crate::config::{validate_endpoints, EndpointConfig};
use crate::transport::TlsMaterial;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Failed to set up HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: Url, status: u16 },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid endpoint list from {url}: {reason}")]
    InvalidEndpoints { url: Url, reason: String },
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    endpoints: Vec<EndpointConfig>,
}

/// Streams `url` into `destination`. A partial file is removed on failure.
pub async fn download_file(
    url: &Url,
    destination: &Path,
    ca_cert_file: Option<&Path>,
) -> Result<(), DownloadError> {
    let client = client_for(ca_cert_file)?;

    match fetch_to_file(&client, url, destination).await {
        Ok(bytes) => {
            info!("Downloaded {} ({} bytes) to {}", url, bytes, destination.display());
            Ok(())
        }
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(destination).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial download {}: {}", destination.display(), rm);
                }
            }
            Err(e)
        }
    }
}

async fn fetch_to_file(
    client: &reqwest::Client,
    url: &Url,
    destination: &Path,
) -> Result<u64, DownloadError> {
    let mut response = send(client, url).await?;

    let io_err = |source| DownloadError::Io {
        path: destination.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(destination).await.map_err(io_err)?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| DownloadError::Request {
            url: url.clone(),
            source,
        })?
    {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;

    Ok(written)
}

async fn send(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, DownloadError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| DownloadError::Request {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.clone(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn client_for(ca_cert_file: Option<&Path>) -> Result<reqwest::Client, DownloadError> {
    TlsMaterial::from_ca_file(ca_cert_file)
        .and_then(|tls| tls.http_client())
        .map_err(|e| DownloadError::Client(format!("{:#}", e)))
}

/// Parses a JSON file, yielding an empty object when the file is missing
/// or not valid JSON.
pub async fn parse_json_file(source: &Path) -> Value {
    let empty = || Value::Object(Default::default());

    let contents = match tokio::fs::read_to_string(source).await {
        Ok(contents) => contents,
        Err(e) => {
            debug!("Cannot read {}: {}", source.display(), e);
            return empty();
        }
    };

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        debug!("Cannot parse {}: {}", source.display(), e);
        empty()
    })
}

/// Fetches a `{"endpoints": [...]}` document and validates it.
pub async fn fetch_endpoints(
    url: &Url,
    ca_cert_file: Option<&Path>,
) -> Result<Vec<EndpointConfig>, DownloadError> {
    let client = client_for(ca_cert_file)?;
    let body = send(&client, url)
        .await?
        .bytes()
        .await
        .map_err(|source| DownloadError::Request {
            url: url.clone(),
            source,
        })?;

    let invalid = |reason: String| DownloadError::InvalidEndpoints {
        url: url.clone(),
        reason,
    };
    let list: EndpointList = serde_json::from_slice(&body).map_err(|e| invalid(e.to_string()))?;
    validate_endpoints(&list.endpoints).map_err(|e| invalid(e.to_string()))?;

    info!("Fetched {} endpoints from {}", list.endpoints.len(), url);
    Ok(list.endpoints)
}
