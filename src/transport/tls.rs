// src/transport/tls.rs
// Trust material shared by the HTTP client, WebSocket connector and downloader.
use crate::config::TlsConfig;
use anyhow::{Context, Result};
use reqwest::redirect::Policy;
use std::path::Path;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    ca_pem: Option<Vec<u8>>,
    accept_invalid_certs: bool,
}

impl TlsMaterial {
    pub fn load(config: &TlsConfig) -> Result<Self> {
        let ca_pem = match &config.ca_cert_file {
            Some(path) => Some(read_pem(path)?),
            None => None,
        };

        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            ca_pem,
            accept_invalid_certs: config.accept_invalid_certs,
        })
    }

    pub fn from_ca_file(path: Option<&Path>) -> Result<Self> {
        Ok(Self {
            ca_pem: path.map(read_pem).transpose()?,
            accept_invalid_certs: false,
        })
    }

    /// Client with peer/host verification, the extra CA root and a redirect limit.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(pem) = &self.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .context("Failed to parse CA certificate bundle")?;
            builder = builder.add_root_certificate(cert);
        }

        builder.build().context("Failed to create HTTP client")
    }

    pub fn native_connector(&self) -> Result<native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();
        builder.danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(pem) = &self.ca_pem {
            let cert = native_tls::Certificate::from_pem(pem)
                .context("Failed to parse CA certificate bundle")?;
            builder.add_root_certificate(cert);
        }

        builder.build().context("Failed to create TLS connector")
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read CA file {}", path.display()))
}
