// src/transport/error.rs
use std::error::Error as StdError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    #[error("DNS resolution failed: {0}")]
    Resolve(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ProbeError {
    /// Stable identifier used in encoded results and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Resolve(_) => "resolve",
            ProbeError::Connect(_) => "connect",
            ProbeError::Tls(_) => "tls",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::HttpStatus(_) => "http_status",
            ProbeError::Protocol(_) => "protocol",
            ProbeError::Io(_) => "io",
        }
    }

    /// Failures worth another attempt within the same sample.
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeError::Resolve(_)
            | ProbeError::Connect(_)
            | ProbeError::Timeout(_)
            | ProbeError::Io(_) => true,
            ProbeError::HttpStatus(code) => is_retryable_status(*code),
            ProbeError::Tls(_) | ProbeError::Protocol(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}

fn is_retryable_status(code: u16) -> bool {
    match code {
        408 | 429 => true,
        500..=599 => true,
        _ => false,
    }
}

pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

pub(crate) fn chain_has_tls_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<native_tls::Error>().is_some() {
            return true;
        }
        current = e.source();
    }
    false
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::Io(err.to_string())
    }
}
