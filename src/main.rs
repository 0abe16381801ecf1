// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use url::Url;

use network_monitor::{
    codec::{encode_as, ReportFormat},
    config::{self, EndpointConfig, RetryConfig, TlsConfig},
    download::download_file,
    monitor::probe_once,
    NetworkMonitor,
};

#[derive(Debug, Parser)]
#[command(name = "network-monitor", version, about = "Samples endpoint health over HTTP, TCP and WebSocket")]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info", env = "NETMON_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor every configured endpoint until interrupted
    Run {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
    /// Probe one URL and print the result as JSON
    Probe {
        url: Url,
        #[arg(long, default_value_t = 5)]
        timeout: u64,
        #[arg(long)]
        ca_cert: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Download a file over HTTP(S)
    Download {
        url: Url,
        destination: PathBuf,
        #[arg(long)]
        ca_cert: Option<PathBuf>,
    },
    /// Validate a config file and exit
    CheckConfig {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "network_monitor={},hyper=info",
            cli.log_level
        ))
    })?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Run { config } => run(config).await,
        Command::Probe {
            url,
            timeout,
            ca_cert,
            pretty,
        } => probe(url, timeout, ca_cert, pretty).await,
        Command::Download {
            url,
            destination,
            ca_cert,
        } => {
            download_file(&url, &destination, ca_cert.as_deref()).await?;
            Ok(())
        }
        Command::CheckConfig { config } => {
            let loaded = config::load_config(&config).await?;
            println!(
                "{} is valid ({} endpoints{})",
                config.display(),
                loaded.endpoints.len(),
                if loaded.endpoints_url.is_some() {
                    " plus a remote list"
                } else {
                    ""
                }
            );
            Ok(())
        }
    }
}

async fn run(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from: {}", config_path.display());
    let config = config::load_config(&config_path).await?;

    let monitor = NetworkMonitor::new(config)
        .await
        .context("Failed to start monitor")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    monitor.run(shutdown_rx).await
}

async fn probe(url: Url, timeout: u64, ca_cert: Option<PathBuf>, pretty: bool) -> Result<()> {
    let tls = TlsConfig {
        ca_cert_file: ca_cert,
        ..TlsConfig::default()
    };
    let result = probe_once(
        EndpointConfig::new(url),
        &tls,
        RetryConfig::default(),
        Duration::from_secs(timeout.max(1)),
    )
    .await?;

    let format = if pretty {
        ReportFormat::JsonPretty
    } else {
        ReportFormat::Json
    };
    println!("{}", encode_as(&result, format)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
