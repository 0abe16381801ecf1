// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `NETMON__MONITOR__INTERVAL_SECS=10`.
pub const ENV_PREFIX: &str = "NETMON";

/// Load configuration from a file (YAML or JSON), then apply environment overrides
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, format_for(path))?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config(contents: &str, format: FileFormat) -> Result<Config> {
    config::Config::builder()
        .add_source(File::from_str(contents, format))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to parse config")?
        .try_deserialize()
        .context("Invalid config structure")
}

fn format_for(path: &Path) -> FileFormat {
    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        _ => FileFormat::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
monitor:
  interval_secs: 10
  window_size: 5
endpoints:
  - id: api
    url: https://example.com/health
    expected_status: [200, 204]
  - url: tcp://db.internal:5432
    interval_secs: 3
"#;

    #[test]
    fn test_parse_yaml() {
        let config = parse_config(YAML, FileFormat::Yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.monitor.interval_secs, 10);
        assert_eq!(config.monitor.window_size, 5);
        assert_eq!(config.monitor.timeout_secs, 5);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.endpoints[0].id(), "api");
        assert_eq!(config.endpoints[1].id(), "db.internal:5432");
        assert_eq!(config.endpoints[1].interval_secs, Some(3));
        assert!(!config.server.enabled);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"endpoints": [{"url": "wss://example.com/echo", "message": "ping"}]}"#;
        let config = parse_config(json, FileFormat::Json).unwrap();
        assert_eq!(config.endpoints[0].message.as_deref(), Some("ping"));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.yml");
        tokio::fs::write(&path, YAML).await.unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.endpoints.len(), 2);
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/monitor.yaml").await.is_err());
    }
}
