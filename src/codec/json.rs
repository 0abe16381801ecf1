// src/codec/json.rs
use super::ProbeResult;
use crate::health::HealthReport;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid result on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    JsonPretty,
    Yaml,
}

pub fn encode_result(result: &ProbeResult) -> Result<String, CodecError> {
    Ok(serde_json::to_string(result)?)
}

/// One JSON Lines record, newline included.
pub fn encode_line(result: &ProbeResult) -> Result<Vec<u8>, CodecError> {
    let mut line = serde_json::to_vec(result)?;
    line.push(b'\n');
    Ok(line)
}

pub fn decode_result(input: &str) -> Result<ProbeResult, CodecError> {
    Ok(serde_json::from_str(input)?)
}

pub fn decode_lines(input: &str) -> Result<Vec<ProbeResult>, CodecError> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| CodecError::Line {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

pub fn encode_as<T: Serialize>(value: &T, format: ReportFormat) -> Result<String, CodecError> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string(value)?,
        ReportFormat::JsonPretty => serde_json::to_string_pretty(value)?,
        ReportFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

pub fn encode_report(report: &HealthReport, format: ReportFormat) -> Result<String, CodecError> {
    encode_as(report, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ProbeFailure;
    use crate::transport::ProbeKind;
    use chrono::{TimeZone, Utc};

    fn sample(success: bool) -> ProbeResult {
        ProbeResult {
            endpoint: "api".into(),
            target: "https://example.com/health".into(),
            kind: ProbeKind::Http,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            success,
            latency_ms: 42.5,
            attempts: 1,
            status_code: if success { Some(200) } else { None },
            detail: None,
            error: if success {
                None
            } else {
                Some(ProbeFailure {
                    kind: "timeout".into(),
                    message: "Probe timed out after 5s".into(),
                })
            },
        }
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        let json = encode_result(&sample(true)).unwrap();
        assert!(json.contains(r#""status_code":200"#));
        assert!(json.contains(r#""timestamp":"2024-05-01T12:00:00Z""#));
        assert!(json.contains(r#""kind":"http""#));
        assert!(!json.contains("error"));
        assert!(!json.contains("detail"));

        let json = encode_result(&sample(false)).unwrap();
        assert!(!json.contains("status_code"));
        assert!(json.contains(r#""error":{"kind":"timeout""#));
    }

    #[test]
    fn test_decode_returns_encoded_value() {
        let original = sample(false);
        let decoded = decode_result(&encode_result(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_lines_skips_blanks_and_reports_line() {
        let mut buf = encode_line(&sample(true)).unwrap();
        buf.extend_from_slice(b"\n");
        buf.extend(encode_line(&sample(false)).unwrap());
        let text = String::from_utf8(buf).unwrap();

        let results = decode_lines(&text).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[1].success);

        let broken = format!("{}{{not json}}\n", text);
        match decode_lines(&broken) {
            Err(CodecError::Line { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected line error, got {:?}", other),
        }
    }

    #[test]
    fn test_yaml_report_format() {
        let yaml = encode_as(&sample(true), ReportFormat::Yaml).unwrap();
        assert!(yaml.contains("endpoint: api"));
        let pretty = encode_as(&sample(true), ReportFormat::JsonPretty).unwrap();
        assert!(pretty.contains('\n'));
    }
}
