use crate::error::AppError;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Read the container duration of a media file, in seconds
pub async fn probe_duration(ffprobe: &Path, input: &Path) -> Result<f64, AppError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| AppError::Analysis(format!("Failed to execute ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Analysis(format!(
            "ffprobe failed: {}",
            stderr.trim()
        )));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Extract `format.duration` from ffprobe JSON output
pub fn parse_duration(json: &str) -> Result<f64, AppError> {
    let data: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::Analysis(format!("Failed to parse ffprobe output: {}", e)))?;

    data.format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .ok_or_else(|| AppError::Analysis("No duration in ffprobe output".to_string()))
}

// JSON deserialization structures

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = r#"{ "format": { "duration": "93.480000" } }"#;
        assert!((parse_duration(json).unwrap() - 93.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_missing() {
        assert!(parse_duration(r#"{ "format": {} }"#).is_err());
        assert!(parse_duration(r#"{}"#).is_err());
        assert!(parse_duration(r#"{ "format": { "duration": "N/A" } }"#).is_err());
        assert!(parse_duration("not json").is_err());
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let result = probe_duration(
            Path::new("/nonexistent/ffprobe-binary"),
            Path::new("input.mp4"),
        )
        .await;
        assert!(matches!(result, Err(AppError::Analysis(_))));
    }
}
