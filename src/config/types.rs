use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the transcoding engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ffmpeg program (name on PATH or absolute path)
    pub ffmpeg: PathBuf,
    /// ffprobe program (name on PATH or absolute path)
    pub ffprobe: PathBuf,
    /// Seconds without a progress line before the encoder is considered stuck
    pub stall_timeout_secs: u64,
    /// Minimum fraction advance between two progress events
    pub min_progress_delta: f64,
    /// How long to wait for ffmpeg to exit after it has been killed
    pub kill_grace_ms: u64,
}

impl EngineConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            stall_timeout_secs: 180,
            min_progress_delta: 0.01,
            kill_grace_ms: 5000,
        }
    }
}

/// Where working files and results are placed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Suffix appended to the file stem of compressed outputs
    pub suffix: String,
    /// Directory for downloaded inputs and in-progress outputs
    pub work_dir: PathBuf,
    /// Directory compressed files are delivered to
    pub upload_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_compressed".to_string(),
            work_dir: PathBuf::from("downloads"),
            upload_dir: PathBuf::from("compressed"),
        }
    }
}
