use std::time::Duration;
use thiserror::Error;

/// Errors raised outside the encoding pipeline (config, probing, transfers)
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Why a transcode ended in the `Failed` state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    #[error("failed to start ffmpeg: {0}")]
    Spawn(String),

    #[error("no progress from ffmpeg for {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("ffmpeg exited with {status} or produced no output: {detail}")]
    NonZeroExitOrMissingOutput { status: String, detail: String },

    #[error("I/O error during encoding: {0}")]
    Io(String),

    #[error("queue state error: {0}")]
    QueueState(String),
}

impl FailureReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout(_))
    }
}
