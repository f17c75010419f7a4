//! Per-owner video compression queue driving ffmpeg.
//!
//! Submissions are queued per owner and encoded one at a time per owner,
//! with owners running in parallel. Progress is streamed as
//! [`encoder::ProgressEvent`]s and a running job can be cancelled.

pub mod analyzer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod presets;
pub mod queue;
pub mod transfer;
pub mod utils;

#[cfg(all(test, unix))]
mod test_support;

pub use config::AppConfig;
pub use encoder::{EncodeResult, ProgressEvent, TranscodeEngine, TranscodeResult};
pub use error::{AppError, FailureReason};
pub use presets::{PresetPreferences, QualityPreset};
pub use queue::{JobDispatcher, OwnerId, WorkerMessage};
