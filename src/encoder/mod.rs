pub mod command_builder;
pub mod ffmpeg;
pub mod progress;

pub use command_builder::build_ffmpeg_args;
pub use ffmpeg::{EncodeResult, ProgressCallback, TranscodeEngine, TranscodeResult, reduction_percent};
pub use progress::{ProgressEvent, ProgressField, ProgressState, ProgressTracker, parse_line};
