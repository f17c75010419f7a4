use crate::analyzer;
use crate::config::EngineConfig;
use crate::encoder::command_builder::build_ffmpeg_args;
use crate::encoder::progress::{
    ProgressEvent, ProgressField, ProgressState, ProgressTracker, parse_line,
};
use crate::error::FailureReason;
use crate::presets::get_preset;
use crate::queue::Job;
use crate::utils::format_file_size;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Duration assumed when the input cannot be probed
const FALLBACK_DURATION_SECS: f64 = 1.0;

/// Progress callback type
pub type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;

/// Statistics for a finished transcode
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeResult {
    pub original_size: u64,
    pub compressed_size: u64,
    pub reduction_percent: f64,
    /// Duration of the output as reported by ffprobe, 0 if unknown
    pub output_duration_secs: f64,
    pub preset_display_name: String,
}

impl TranscodeResult {
    pub fn original_size_str(&self) -> String {
        format_file_size(self.original_size)
    }

    pub fn compressed_size_str(&self) -> String {
        format_file_size(self.compressed_size)
    }
}

/// Encoding result; exactly one per job
#[derive(Debug)]
pub enum EncodeResult {
    /// Encoding completed successfully
    Success(TranscodeResult),
    /// Encoding was cancelled by the owner
    Cancelled,
    /// Encoding failed
    Failed(FailureReason),
}

/// Percentage of the original size saved, 0 for an empty original
pub fn reduction_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64 * 100.0
}

/// How reading the progress stream ended
enum StreamEnd {
    Eof,
    Cancelled,
    Stalled,
    ReadError(std::io::Error),
}

/// Runs one job through ffprobe and ffmpeg
#[derive(Debug, Clone)]
pub struct TranscodeEngine {
    config: EngineConfig,
}

impl TranscodeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transcode `job.input` into `job.output`.
    ///
    /// `cancel` is watched while probing, before every read of the progress
    /// stream and while waiting for ffmpeg to exit. Any partial output is
    /// removed unless the result is `Success`.
    pub async fn run(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        mut progress_callback: Option<ProgressCallback>,
    ) -> EncodeResult {
        if cancel.is_cancelled() {
            return EncodeResult::Cancelled;
        }

        let preset = get_preset(Some(job.preset_label.as_str()));
        let original_size = file_size(&job.input).await;

        let duration = tokio::select! {
            biased;
            _ = cancel.cancelled() => return EncodeResult::Cancelled,
            duration = self.probe_input_duration(&job.input) => duration,
        };

        let args = build_ffmpeg_args(&job.input, &job.output, preset);
        info!(
            job_id = %job.id,
            owner = job.owner,
            preset = preset.label,
            "Encoding: {} -> {} ({:.1}s)",
            job.input.display(),
            job.output.display(),
            duration
        );

        let mut child = match Command::new(&self.config.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                cleanup_partial_file(&job.output).await;
                return EncodeResult::Failed(FailureReason::Spawn(e.to_string()));
            }
        };

        let stderr_task = child.stderr.take().map(|s| tokio::spawn(collect_stderr(s)));

        let Some(stdout) = child.stdout.take() else {
            return self
                .abort(
                    &mut child,
                    stderr_task,
                    &job.output,
                    EncodeResult::Failed(FailureReason::Io(
                        "ffmpeg stdout was not captured".to_string(),
                    )),
                )
                .await;
        };

        let mut tracker = ProgressTracker::new(duration, self.config.min_progress_delta);
        let end = self
            .read_progress(stdout, &mut tracker, cancel, &mut progress_callback)
            .await;

        let aborted = match end {
            StreamEnd::Eof => None,
            StreamEnd::Cancelled => Some(EncodeResult::Cancelled),
            StreamEnd::Stalled => Some(EncodeResult::Failed(FailureReason::Timeout(
                self.config.stall_timeout(),
            ))),
            StreamEnd::ReadError(e) => Some(EncodeResult::Failed(FailureReason::Io(format!(
                "Failed to read ffmpeg progress: {}",
                e
            )))),
        };
        if let Some(result) = aborted {
            return self.abort(&mut child, stderr_task, &job.output, result).await;
        }

        // stdout closed; the process should be exiting
        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            waited = timeout(self.config.stall_timeout(), child.wait()) => Some(waited),
        };
        let status = match waited {
            None => {
                return self
                    .abort(&mut child, stderr_task, &job.output, EncodeResult::Cancelled)
                    .await;
            }
            Some(Err(_)) => {
                let result = EncodeResult::Failed(FailureReason::Timeout(self.config.stall_timeout()));
                return self.abort(&mut child, stderr_task, &job.output, result).await;
            }
            Some(Ok(Err(e))) => {
                let result = EncodeResult::Failed(FailureReason::Io(format!(
                    "Failed to wait for ffmpeg: {}",
                    e
                )));
                return self.abort(&mut child, stderr_task, &job.output, result).await;
            }
            Some(Ok(Ok(status))) => status,
        };

        let stderr = match stderr_task {
            Some(task) => timeout(self.config.kill_grace(), task)
                .await
                .ok()
                .and_then(|joined| joined.ok())
                .unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() || !tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
            cleanup_partial_file(&job.output).await;
            return EncodeResult::Failed(FailureReason::NonZeroExitOrMissingOutput {
                status: status.to_string(),
                detail: stderr_tail(&stderr),
            });
        }

        self.finalize(
            job,
            original_size,
            preset.display_name,
            &mut tracker,
            &mut progress_callback,
            cancel,
        )
        .await
    }

    /// Probe the input, falling back to one second so progress never divides by zero.
    /// A probe that outlives the stall window is killed and counts as failed.
    async fn probe_input_duration(&self, input: &Path) -> f64 {
        let stall = self.config.stall_timeout();
        let probed = match timeout(stall, analyzer::probe_duration(&self.config.ffprobe, input)).await {
            Ok(probed) => probed,
            Err(_) => {
                warn!(
                    "ffprobe gave no answer for {} within {}s; assuming {}s",
                    input.display(),
                    stall.as_secs(),
                    FALLBACK_DURATION_SECS
                );
                return FALLBACK_DURATION_SECS;
            }
        };
        match probed {
            Ok(duration) if duration > 0.0 => duration,
            Ok(duration) => {
                warn!(
                    "Probed duration {} for {} is not positive; assuming {}s",
                    duration,
                    input.display(),
                    FALLBACK_DURATION_SECS
                );
                FALLBACK_DURATION_SECS
            }
            Err(e) => {
                warn!(
                    "Error probing {}: {}; assuming {}s",
                    input.display(),
                    e,
                    FALLBACK_DURATION_SECS
                );
                FALLBACK_DURATION_SECS
            }
        }
    }

    /// Read `-progress` lines until EOF, cancellation or a stall
    async fn read_progress(
        &self,
        stdout: ChildStdout,
        tracker: &mut ProgressTracker,
        cancel: &CancellationToken,
        progress_callback: &mut Option<ProgressCallback>,
    ) -> StreamEnd {
        let stall = self.config.stall_timeout();
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                read = timeout(stall, lines.next_line()) => read,
            };

            let line = match read {
                Err(_) => return StreamEnd::Stalled,
                Ok(Err(e)) => return StreamEnd::ReadError(e),
                Ok(Ok(None)) => return StreamEnd::Eof,
                Ok(Ok(Some(line))) => line,
            };

            let Some(field) = parse_line(&line) else {
                continue;
            };
            if field == ProgressField::Progress(ProgressState::End) {
                debug!("ffmpeg reported end of progress");
            }
            if let Some(event) = tracker.feed(field)
                && let Some(cb) = progress_callback.as_mut()
            {
                cb(event);
            }
        }
    }

    async fn finalize(
        &self,
        job: &Job,
        original_size: u64,
        preset_display_name: &str,
        tracker: &mut ProgressTracker,
        progress_callback: &mut Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> EncodeResult {
        let compressed_size = file_size(&job.output).await;

        let stall = self.config.stall_timeout();
        let probed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            probed = timeout(stall, analyzer::probe_duration(&self.config.ffprobe, &job.output)) => Some(probed),
        };
        let output_duration_secs = match probed {
            None => {
                cleanup_partial_file(&job.output).await;
                info!("Encoding of {} cancelled", job.output.display());
                return EncodeResult::Cancelled;
            }
            Some(Ok(Ok(d))) => d.max(0.0),
            Some(Ok(Err(e))) => {
                warn!("Could not probe output {}: {}", job.output.display(), e);
                0.0
            }
            Some(Err(_)) => {
                warn!(
                    "ffprobe gave no answer for {} within {}s",
                    job.output.display(),
                    stall.as_secs()
                );
                0.0
            }
        };

        if let Some(event) = tracker.finish()
            && let Some(cb) = progress_callback.as_mut()
        {
            cb(event);
        }

        let result = TranscodeResult {
            original_size,
            compressed_size,
            reduction_percent: reduction_percent(original_size, compressed_size),
            output_duration_secs,
            preset_display_name: preset_display_name.to_string(),
        };

        info!(
            job_id = %job.id,
            owner = job.owner,
            "Encoded {} -> {} ({:.1}% smaller)",
            result.original_size_str(),
            result.compressed_size_str(),
            result.reduction_percent
        );
        EncodeResult::Success(result)
    }

    /// Kill ffmpeg, drop its partial output and return `result`
    async fn abort(
        &self,
        child: &mut Child,
        stderr_task: Option<JoinHandle<String>>,
        output: &Path,
        result: EncodeResult,
    ) -> EncodeResult {
        kill_child(child, self.config.kill_grace()).await;
        if let Some(task) = stderr_task {
            task.abort();
        }
        cleanup_partial_file(output).await;
        match &result {
            EncodeResult::Cancelled => info!("Encoding of {} cancelled", output.display()),
            EncodeResult::Failed(reason) => warn!("Encoding of {} failed: {}", output.display(), reason),
            EncodeResult::Success(_) => {}
        }
        result
    }
}

async fn kill_child(child: &mut Child, grace: std::time::Duration) {
    let _ = child.start_kill();
    if timeout(grace, child.wait()).await.is_err() {
        warn!("ffmpeg did not exit within {}ms of being killed", grace.as_millis());
    }
}

async fn cleanup_partial_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    let _ = BufReader::new(stderr).read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).to_string()
}

/// Last few lines of ffmpeg's stderr, oldest first
fn stderr_tail(stderr: &str) -> String {
    let last_lines: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .rev()
        .take(5)
        .collect();
    last_lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_percent() {
        assert_eq!(reduction_percent(10_485_760, 2_621_440), 75.0);
        assert_eq!(reduction_percent(0, 0), 0.0);
        assert_eq!(reduction_percent(0, 500), 0.0);
        assert_eq!(reduction_percent(1000, 1000), 0.0);
        assert_eq!(reduction_percent(1000, 0), 100.0);
        // Output larger than input
        assert_eq!(reduction_percent(1000, 1500), -50.0);
    }

    #[test]
    fn test_stderr_tail() {
        let stderr = "a\nb\n\nc\nd\ne\nf\ng\n";
        assert_eq!(stderr_tail(stderr), "c\nd\ne\nf\ng");
        assert_eq!(stderr_tail(""), "");
    }
}
