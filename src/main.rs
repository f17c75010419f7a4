use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use vidshrink::encoder::EncodeResult;
use vidshrink::presets::{self, PresetPreferences};
use vidshrink::queue::{Job, JobDispatcher, OwnerId, WorkerMessage, is_video_file};
use vidshrink::transfer::{LocalFileTransfer, MediaTransferService, UploadMetadata};
use vidshrink::utils::{
    DependencyStatus, format_duration, format_file_size, has_enough_space, init_logging,
    progress_bar,
};
use vidshrink::{AppConfig, TranscodeEngine};
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "vidshrink", version, about = "Compress videos with ffmpeg")]
struct Cli {
    /// Video files or directories to compress
    #[arg(required_unless_present = "list_presets")]
    inputs: Vec<PathBuf>,

    /// Owner the submissions are queued under
    #[arg(long, default_value_t = 0)]
    owner: OwnerId,

    /// Quality preset, stored as the owner's preference for this run
    #[arg(short, long)]
    preset: Option<String>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the available presets and exit
    #[arg(long)]
    list_presets: bool,
}

/// Outcome counts for the final report
#[derive(Debug, Default)]
struct Summary {
    converted: usize,
    cancelled: usize,
    failed: usize,
    bytes_saved: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();

    if cli.list_presets {
        for preset in presets::all_presets() {
            println!("{:<10} {}", preset.label, preset.display_name);
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AppConfig::load(),
    };
    config.validate().context("Invalid configuration")?;

    let deps = DependencyStatus::check(&config.engine);
    if !deps.all_available() {
        bail!(
            "ffmpeg ({}) and ffprobe ({}) must be installed",
            config.engine.ffmpeg.display(),
            config.engine.ffprobe.display()
        );
    }

    let preferences = Arc::new(PresetPreferences::new(config.default_preset.clone()));
    if let Some(label) = &cli.preset
        && !preferences.set(cli.owner, label)
    {
        bail!("Unknown preset '{}', see --list-presets", label);
    }

    let work_dir = config.output.work_dir.clone();
    std::fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;

    let sources = collect_inputs(&cli.inputs);
    if sources.is_empty() {
        bail!("No video files found");
    }

    let transfer = LocalFileTransfer::new(&work_dir, &config.output.upload_dir);
    let (dispatcher, mut rx) = JobDispatcher::new(
        TranscodeEngine::new(config.engine.clone()),
        preferences,
        config.output.clone(),
    );

    let started = Instant::now();
    let mut submitted = Vec::new();
    for source in &sources {
        let size = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
        // Room for the downloaded copy and the compressed output
        if !has_enough_space(&work_dir, size.saturating_mul(2)) {
            warn!("Skipping {}: not enough disk space", source.display());
            continue;
        }

        let report = |done: u64, total: u64| debug!(done, total, "Downloading");
        let local = match transfer.download(&source.to_string_lossy(), &report).await {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to fetch {}: {}", source.display(), e);
                continue;
            }
        };

        submitted.push(local.clone());
        let position = dispatcher.enqueue(cli.owner, local, None);
        if position > 0 {
            info!("{} queued at position {}", source.display(), position + 1);
        }
    }

    let summary = drive(&dispatcher, &mut rx, &transfer, cli.owner, submitted.len()).await;

    // Jobs dropped from the queue by a cancel never report back
    let leftovers = remove_leftovers(&submitted).await;
    if leftovers > 0 {
        info!("Removed {} unprocessed download(s)", leftovers);
    }

    eprintln!();
    println!(
        "Converted: {}  Cancelled: {}  Failed: {}  Saved: {}  Elapsed: {}",
        summary.converted,
        summary.cancelled,
        summary.failed,
        format_file_size(summary.bytes_saved),
        format_duration(started.elapsed())
    );
    Ok(())
}

/// Expand directories into the video files they contain
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else if is_video_file(input) {
            files.push(input.clone());
        } else {
            warn!("Ignoring {}: not a supported video file", input.display());
        }
    }
    files
}

/// Render worker messages until every submission reached a terminal state.
/// Ctrl-C cancels the owner's running and queued jobs.
async fn drive(
    dispatcher: &JobDispatcher,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<WorkerMessage>,
    transfer: &LocalFileTransfer,
    owner: OwnerId,
    submitted: usize,
) -> Summary {
    let mut summary = Summary::default();
    let mut finished = 0;
    let mut interrupted = false;

    while finished < submitted {
        // After a cancel, queued jobs never report; stop once the worker is idle
        if interrupted && !dispatcher.queue().is_processing(owner) && rx.is_empty() {
            break;
        }

        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                match message {
                    WorkerMessage::Started { job } => {
                        eprintln!();
                        eprintln!(
                            "Compressing {} ({})",
                            job.filename(),
                            presets::get_preset(Some(job.preset_label.as_str())).display_name
                        );
                    }
                    WorkerMessage::Progress { event, .. } => {
                        eprint!("\r{}", progress_bar(event.fraction, 30));
                        let _ = std::io::stderr().flush();
                    }
                    WorkerMessage::Finished { job, result } => {
                        finished += 1;
                        deliver(transfer, owner, &job, result, &mut summary).await;
                    }
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                if signal.is_ok() {
                    interrupted = true;
                    eprintln!();
                    if !dispatcher.request_cancel(owner) {
                        info!("Nothing to cancel");
                    }
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(250)), if interrupted => {}
        }
    }
    summary
}

/// Upload a successful result and remove the working files
async fn deliver(
    transfer: &LocalFileTransfer,
    owner: OwnerId,
    job: &Job,
    result: EncodeResult,
    summary: &mut Summary,
) {
    match result {
        EncodeResult::Success(stats) => {
            let caption = format!(
                "{} -> {} ({:.1}% smaller, {})",
                stats.original_size_str(),
                stats.compressed_size_str(),
                stats.reduction_percent,
                stats.preset_display_name
            );
            let metadata = UploadMetadata {
                owner,
                caption: caption.clone(),
                duration_secs: stats.output_duration_secs,
            };
            let report = |done: u64, total: u64| debug!(done, total, "Uploading");
            match transfer.upload(&job.output, &metadata, &report).await {
                Ok(receipt) => {
                    eprintln!();
                    eprintln!("Done: {} [{}]", receipt.location.display(), caption);
                    summary.converted += 1;
                    summary.bytes_saved += stats.original_size.saturating_sub(stats.compressed_size);
                }
                Err(e) => {
                    error!("Upload of {} failed: {}", job.output.display(), e);
                    summary.failed += 1;
                }
            }
            remove_working_file(&job.output).await;
        }
        EncodeResult::Cancelled => {
            eprintln!();
            eprintln!("Cancelled: {}", job.filename());
            summary.cancelled += 1;
        }
        EncodeResult::Failed(reason) => {
            eprintln!();
            eprintln!("Failed: {} ({})", job.filename(), reason);
            summary.failed += 1;
        }
    }
    remove_working_file(&job.input).await;
}

/// Delete the downloaded copies that are still on disk; returns how many were removed
async fn remove_leftovers(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            remove_working_file(path).await;
            removed += 1;
        }
    }
    removed
}

async fn remove_working_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to clean up {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_leftovers_only_counts_remaining_files() {
        let dir = tempfile::tempdir().unwrap();
        let delivered = dir.path().join("1a2b3c4d_done.mp4");
        let dropped = dir.path().join("5e6f7a8b_queued.mp4");
        std::fs::write(&dropped, b"data").unwrap();

        let removed = remove_leftovers(&[delivered, dropped.clone()]).await;
        assert_eq!(removed, 1);
        assert!(!dropped.exists());
    }

    #[test]
    fn test_collect_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.mp4", "a.mkv", "notes.txt", "nested/c.mov"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let found = collect_inputs(&[dir.path().to_path_buf()]);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mkv", "b.mp4", "c.mov"]);
    }
}
