use chrono::Local;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identifies the requester a job belongs to
pub type OwnerId = u64;

/// One submission waiting for or undergoing transcoding.
///
/// Immutable once created; dropped after its terminal result is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub owner: OwnerId,
    pub input: PathBuf,
    pub output: PathBuf,
    pub preset_label: String,
}

impl Job {
    pub fn new(
        owner: OwnerId,
        input: PathBuf,
        output: PathBuf,
        preset_label: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            input,
            output,
            preset_label: preset_label.into(),
        }
    }

    /// First eight hex digits of the id, for file names and logs
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }

    /// Get the filename
    pub fn filename(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Output path in `dir` for `input`: `<stem><suffix>_<timestamp>_<tag>.<ext>`
pub fn generate_output_path(input: &Path, dir: &Path, suffix: &str, tag: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let name = match input.extension() {
        Some(ext) => format!(
            "{}{}_{}_{}.{}",
            stem,
            suffix,
            timestamp,
            tag,
            ext.to_string_lossy()
        ),
        None => format!("{}{}_{}_{}", stem, suffix, timestamp, tag),
    };
    dir.join(name)
}

/// Check if a path is a video file
pub fn is_video_file(path: &Path) -> bool {
    const VIDEO_EXTENSIONS: [&str; 9] = [
        "mp4", "avi", "mov", "mkv", "flv", "wmv", "m4v", "webm", "ts",
    ];

    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_keeps_extension() {
        let out = generate_output_path(
            Path::new("/videos/holiday.MP4"),
            Path::new("downloads"),
            "_compressed",
            "1a2b3c4d",
        );
        assert_eq!(out.parent(), Some(Path::new("downloads")));
        let name = out.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("holiday_compressed_"));
        assert!(name.ends_with("_1a2b3c4d.MP4"));
        // holiday_compressed_YYYYmmdd_HHMMSS_1a2b3c4d.MP4
        assert_eq!(name.len(), "holiday_compressed_".len() + 15 + 13);
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("a/b/clip.mkv")));
        assert!(is_video_file(Path::new("CLIP.MOV")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_jobs_get_distinct_ids() {
        let a = Job::new(1, "a.mp4".into(), "b.mp4".into(), "360p");
        let b = Job::new(1, "a.mp4".into(), "b.mp4".into(), "360p");
        assert_ne!(a.id, b.id);
        assert_eq!(a.short_id().len(), 8);
        assert_eq!(a.filename(), "a.mp4");
    }
}
