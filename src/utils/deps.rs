use crate::config::EngineConfig;
use std::path::Path;
use std::process::Command;

/// Availability of the external tools the engine shells out to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl DependencyStatus {
    /// Check all dependencies
    pub fn check(config: &EngineConfig) -> Self {
        Self {
            ffmpeg: check_command(&config.ffmpeg, &["-version"]),
            ffprobe: check_command(&config.ffprobe, &["-version"]),
        }
    }

    pub fn all_available(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}

/// Check if a command is available
fn check_command(cmd: &Path, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_tools_reported() {
        let config = EngineConfig {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
            ..EngineConfig::default()
        };
        let status = DependencyStatus::check(&config);
        assert!(!status.ffmpeg);
        assert!(!status.ffprobe);
        assert!(!status.all_available());
    }
}
