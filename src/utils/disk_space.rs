use std::path::Path;
use tracing::warn;

/// Get available disk space in bytes for the given path
#[cfg(unix)]
pub fn available_space(path: &Path) -> Option<u64> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(path).ok()?;
    Some(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> Option<u64> {
    None
}

/// Whether `dir` can hold another `required_bytes`.
/// Unknown free space counts as enough.
pub fn has_enough_space(dir: &Path, required_bytes: u64) -> bool {
    match available_space(dir) {
        Some(available) if available <= required_bytes => {
            warn!(
                "Only {} bytes free in {}, {} needed",
                available,
                dir.display(),
                required_bytes
            );
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_checks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(has_enough_space(dir.path(), 0));
    }

    #[cfg(unix)]
    #[test]
    fn test_reports_shortage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(available_space(dir.path()).is_some());
        assert!(!has_enough_space(dir.path(), u64::MAX));
    }
}
