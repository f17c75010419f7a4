use humansize::{BINARY, format_size};
use std::time::Duration;

/// Format a byte count as e.g. `2.50 MiB`
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, BINARY.decimal_places(2))
}

/// Format a duration as `HH:MM:SS`, or `MM:SS` below one hour
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Text progress bar such as `|██████░░░░| 60.0%`
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * width as f64) as usize;
    format!(
        "|{}{}| {:.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        fraction * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        let size = format_file_size(2_621_440);
        assert!(size.starts_with("2.5"), "{}", size);
        assert!(size.ends_with("MiB"), "{}", size);
        assert!(format_file_size(512).ends_with(" B"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.5, 4), "|██░░| 50.0%");
        assert_eq!(progress_bar(2.0, 2), "|██| 100.0%");
    }
}
