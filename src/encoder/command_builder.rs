use crate::presets::QualityPreset;
use std::path::Path;

/// Speed preset passed to the encoder; quality comes from the CRF
const SPEED_PRESET: &str = "ultrafast";
/// Keyframe interval in frames
const GOP_SIZE: &str = "250";

/// Build FFmpeg arguments for encoding.
///
/// The result depends only on the arguments, so the same job always yields
/// the same command line.
pub fn build_ffmpeg_args(input: &Path, output: &Path, preset: &QualityPreset) -> Vec<String> {
    // Machine-readable progress on stdout, errors only on stderr
    let mut args = vec![
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        "-nostdin".to_string(),
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];

    // Video encoder
    args.extend([
        "-c:v".to_string(),
        preset.codec.to_string(),
        "-crf".to_string(),
        preset.crf.to_string(),
        "-preset".to_string(),
        SPEED_PRESET.to_string(),
    ]);

    args.extend(["-vf".to_string(), build_scale_filter(preset)]);

    if let Some(kbps) = preset.max_bitrate_kbps {
        args.extend(get_bitrate_ceiling(kbps));
    }

    // Audio is copied untouched
    args.extend([
        "-c:a".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-threads".to_string(),
        "0".to_string(),
        "-g".to_string(),
        GOP_SIZE.to_string(),
    ]);

    args.push(output.to_string_lossy().to_string());
    args
}

/// Fit inside the preset target box, or keep the source size rounded down to
/// even dimensions (yuv420p requires both to be even).
///
/// The target is a bounding box, not an exact size: a 4:3 or portrait source
/// keeps its aspect ratio and ends up smaller than `W:H` on one axis instead
/// of being stretched to it.
fn build_scale_filter(preset: &QualityPreset) -> String {
    match preset.resolution {
        Some(res) => format!(
            "scale={}:{}:force_original_aspect_ratio=decrease:force_divisible_by=2:flags=fast_bilinear",
            res.width, res.height
        ),
        None => "scale=trunc(iw/2)*2:trunc(ih/2)*2:flags=fast_bilinear".to_string(),
    }
}

fn get_bitrate_ceiling(kbps: u32) -> Vec<String> {
    vec![
        "-maxrate".to_string(),
        format!("{}k", kbps),
        "-bufsize".to_string(),
        format!("{}k", kbps * 2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::get_preset;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_args_for_sized_preset() {
        let args = build_ffmpeg_args(
            Path::new("in/clip.mp4"),
            Path::new("out/clip_small.mp4"),
            get_preset(Some("480p")),
        );

        assert_eq!(value_after(&args, "-i"), Some("in/clip.mp4"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-crf"), Some("36"));
        assert_eq!(value_after(&args, "-preset"), Some("ultrafast"));
        assert_eq!(value_after(&args, "-c:a"), Some("copy"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert_eq!(value_after(&args, "-maxrate"), Some("1000k"));
        assert_eq!(value_after(&args, "-bufsize"), Some("2000k"));
        assert_eq!(value_after(&args, "-progress"), Some("pipe:1"));
        assert!(value_after(&args, "-vf").unwrap().starts_with("scale=854:480:"));
        assert_eq!(args.last().map(|s| s.as_str()), Some("out/clip_small.mp4"));
    }

    #[test]
    fn test_args_for_original_preset() {
        let args = build_ffmpeg_args(
            Path::new("a.mkv"),
            Path::new("b.mkv"),
            get_preset(Some("original")),
        );

        assert_eq!(
            value_after(&args, "-vf"),
            Some("scale=trunc(iw/2)*2:trunc(ih/2)*2:flags=fast_bilinear")
        );
        assert!(!args.iter().any(|a| a == "-maxrate"));
        assert!(!args.iter().any(|a| a == "-bufsize"));
    }

    #[test]
    fn test_sized_preset_fits_inside_target_box() {
        let filter = build_scale_filter(get_preset(Some("720p")));
        assert_eq!(
            filter,
            "scale=1280:720:force_original_aspect_ratio=decrease:force_divisible_by=2:flags=fast_bilinear"
        );
    }

    #[test]
    fn test_args_are_deterministic() {
        let preset = get_preset(Some("240p"));
        let a = build_ffmpeg_args(Path::new("x.mp4"), Path::new("y.mp4"), preset);
        let b = build_ffmpeg_args(Path::new("x.mp4"), Path::new("y.mp4"), preset);
        assert_eq!(a, b);
    }
}
