/// Label of the preset used when none (or an unknown one) is requested
pub const DEFAULT_PRESET: &str = "360p";

/// Target output frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Encoder parameters for one quality level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPreset {
    pub label: &'static str,
    pub codec: &'static str,
    /// `None` keeps the source size, only rounding to even dimensions
    pub resolution: Option<Resolution>,
    /// Video bitrate ceiling in kbit/s
    pub max_bitrate_kbps: Option<u32>,
    /// Constant rate factor (0-51 for libx264, lower = better quality)
    pub crf: u8,
    pub display_name: &'static str,
}

static PRESETS: [QualityPreset; 5] = [
    QualityPreset {
        label: "240p",
        codec: "libx264",
        resolution: Some(Resolution {
            width: 426,
            height: 240,
        }),
        max_bitrate_kbps: Some(300),
        crf: 40,
        display_name: "240p (maximum compression)",
    },
    QualityPreset {
        label: "360p",
        codec: "libx264",
        resolution: Some(Resolution {
            width: 640,
            height: 360,
        }),
        max_bitrate_kbps: Some(600),
        crf: 38,
        display_name: "360p (high compression)",
    },
    QualityPreset {
        label: "480p",
        codec: "libx264",
        resolution: Some(Resolution {
            width: 854,
            height: 480,
        }),
        max_bitrate_kbps: Some(1000),
        crf: 36,
        display_name: "480p (medium compression)",
    },
    QualityPreset {
        label: "720p",
        codec: "libx264",
        resolution: Some(Resolution {
            width: 1280,
            height: 720,
        }),
        max_bitrate_kbps: Some(2000),
        crf: 34,
        display_name: "720p (good quality)",
    },
    QualityPreset {
        label: "original",
        codec: "libx264",
        resolution: None,
        max_bitrate_kbps: None,
        crf: 38,
        display_name: "Original (codec only)",
    },
];

/// All presets, smallest output first
pub fn all_presets() -> &'static [QualityPreset] {
    &PRESETS
}

/// Look up a preset by label, falling back to [`DEFAULT_PRESET`]
pub fn get_preset(label: Option<&str>) -> &'static QualityPreset {
    label
        .and_then(find)
        .or_else(|| find(DEFAULT_PRESET))
        .unwrap_or(&PRESETS[1])
}

pub fn is_known_preset(label: &str) -> bool {
    find(label).is_some()
}

fn find(label: &str) -> Option<&'static QualityPreset> {
    PRESETS.iter().find(|p| p.label.eq_ignore_ascii_case(label.trim()))
}
