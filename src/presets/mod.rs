pub mod catalog;
pub mod preferences;

pub use catalog::{DEFAULT_PRESET, QualityPreset, Resolution, all_presets, get_preset, is_known_preset};
pub use preferences::PresetPreferences;
