pub mod types;

pub use types::*;

use crate::error::AppError;
use crate::presets::{self, DEFAULT_PRESET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Preset used for owners without a stored preference
    pub default_preset: String,
    /// Transcoding engine settings
    pub engine: EngineConfig,
    /// Output settings
    pub output: OutputConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_preset: DEFAULT_PRESET.to_string(),
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file, or create default if not found
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path())
    }

    /// Same as [`AppConfig::load`] for an explicit location
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match Self::load_from_file(config_path) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config: {}. Using defaults.", e);
                    return Self::default();
                }
            }
        }

        let config = Self::default();
        // Save default config for future editing
        if let Err(e) = config.save_to(config_path) {
            warn!("Failed to save default config: {}", e);
        }
        config
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), AppError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(config_path, toml_string)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidshrink")
            .join("config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AppError> {
        if !presets::is_known_preset(&self.default_preset) {
            return Err(AppError::Config(format!(
                "Unknown default preset '{}'",
                self.default_preset
            )));
        }
        if !(1..=3600).contains(&self.engine.stall_timeout_secs) {
            return Err(AppError::Config(
                "Stall timeout must be between 1 and 3600 seconds".to_string(),
            ));
        }
        let delta = self.engine.min_progress_delta;
        if !(delta > 0.0 && delta <= 0.5) {
            return Err(AppError::Config(
                "Minimum progress delta must be in (0, 0.5]".to_string(),
            ));
        }
        Ok(())
    }
}
