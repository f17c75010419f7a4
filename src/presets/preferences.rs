use super::catalog::{DEFAULT_PRESET, is_known_preset};
use crate::queue::OwnerId;
use dashmap::DashMap;
use tracing::debug;

/// Per-owner preferred preset label.
///
/// Lives apart from the queue and the engine; the dispatcher only reads it
/// when a submission carries no explicit label.
#[derive(Debug)]
pub struct PresetPreferences {
    default_label: String,
    labels: DashMap<OwnerId, String>,
}

impl PresetPreferences {
    pub fn new(default_label: impl Into<String>) -> Self {
        let default_label = default_label.into();
        let default_label = if is_known_preset(&default_label) {
            default_label
        } else {
            DEFAULT_PRESET.to_string()
        };
        Self {
            default_label,
            labels: DashMap::new(),
        }
    }

    /// Store the owner's preference. Returns false for unknown labels.
    pub fn set(&self, owner: OwnerId, label: &str) -> bool {
        if !is_known_preset(label) {
            return false;
        }
        debug!(owner, label, "Preset preference updated");
        self.labels.insert(owner, label.trim().to_lowercase());
        true
    }

    pub fn get(&self, owner: OwnerId) -> String {
        self.labels
            .get(&owner)
            .map(|l| l.value().clone())
            .unwrap_or_else(|| self.default_label.clone())
    }

    pub fn clear(&self, owner: OwnerId) {
        self.labels.remove(&owner);
    }
}

impl Default for PresetPreferences {
    fn default() -> Self {
        Self::new(DEFAULT_PRESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_until_set() {
        let prefs = PresetPreferences::new("480p");
        assert_eq!(prefs.get(7), "480p");
        assert!(prefs.set(7, "720P"));
        assert_eq!(prefs.get(7), "720p");
        assert_eq!(prefs.get(8), "480p");
        prefs.clear(7);
        assert_eq!(prefs.get(7), "480p");
    }

    #[test]
    fn test_rejects_unknown_labels() {
        let prefs = PresetPreferences::new("bogus");
        assert_eq!(prefs.get(1), DEFAULT_PRESET);
        assert!(!prefs.set(1, "4k"));
        assert_eq!(prefs.get(1), DEFAULT_PRESET);
    }
}
