// THEORY:
// `Settings` is an immutable snapshot of everything a host can tune. The coordinator
// receives a whole snapshot at configure-time and swaps it in wholesale; there are no
// partial merges, so a reader never sees half of an update.
//
// Settings can be built in code, or loaded from TOML with every key optional:
//
//     saturation-target = 70
//     lightness-target = 25
//     debounce-ms = 500
//     excluded-keys = ["intranet.local", "mail."]
//     enabled = true
//     dark-mode-only = false
//     remap-mode = "override"
//
// Range checks live in `validate`, which `Coordinator::configure` always runs. Bad
// settings are a programmer error and fail loudly.

use crate::core_modules::snapshot::ContentKey;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SATURATION_TARGET: f64 = 70.0;
pub const DEFAULT_LIGHTNESS_TARGET: f64 = 25.0;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// How the adjuster treats the sampled saturation and lightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemapMode {
    /// Replace both with the configured targets. Only the hue survives.
    #[default]
    Override,
    /// Move both halfway from the sampled value toward the target.
    Blend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// HSL saturation of the derived palette, in percent.
    pub saturation_target: f64,
    /// HSL lightness of the derived palette, in percent.
    pub lightness_target: f64,
    /// Quiet window of the trailing-edge debounce.
    pub debounce_ms: u64,
    /// Key patterns that are never colored. A key is excluded when it contains a
    /// pattern or a pattern contains it.
    pub excluded_keys: Vec<String>,
    pub enabled: bool,
    /// Only color while the host reports a dark color scheme.
    pub dark_mode_only: bool,
    pub remap_mode: RemapMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            saturation_target: DEFAULT_SATURATION_TARGET,
            lightness_target: DEFAULT_LIGHTNESS_TARGET,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            excluded_keys: Vec::new(),
            enabled: true,
            dark_mode_only: false,
            remap_mode: RemapMode::Override,
        }
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks every field is within its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("saturation-target", self.saturation_target),
            ("lightness-target", self.lightness_target),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_excluded(&self, key: &ContentKey) -> bool {
        let key = key.as_str().to_ascii_lowercase();
        if key.is_empty() {
            return false;
        }
        self.excluded_keys
            .iter()
            .map(|pattern| pattern.trim().to_ascii_lowercase())
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| key.contains(&pattern) || pattern.contains(&key))
    }
}
