//! Application settings and configuration management

use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// ALSA device to use for audio playback
    #[serde(default = "default_alsa_device")]
    pub alsa_device: String,
    /// Sample rate payloads are decoded at
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Rate each new session starts with
    #[serde(default = "default_playback_rate")]
    pub default_playback_rate: f32,
    #[serde(default = "default_min_playback_rate")]
    pub min_playback_rate: f32,
    #[serde(default = "default_max_playback_rate")]
    pub max_playback_rate: f32,
    /// Increment applied by the speed keys
    #[serde(default = "default_rate_step")]
    pub rate_step: f32,
    /// Interface language
    #[serde(default)]
    pub language: Language,
    /// Directory holding `<lang>.json` message files
    #[serde(default)]
    pub locales_dir: Option<PathBuf>,
}

fn default_alsa_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    crate::audio::SOURCE_SAMPLE_RATE
}

fn default_playback_rate() -> f32 {
    crate::audio::DEFAULT_PLAYBACK_RATE
}

fn default_min_playback_rate() -> f32 {
    0.5
}

fn default_max_playback_rate() -> f32 {
    2.0
}

fn default_rate_step() -> f32 {
    0.25
}

/// Error types for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            alsa_device: default_alsa_device(),
            sample_rate: default_sample_rate(),
            default_playback_rate: default_playback_rate(),
            min_playback_rate: default_min_playback_rate(),
            max_playback_rate: default_max_playback_rate(),
            rate_step: default_rate_step(),
            language: Language::default(),
            locales_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("serene-player").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alsa_device.trim().is_empty() {
            return Err(ConfigError::ValidationError("ALSA device cannot be empty".to_string()));
        }

        if self.sample_rate == 0 {
            return Err(ConfigError::ValidationError("Sample rate must be greater than zero".to_string()));
        }

        let rates = [
            ("min_playback_rate", self.min_playback_rate),
            ("max_playback_rate", self.max_playback_rate),
            ("default_playback_rate", self.default_playback_rate),
            ("rate_step", self.rate_step),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.min_playback_rate > self.max_playback_rate {
            return Err(ConfigError::ValidationError(format!(
                "min_playback_rate ({}) exceeds max_playback_rate ({})",
                self.min_playback_rate, self.max_playback_rate
            )));
        }

        if !(self.min_playback_rate..=self.max_playback_rate).contains(&self.default_playback_rate) {
            return Err(ConfigError::ValidationError(format!(
                "default_playback_rate ({}) is outside {}..={}",
                self.default_playback_rate, self.min_playback_rate, self.max_playback_rate
            )));
        }

        Ok(())
    }

    /// Clamps `rate` into the configured range. An inverted or non-finite
    /// range leaves `rate` untouched; `validate` reports that case.
    pub fn clamp_rate(&self, rate: f32) -> f32 {
        let (min, max) = (self.min_playback_rate, self.max_playback_rate);
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return rate;
        }
        rate.clamp(min, max)
    }

    /// Next rate one step up or down from `current`, snapped to the step grid
    /// anchored at the minimum and clamped to the range.
    pub fn step_rate(&self, current: f32, up: bool) -> f32 {
        let steps = ((current - self.min_playback_rate) / self.rate_step).round();
        let next = if up { steps + 1.0 } else { steps - 1.0 };
        self.clamp_rate(self.min_playback_rate + next * self.rate_step)
    }
}
