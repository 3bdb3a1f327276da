//! Shade configuration
//!
//! Loaded from `~/.local/state/flick/shade.toml`. Every field has a default,
//! so a missing file or a partial file both work.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shade::animation::ANIMATION_DURATION;

/// Touch handling thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Vertical travel (logical px) before a heads-up drag starts
    pub touch_slop: f64,
    /// Taps this soon after a banner appears are swallowed
    pub swallow_click_ms: u64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            touch_slop: 16.0,
            swallow_click_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadsUpSettings {
    /// How long a package stays snoozed after its banner is flung away
    pub snooze_ms: u64,
}

impl Default for HeadsUpSettings {
    fn default() -> Self {
        Self { snooze_ms: 60_000 }
    }
}

/// Scrim alphas and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrimSettings {
    pub behind_alpha: f32,
    pub behind_alpha_keyguard: f32,
    pub behind_alpha_unlocking: f32,
    pub in_front_alpha: f32,
    pub animation_ms: u64,
}

impl Default for ScrimSettings {
    fn default() -> Self {
        Self {
            behind_alpha: 0.62,
            behind_alpha_keyguard: 0.45,
            behind_alpha_unlocking: 0.2,
            in_front_alpha: 0.75,
            animation_ms: ANIMATION_DURATION.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    /// Minimum gap between two visibility reports
    pub min_interval_ms: u64,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self { min_interval_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Give up on a lock screen app launch after this long
    pub launch_transition_timeout_ms: u64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            launch_transition_timeout_ms: 5_000,
        }
    }
}

/// Top-level shade configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadeConfig {
    pub gestures: GestureSettings,
    pub heads_up: HeadsUpSettings,
    pub scrim: ScrimSettings,
    pub visibility: VisibilitySettings,
    pub panel: PanelSettings,
}

impl ShadeConfig {
    /// Default config file path
    pub fn config_path() -> Option<PathBuf> {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".local/state/flick/shade.toml"))
    }

    /// Load from the default path, falling back to defaults on any problem
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            tracing::info!("No shade config found, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded shade config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("Ignoring shade config: {:#}", anyhow::Error::new(e));
                Self::default()
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Saved shade config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let alphas = [
            ("scrim.behind_alpha", self.scrim.behind_alpha),
            ("scrim.behind_alpha_keyguard", self.scrim.behind_alpha_keyguard),
            ("scrim.behind_alpha_unlocking", self.scrim.behind_alpha_unlocking),
            ("scrim.in_front_alpha", self.scrim.in_front_alpha),
        ];
        for (field, alpha) in alphas {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{alpha} is outside 0..=1"),
                });
            }
        }
        let slop = self.gestures.touch_slop;
        if slop.is_nan() || slop < 0.0 {
            return Err(ConfigError::Invalid {
                field: "gestures.touch_slop",
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }

    pub fn swallow_click_window(&self) -> Duration {
        Duration::from_millis(self.gestures.swallow_click_ms)
    }

    pub fn snooze_length(&self) -> Duration {
        Duration::from_millis(self.heads_up.snooze_ms)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.scrim.animation_ms)
    }

    pub fn visibility_min_interval(&self) -> Duration {
        Duration::from_millis(self.visibility.min_interval_ms)
    }

    pub fn launch_transition_timeout(&self) -> Duration {
        Duration::from_millis(self.panel.launch_transition_timeout_ms)
    }
}
