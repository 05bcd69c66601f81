//! Configuration loading and management.
//!
//! Presentation concerns only (error token, terminal affordances); the
//! arithmetic semantics of the engine are not configurable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::DEFAULT_ERROR_TOKEN;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub repl: ReplConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Text shown while the engine is in the error state.
    pub error_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Echo each accepted key before the display line.
    pub echo_keys: bool,
    /// Prefix the display line with the clear label and the highlighted
    /// operator.
    pub show_affordances: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            error_token: DEFAULT_ERROR_TOKEN.to_string(),
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            echo_keys: false,
            show_affordances: true,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                // Fallback: ~ is not expanded by PathBuf, so use dirs::home_dir
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("keypad")
            .join("config.toml")
    }

    /// Load config from file, or return defaults if not found
    pub fn load() -> Self {
        let path = Self::config_path();

        let mut config = if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("failed to parse config: {e}");
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("failed to read config: {e}");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    /// Validate loaded values, falling back where they are unusable
    fn validate(&mut self) {
        if self.display.error_token.trim().is_empty() {
            self.display.error_token = DEFAULT_ERROR_TOKEN.to_string();
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;

        Ok(())
    }
}
