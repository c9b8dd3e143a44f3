//! Global configuration for cyt

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Defaults applied when the matching command-line flag is absent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Default schema.yaml path
    #[serde(default)]
    pub schema: Option<PathBuf>,

    /// Default root variable name
    #[serde(default)]
    pub var: Option<String>,

    /// Nesting limit for filter and connect inputs
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl Config {
    /// Load config from default location (~/.config/cyt/config.toml)
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path();

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Get default config file path.
    /// Checks ~/.config/cyt/config.toml first (XDG style),
    /// then falls back to OS-specific location
    pub fn default_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("cyt").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cyt")
            .join("config.toml")
    }
}
