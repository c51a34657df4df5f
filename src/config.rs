//! Configuration module - user preferences from ~/.config/chisel/config.toml
//!
//! Everything here is a default; command-line flags always win. The file
//! is optional and absent on a fresh install.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Chisel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan settings
    pub scan: ScanConfig,
    /// Output settings
    pub output: OutputConfig,
}

/// Scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of parallel workers (0 = physical core count)
    pub workers: usize,
    /// Default extension filter (empty = extract every known format)
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            extensions: Vec::new(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report format: "human" or "json"
    pub report: String,
    /// Colorize terminal output
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report: "human".to_string(),
            color: true,
        }
    }
}

impl Config {
    /// Load from the default path, or fall back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        Ok(config)
    }

    /// Save to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Default config path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
            .join("chisel")
            .join("config.toml")
    }
}

/// Generate a sample config file with comments.
pub fn generate_sample_config() -> String {
    r#"# Chisel Configuration
# Location: ~/.config/chisel/config.toml

[scan]
# Number of parallel workers (0 = physical core count)
workers = 0

# Default extension filter (empty = extract every known format)
# Example: ["pdf", "jpg", "docx"]
extensions = []

[output]
# Report format: "human" or "json"
report = "human"

# Colorize terminal output
color = true
"#
    .to_string()
}
