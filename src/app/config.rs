//! Configuration Management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Contract loading settings
    pub contracts: ContractsConfig,
    /// Analysis settings
    pub analysis: AnalysisConfig,
    /// Report settings
    pub report: ReportConfig,
}

/// Contract loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Treat load diagnostics (skipped blocks) as a hard failure
    pub strict: bool,
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Per-path event budget before the path is abandoned as Unknown
    pub max_steps: usize,
    /// Maximum paths analyzed per trace (0 = all)
    pub max_paths: usize,
}

/// Report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format: "text" or "json"
    pub format: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self { strict: false }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            max_paths: 0,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.analysis.max_steps == 0 {
            return Err(crate::Error::Config(
                "max_steps must be > 0".to_string(),
            ));
        }
        if self.report.format != "text" && self.report.format != "json" {
            return Err(crate::Error::Config(format!(
                "format must be \"text\" or \"json\", got {:?}",
                self.report.format
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".tracecheck").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
