//! Configuration management for Trawl.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Category;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/trawl/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Extraction strategy settings
    pub extraction: ExtractionConfig,
    /// Validation settings
    pub validation: ValidationConfig,
    /// Snapshot store settings
    pub snapshots: SnapshotConfig,
    /// Change detection settings
    pub changes: ChangesConfig,
    /// Browser adapter settings
    pub browser: BrowserConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::from_path(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TRAWL_ERROR_THRESHOLD`: Override the validation error threshold
    /// - `TRAWL_SNAPSHOT_DIR`: Override the snapshot directory
    /// - `TRAWL_HEADLESS`: Override browser headless mode (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRAWL_ERROR_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                self.validation.error_threshold = threshold;
                tracing::debug!("Override validation.error_threshold from env: {}", threshold);
            }
        }

        if let Ok(val) = std::env::var("TRAWL_SNAPSHOT_DIR") {
            tracing::debug!("Override snapshots.dir from env: {}", val);
            self.snapshots.dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("TRAWL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }
    }

    /// Check value ranges that TOML parsing cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let threshold = self.validation.error_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidValue {
                field: "validation.error_threshold".to_string(),
                reason: format!("must be between 0.0 and 1.0, got {threshold}"),
            });
        }

        for (category, fields) in &self.changes.key_fields {
            if fields.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("changes.key_fields.{category}"),
                    reason: "at least one key field is required".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/trawl/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "trawl", "trawl").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/trawl`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("dev", "trawl", "trawl").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Directory snapshots are written to.
    ///
    /// Defaults to `<data_dir>/snapshots` when not configured.
    pub fn snapshot_dir(&self) -> ConfigResult<PathBuf> {
        match &self.snapshots.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("snapshots")),
        }
    }
}

/// Extraction strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pause after each lazy-load scroll step, in milliseconds
    pub scroll_pause_ms: u64,
    /// Wait after the scroll pass before reading images, in milliseconds
    pub settle_ms: u64,
    /// Replacement candidate selectors for DOM product extraction
    pub product_selectors: ProductSelectorOverrides,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            scroll_pause_ms: 300,
            settle_ms: 2000,
            product_selectors: ProductSelectorOverrides::default(),
        }
    }
}

/// Per-field selector lists replacing the built-in product candidates.
///
/// A `None` field keeps the built-in list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSelectorOverrides {
    /// Title selectors
    pub title: Option<Vec<String>>,
    /// Price selectors
    pub price: Option<Vec<String>>,
    /// Image selectors
    pub image: Option<Vec<String>>,
    /// Description selectors
    pub description: Option<Vec<String>>,
}

/// What a run does when the validation error threshold is exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Log the breach and keep the partial result
    #[default]
    Advisory,
    /// Fail the run; the partial result travels with the error
    Abort,
}

/// Validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum tolerated ratio of invalid records (0.0-1.0)
    pub error_threshold: f64,
    /// Reaction to a threshold breach
    pub threshold_policy: ThresholdPolicy,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            error_threshold: 0.5,
            threshold_policy: ThresholdPolicy::Advisory,
        }
    }
}

/// Snapshot store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Whether runs are snapshotted and diffed against the previous run
    pub enabled: bool,
    /// Snapshot root directory (defaults to `<data_dir>/snapshots`)
    pub dir: Option<PathBuf>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// Change detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangesConfig {
    /// Key fields per category used to compute record identities
    pub key_fields: BTreeMap<Category, Vec<String>>,
}

impl ChangesConfig {
    /// Built-in key fields: products by title and link, images and assets by URL.
    #[must_use]
    pub fn default_key_fields() -> BTreeMap<Category, Vec<String>> {
        BTreeMap::from([
            (
                Category::Products,
                vec!["title".to_string(), "link".to_string()],
            ),
            (Category::Images, vec!["url".to_string()]),
            (Category::Assets, vec!["url".to_string()]),
        ])
    }
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            key_fields: Self::default_key_fields(),
        }
    }
}

/// Browser adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!((config.validation.error_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.validation.threshold_policy, ThresholdPolicy::Advisory);
        assert_eq!(config.extraction.scroll_pause_ms, 300);
        assert!(config.snapshots.enabled);
        assert!(config.browser.headless);
        assert_eq!(
            config.changes.key_fields.get(&Category::Products),
            Some(&vec!["title".to_string(), "link".to_string()])
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[validation]"));
        assert!(toml_str.contains("[browser]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_path() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[validation]
error_threshold = 0.2
threshold_policy = "abort"

[snapshots]
dir = "/tmp/trawl-snapshots"
"#,
        )
        .expect("write config file");

        let config = AppConfig::from_path(&config_path).expect("load config");
        assert!((config.validation.error_threshold - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.validation.threshold_policy, ThresholdPolicy::Abort);
        assert_eq!(
            config.snapshot_dir().unwrap(),
            PathBuf::from("/tmp/trawl-snapshots")
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[extraction.product_selectors]
title = [".item-name"]

[changes.key_fields]
products = ["title"]
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(
            config.extraction.product_selectors.title,
            Some(vec![".item-name".to_string()])
        );
        assert!(config.extraction.product_selectors.price.is_none());
        assert_eq!(
            config.changes.key_fields.get(&Category::Products),
            Some(&vec!["title".to_string()])
        );
        // Unlisted sections keep their defaults
        assert_eq!(config.extraction.settle_ms, 2000);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.validation.error_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_key_fields_rejected() {
        let mut config = AppConfig::default();
        config.changes.key_fields.insert(Category::Images, vec![]);
        assert!(config.validate().is_err());
    }
}
