//! Configuration management for DealerScan.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default pause between two resolver calls, in milliseconds.
pub const DEFAULT_ITEM_DELAY_MS: u64 = 1000;

/// File name of the output table when no path is configured.
pub const DEFAULT_OUTPUT_FILE: &str = "dealers.csv";

/// Main application configuration.
///
/// This is loaded from `~/.config/dealerscan/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan loop settings
    pub scan: ScanConfig,
    /// Dealer locator endpoints
    pub resolver: ResolverConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// Supports the following environment variables:
    /// - `DEALERSCAN_ITEM_DELAY_MS`: Override the pause between postal codes
    /// - `DEALERSCAN_OUTPUT_PATH`: Override the output table path
    /// - `DEALERSCAN_WORK_LIST`: Override the postal code list path
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DEALERSCAN_ITEM_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.scan.item_delay_ms = ms;
                tracing::debug!("Override scan.item_delay_ms from env: {}", ms);
            }
        }

        if let Ok(val) = std::env::var("DEALERSCAN_OUTPUT_PATH") {
            tracing::debug!("Override scan.output_path from env: {}", val);
            self.scan.output_path = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("DEALERSCAN_WORK_LIST") {
            tracing::debug!("Override scan.work_list_path from env: {}", val);
            self.scan.work_list_path = Some(PathBuf::from(val));
        }
    }

    /// Reject values the scan loop cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scan.default_sparsify == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scan.default_sparsify".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.resolver.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, url) in [
            ("resolver.geocode_url", &self.resolver.geocode_url),
            ("resolver.dealer_search_url", &self.resolver.dealer_search_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("expected an http(s) URL, got '{url}'"),
                });
            }
        }
        Ok(())
    }

    /// Resolve where the output table is written.
    ///
    /// Uses `scan.output_path` when set, otherwise `dealers.csv` in the data dir.
    pub fn output_path(&self) -> ConfigResult<PathBuf> {
        match &self.scan.output_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(DEFAULT_OUTPUT_FILE)),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/dealerscan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "dealerscan", "dealerscan")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/dealerscan`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "dealerscan", "dealerscan")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Scan loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Pause between postal codes in milliseconds
    pub item_delay_ms: u64,
    /// Output table path (defaults to the data dir)
    pub output_path: Option<PathBuf>,
    /// Postal code list (defaults to the bundled list)
    pub work_list_path: Option<PathBuf>,
    /// Stride used when the caller doesn't pass one
    pub default_sparsify: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: DEFAULT_ITEM_DELAY_MS,
            output_path: None,
            work_list_path: None,
            default_sparsify: 1,
        }
    }
}

/// Dealer locator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Geocoding endpoint turning a postal code into coordinates
    pub geocode_url: String,
    /// Dealer search endpoint queried around those coordinates
    pub dealer_search_url: String,
    /// Search radius passed to the dealer search
    pub search_radius_miles: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            geocode_url: "https://nominatim.openstreetmap.org/search".to_string(),
            dealer_search_url: "https://locator.example.com/api/dealers".to_string(),
            search_radius_miles: 100,
            timeout_secs: 30,
            user_agent: "DealerScan/0.1.0 (+https://github.com/dealerscan/dealerscan)".to_string(),
        }
    }
}
