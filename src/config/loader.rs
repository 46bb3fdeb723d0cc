//! Configuration Loader
//!
//! Loads and validates the monitor configuration from a TOML file. Every
//! section has defaults, so an empty file is a valid configuration; secrets
//! usually come from the environment (or a `.env` file) instead.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::adapters::csfloat::{CsfloatConfig, DEFAULT_API_BASE_URL, DEFAULT_USER_AGENT};
use crate::adapters::ntfy::{NtfyConfig, DEFAULT_NTFY_SERVER};
use crate::application::{
    OrchestratorConfig, DEFAULT_MIN_PRICE_CENTS, DEFAULT_RETENTION_DAYS,
};
use crate::domain::{
    LocalIdWindow, RateControllerConfig, DEFAULT_MIN_DISCOUNT_FRACTION, DEFAULT_WINDOW_CAPACITY,
    DEFAULT_WINDOW_TARGET,
};

pub const ENV_API_KEY: &str = "CSFLOAT_API_KEY";
pub const ENV_NTFY_TOPIC: &str = "NTFY_TOPIC";
pub const ENV_NTFY_TOKEN: &str = "NTFY_TOKEN";
pub const ENV_DB_PATH: &str = "MONITOR_DB_PATH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub marketplace: MarketplaceSection,
    pub detector: DetectorSection,
    pub polling: PollingSection,
    pub storage: StorageSection,
    pub notify: NotifySection,
    pub logging: LoggingSection,
}

/// Listings API section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketplaceSection {
    /// Scheme + host of the API
    pub api_url: String,
    /// API key (prefer CSFLOAT_API_KEY in .env)
    pub api_key: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Listings below this price (cents) are not requested
    pub min_price_cents: u64,
    pub listing_type: String,
    pub sort_by: String,
}

impl Default for MarketplaceSection {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            min_price_cents: DEFAULT_MIN_PRICE_CENTS,
            listing_type: "buy_now".to_string(),
            sort_by: "most_recent".to_string(),
        }
    }
}

impl MarketplaceSection {
    /// API key from config, falling back to CSFLOAT_API_KEY
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var(ENV_API_KEY).ok().filter(|k| !k.is_empty())
    }
}

/// Deal detection section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    /// Minimum discount below reference, in percent
    pub min_discount_pct: f64,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            min_discount_pct: DEFAULT_MIN_DISCOUNT_FRACTION * 100.0,
        }
    }
}

/// Rate controller tunables plus loop backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    #[serde(flatten)]
    pub rate: RateControllerConfig,
    /// Pause after a failed cycle
    pub error_backoff_secs: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            rate: RateControllerConfig::default(),
            error_backoff_secs: 10,
        }
    }
}

/// Seen-listing store section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub db_path: String,
    pub retention_days: u32,
    pub maintenance_interval_hours: u64,
    pub window_capacity: usize,
    pub window_target: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: "data/listings.db".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            maintenance_interval_hours: 24,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            window_target: DEFAULT_WINDOW_TARGET,
        }
    }
}

impl StorageSection {
    /// Database path with MONITOR_DB_PATH override and `~` expansion
    pub fn get_db_path(&self) -> String {
        let raw = std::env::var(ENV_DB_PATH).unwrap_or_else(|_| self.db_path.clone());
        shellexpand::tilde(&raw).to_string()
    }

    pub fn build_window(&self) -> LocalIdWindow {
        LocalIdWindow::with_config(self.window_capacity, self.window_target)
    }
}

/// ntfy section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    pub server: String,
    /// Topic name (falls back to NTFY_TOPIC)
    pub topic: String,
    /// Access token (falls back to NTFY_TOKEN)
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            server: DEFAULT_NTFY_SERVER.to_string(),
            topic: String::new(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl NotifySection {
    pub fn get_topic(&self) -> String {
        if !self.topic.is_empty() {
            return self.topic.clone();
        }
        std::env::var(ENV_NTFY_TOPIC).unwrap_or_default()
    }

    pub fn get_token(&self) -> Option<String> {
        if let Some(ref token) = self.token {
            if !token.is_empty() {
                return Some(token.clone());
            }
        }
        std::env::var(ENV_NTFY_TOKEN).ok().filter(|t| !t.is_empty())
    }
}

/// Logging section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marketplace.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "marketplace.api_url cannot be empty".to_string(),
            ));
        }

        if self.marketplace.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "marketplace.timeout_secs must be > 0".to_string(),
            ));
        }

        let pct = self.detector.min_discount_pct;
        if !(pct > 0.0 && pct < 100.0) {
            return Err(ConfigError::ValidationError(format!(
                "min_discount_pct must be between 0 and 100 (exclusive), got {}",
                pct
            )));
        }

        self.polling
            .rate
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.storage.db_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.db_path cannot be empty".to_string(),
            ));
        }

        if self.storage.retention_days == 0 {
            return Err(ConfigError::ValidationError(
                "retention_days must be at least 1".to_string(),
            ));
        }

        if self.storage.maintenance_interval_hours == 0 {
            return Err(ConfigError::ValidationError(
                "maintenance_interval_hours must be > 0".to_string(),
            ));
        }

        if self.storage.window_target > self.storage.window_capacity {
            return Err(ConfigError::ValidationError(format!(
                "window_target ({}) must be <= window_capacity ({})",
                self.storage.window_target, self.storage.window_capacity
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }
}

impl From<&Config> for CsfloatConfig {
    fn from(config: &Config) -> Self {
        CsfloatConfig {
            api_base_url: config.marketplace.api_url.clone(),
            api_key: config.marketplace.get_api_key(),
            user_agent: config.marketplace.user_agent.clone(),
            timeout: Duration::from_secs(config.marketplace.timeout_secs),
        }
    }
}

impl From<&Config> for NtfyConfig {
    fn from(config: &Config) -> Self {
        NtfyConfig {
            server: config.notify.server.clone(),
            topic: config.notify.get_topic(),
            token: config.notify.get_token(),
            timeout: Duration::from_secs(config.notify.timeout_secs),
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        OrchestratorConfig {
            min_price_cents: config.marketplace.min_price_cents,
            sort_by: config.marketplace.sort_by.clone(),
            listing_type: config.marketplace.listing_type.clone(),
            min_discount_fraction: config.detector.min_discount_pct / 100.0,
            retention_days: config.storage.retention_days,
            maintenance_interval: Duration::from_secs(config.storage.maintenance_interval_hours * 3600),
            error_backoff: Duration::from_secs(config.polling.error_backoff_secs),
            dry_run: false,
            rate: config.polling.rate.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[marketplace]
api_url = "https://csfloat.com"
api_key = "from-file"
min_price_cents = 1000

[detector]
min_discount_pct = 12.5

[polling]
base_interval_secs = 8
sleep_ceiling_secs = 40
max_page_size = 50
error_backoff_secs = 5

[storage]
db_path = "/tmp/monitor/listings.db"
retention_days = 3

[notify]
server = "https://ntfy.example.org"
topic = "deals"

[logging]
level = "debug"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.marketplace.min_price_cents, 1000);
        assert_relative_eq!(config.detector.min_discount_pct, 12.5);
        assert_relative_eq!(config.polling.rate.base_interval_secs, 8.0);
        assert_relative_eq!(config.polling.rate.sleep_ceiling_secs, 40.0);
        // Unset tunables keep their defaults
        assert_eq!(config.polling.rate.min_page_size, 25);
        assert_eq!(config.polling.error_backoff_secs, 5);
        assert_eq!(config.storage.retention_days, 3);
        assert_eq!(config.notify.topic, "deals");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.marketplace.api_url, DEFAULT_API_BASE_URL);
        assert_relative_eq!(config.detector.min_discount_pct, 10.0);
        assert_eq!(config.storage.db_path, "data/listings.db");
        assert_eq!(config.storage.retention_days, 7);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_bad_toml() {
        let file = write_config("[detector\nmin_discount_pct = ");
        assert!(matches!(load_config(file.path()).unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_discount() {
        let file = write_config("[detector]\nmin_discount_pct = 150.0\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_invalid_polling_bounds() {
        let file = write_config("[polling]\nmin_page_size = 60\nmax_page_size = 50\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_invalid_window_bounds() {
        let file = write_config("[storage]\nwindow_capacity = 100\nwindow_target = 200\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let file = write_config("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_config_to_orchestrator_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        let orch = OrchestratorConfig::from(&config);

        assert_relative_eq!(orch.min_discount_fraction, 0.125);
        assert_eq!(orch.min_price_cents, 1000);
        assert_eq!(orch.retention_days, 3);
        assert_eq!(orch.maintenance_interval, Duration::from_secs(24 * 3600));
        assert_eq!(orch.error_backoff, Duration::from_secs(5));
        assert!(!orch.dry_run);
        assert!(orch.validate().is_ok());
    }

    #[test]
    fn test_config_to_client_configs() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        let csfloat = CsfloatConfig::from(&config);
        assert_eq!(csfloat.api_key.as_deref(), Some("from-file"));
        assert_eq!(csfloat.timeout, Duration::from_secs(10));

        let ntfy = NtfyConfig::from(&config);
        assert_eq!(ntfy.server, "https://ntfy.example.org");
        assert_eq!(ntfy.topic, "deals");
    }

    #[test]
    fn test_tilde_expansion_in_db_path() {
        let storage = StorageSection {
            db_path: "~/monitor/listings.db".to_string(),
            ..StorageSection::default()
        };
        if std::env::var(ENV_DB_PATH).is_err() {
            assert!(!storage.get_db_path().starts_with('~'));
        }
    }
}
