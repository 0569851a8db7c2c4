//! # Sync Configuration
//!
//! Configuration management for the reconciliation engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LEDGERLINE_ACCESS_TOKEN=...                                        │
//! │     LEDGERLINE_BASE_URL=https://ledger.example.com                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/ledgerline/ledgerline.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     30-day lookback, 100-item pages, 200ms batch pause                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledgerline.toml
//! [api]
//! base_url = "https://ledger.example.com"
//! access_token = ""          # prefer LEDGERLINE_ACCESS_TOKEN
//! api_version = "2025-06-04"
//! page_size = 100
//!
//! [window]
//! lookback_days = 30
//! batch_pause_ms = 200
//!
//! [commission]
//! fee_share = 0.0            # staff share of the processing fee
//! tip_strategy = "reported"  # reported | derived_residual
//! zero_refunded_amounts = false
//!
//! [storage]
//! database_path = "/var/lib/ledgerline/ledgerline.db"
//! rate_book_path = "/etc/ledgerline/rates.toml"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use ledgerline_core::commission::{CommissionPolicy, TipStrategy};
use ledgerline_core::Rate;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// Remote ledger API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the remote ledger (no trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential. Prefer the LEDGERLINE_ACCESS_TOKEN environment
    /// variable over writing this into the file.
    #[serde(default)]
    pub access_token: String,

    /// API-version header value sent with every request.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Page size for the transaction search.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://ledger.example.com".to_string()
}

fn default_api_version() -> String {
    "2025-06-04".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            access_token: String::new(),
            api_version: default_api_version(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiSettings {
    /// Per-request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Window Settings
// =============================================================================

/// Sync-window behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Days scanned on first run or after a state reset.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Fixed pause between chunked batch calls (milliseconds), to stay
    /// under the upstream rate limit. All remote calls are serial.
    #[serde(default = "default_batch_pause")]
    pub batch_pause_ms: u64,
}

fn default_lookback_days() -> i64 {
    30
}

fn default_batch_pause() -> u64 {
    200
}

impl Default for WindowSettings {
    fn default() -> Self {
        WindowSettings {
            lookback_days: default_lookback_days(),
            batch_pause_ms: default_batch_pause(),
        }
    }
}

impl WindowSettings {
    /// Inter-call pause as a Duration.
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

// =============================================================================
// Commission Settings
// =============================================================================

/// Commission computation settings.
///
/// Rates accept any form the normalizer understands: a fraction (`0.5`),
/// a whole percentage (`50`), or a percent string (`"50%"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionSettings {
    /// Staff share of the processing fee. 0 disables fee sharing.
    #[serde(default)]
    pub fee_share: Option<toml::Value>,

    /// Tip derivation strategy.
    #[serde(default)]
    pub tip_strategy: TipStrategy,

    /// Legacy behavior: zero every monetary output on refunded rows.
    #[serde(default)]
    pub zero_refunded_amounts: bool,
}

impl CommissionSettings {
    /// Builds the engine policy from these settings.
    pub fn policy(&self) -> CommissionPolicy {
        CommissionPolicy {
            fee_share: rate_from_toml(self.fee_share.as_ref()),
            tip_strategy: self.tip_strategy,
            zero_refunded_amounts: self.zero_refunded_amounts,
        }
    }
}

/// Normalizes a loosely-typed TOML value into a rate, mirroring the JSON
/// normalizer in ledgerline-core.
pub fn rate_from_toml(value: Option<&toml::Value>) -> Rate {
    match value {
        None => Rate::zero(),
        Some(toml::Value::Integer(n)) => Rate::from_number(*n as f64),
        Some(toml::Value::Float(f)) => Rate::from_number(*f),
        Some(toml::Value::String(s)) => Rate::from_loose_str(s),
        Some(_) => Rate::zero(),
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite database path (caches, cursor, processed rows).
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Rate Source table (TOML) path.
    #[serde(default = "default_rate_book_path")]
    pub rate_book_path: PathBuf,
}

fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "ledgerline", "ledgerline")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "ledgerline", "ledgerline")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

fn default_database_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledgerline.db")
}

fn default_rate_book_path() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rates.toml")
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            database_path: default_database_path(),
            rate_book_path: default_rate_book_path(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration for a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote ledger API settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Sync-window behavior.
    #[serde(default)]
    pub window: WindowSettings,

    /// Commission computation settings.
    #[serde(default)]
    pub commission: CommissionSettings,

    /// Local storage locations.
    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (ledgerline.toml)
    /// 3. Environment variables
    ///
    /// Loading does NOT validate: maintenance commands (status, reset)
    /// must work without a credential. Call [`SyncConfig::validate`]
    /// before anything that talks to the remote ledger.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)
                    .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// A missing credential is fatal here — before any remote call is
    /// attempted — so a misconfigured scheduler fails loudly instead of
    /// burning a sync window.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api.access_token.is_empty() {
            return Err(SyncError::MissingCredential);
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(SyncError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "page_size must be greater than 0".into(),
            ));
        }

        if self.window.lookback_days <= 0 {
            return Err(SyncError::InvalidConfig(
                "lookback_days must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("LEDGERLINE_ACCESS_TOKEN") {
            debug!("Overriding access token from environment");
            self.api.access_token = token;
        }

        if let Ok(url) = std::env::var("LEDGERLINE_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.api.base_url = url;
        }

        if let Ok(version) = std::env::var("LEDGERLINE_API_VERSION") {
            self.api.api_version = version;
        }

        if let Ok(days) = std::env::var("LEDGERLINE_LOOKBACK_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.window.lookback_days = d;
            } else {
                warn!(value = %days, "Ignoring unparseable LEDGERLINE_LOOKBACK_DAYS");
            }
        }

        if let Ok(path) = std::env::var("LEDGERLINE_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("LEDGERLINE_RATES_PATH") {
            self.storage.rate_book_path = PathBuf::from(path);
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "ledgerline", "ledgerline")
            .map(|dirs| dirs.config_dir().join("ledgerline.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.api.access_token = "token-123".into();
        config
    }

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.api.page_size, 100);
        assert_eq!(config.window.lookback_days, 30);
        assert_eq!(config.window.batch_pause_ms, 200);
        assert_eq!(config.commission.tip_strategy, TipStrategy::Reported);
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let config = SyncConfig::default();
        assert!(matches!(
            config.validate(),
            Err(SyncError::MissingCredential)
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.api.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());

        config.api.base_url = "https://ledger.example.com".into();
        config.api.page_size = 0;
        assert!(config.validate().is_err());

        config.api.page_size = 100;
        config.window.lookback_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parse() {
        let toml_str = r#"
            [api]
            base_url = "https://ledger.test"
            access_token = "abc"

            [window]
            lookback_days = 7

            [commission]
            fee_share = "50%"
            tip_strategy = "derived_residual"
            zero_refunded_amounts = true
        "#;
        let config: SyncConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://ledger.test");
        assert_eq!(config.window.lookback_days, 7);

        let policy = config.commission.policy();
        assert_eq!(policy.fee_share.bps(), 5_000);
        assert_eq!(policy.tip_strategy, TipStrategy::DerivedResidual);
        assert!(policy.zero_refunded_amounts);
    }

    #[test]
    fn test_rate_from_toml_forms() {
        assert_eq!(rate_from_toml(Some(&toml::Value::Float(0.5))).bps(), 5_000);
        assert_eq!(rate_from_toml(Some(&toml::Value::Integer(50))).bps(), 5_000);
        assert_eq!(
            rate_from_toml(Some(&toml::Value::String("50%".into()))).bps(),
            5_000
        );
        assert_eq!(
            rate_from_toml(Some(&toml::Value::String(String::new()))).bps(),
            0
        );
        assert_eq!(rate_from_toml(None).bps(), 0);
    }

    #[test]
    fn test_commission_defaults_to_no_fee_share() {
        let policy = CommissionSettings::default().policy();
        assert!(policy.fee_share.is_zero());
        assert!(!policy.zero_refunded_amounts);
    }
}
