//! # Engine Configuration
//!
//! Configuration for the tax engine and the `customs-calc` binary.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CUSTOMS_DB_PATH=/srv/customs/customs.db                            │
//! │     CUSTOMS_DB_MAX_CONNECTIONS=8                                       │
//! │     CUSTOMS_EXEMPT_COUNTRIES=IT,TR,PT,TN,BA                            │
//! │     CUSTOMS_LOG=info,customs=trace                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/customs-desk/customs.toml (Linux)                        │
//! │     ~/Library/Application Support/com.customs.desk/customs.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # customs.toml
//! [database]
//! path = "/srv/customs/customs.db"
//! max_connections = 5
//!
//! [policy]
//! exempt_countries = ["IT", "TR", "PT", "TN", "BA"]
//!
//! [policy.country_codes]
//! BD = "666"
//!
//! [logging]
//! filter = "info,customs=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use customs_core::validation::validate_country_code;
use customs_core::{CountryCodeMap, ExemptCountries, DEFAULT_EXEMPT_COUNTRIES};
use customs_db::DbConfig;

const CONFIG_FILE_NAME: &str = "customs.toml";
const DATABASE_FILE_NAME: &str = "customs.db";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Default: 5
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "customs", "desk")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Policy Settings
// =============================================================================

/// Origin-country policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Origins for which an A.TR certificate zeroes both duty rates.
    #[serde(default = "default_exempt_countries")]
    pub exempt_countries: Vec<String>,

    /// Overrides merged on top of the built-in declaration country codes.
    #[serde(default)]
    pub country_codes: BTreeMap<String, String>,
}

fn default_exempt_countries() -> Vec<String> {
    DEFAULT_EXEMPT_COUNTRIES.iter().map(|c| c.to_string()).collect()
}

impl Default for PolicySettings {
    fn default() -> Self {
        PolicySettings {
            exempt_countries: default_exempt_countries(),
            country_codes: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Filter used until a config is loaded, and when it sets none.
pub const DEFAULT_LOG_FILTER: &str = "info,customs=debug,sqlx=warn";

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub policy: PolicySettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`customs.toml`)
    /// 3. Environment variables
    ///
    /// A missing file at the default location means defaults; a missing
    /// file at an explicit `config_path` is an error.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        let explicit = config_path.is_some();
        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else if explicit {
                return Err(EngineError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a config document; missing sections take their defaults.
    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Renders the effective configuration.
    pub fn to_toml(&self) -> EngineResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(EngineError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        for country in &self.policy.exempt_countries {
            validate_country_code(country).map_err(|e| {
                EngineError::Config(format!("policy.exempt_countries: {e} ('{country}')"))
            })?;
        }

        for (country, code) in &self.policy.country_codes {
            validate_country_code(country).map_err(|e| {
                EngineError::Config(format!("policy.country_codes: {e} ('{country}')"))
            })?;
            let code = code.trim();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(EngineError::Config(format!(
                    "policy.country_codes.{country} must be a 3-digit code, got '{code}'"
                )));
            }
        }

        if self.logging.filter.trim().is_empty() {
            return Err(EngineError::Config("logging.filter must not be empty".into()));
        }

        Ok(())
    }

    /// The exempt-origin set injected into the calculator.
    pub fn exempt_countries(&self) -> ExemptCountries {
        ExemptCountries::new(&self.policy.exempt_countries)
    }

    /// Declaration country codes with the configured overrides applied.
    pub fn country_codes(&self) -> CountryCodeMap {
        CountryCodeMap::with_overrides(&self.policy.country_codes)
    }

    /// Pool settings for [`customs_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CUSTOMS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("CUSTOMS_DB_MAX_CONNECTIONS") {
            match max.trim().parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid CUSTOMS_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(list) = lookup("CUSTOMS_EXEMPT_COUNTRIES") {
            let countries: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            debug!(?countries, "Overriding exempt countries from environment");
            self.policy.exempt_countries = countries;
        }

        if let Some(filter) = lookup("CUSTOMS_LOG") {
            self.logging.filter = filter;
        }
    }

    /// `customs.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "customs", "desk")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
