//! # Register Configuration
//!
//! Loaded once at startup, read-only afterwards.
//!
//! ## Configuration Sources (later wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults (this file)                                                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  2. khazna.toml                                                         │
//! │     --config <path>, or the platform config dir:                        │
//! │       Linux:   ~/.config/register/khazna.toml                           │
//! │       macOS:   ~/Library/Application Support/ly.khazna.register/        │
//! │       Windows: %APPDATA%\khazna\register\config\                        │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. Environment                                                         │
//! │     KHAZNA_DB_PATH  KHAZNA_BASE_CURRENCY  KHAZNA_CASHBOX_ID             │
//! │     KHAZNA_STORE_NAME  KHAZNA_LOG                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```toml
//! [store]
//! name = "Souq Al-Juma Branch"
//!
//! [database]
//! path = "/var/lib/khazna/khazna.db"
//! max_connections = 4
//!
//! [ledger]
//! base_currency = "LYD"
//! cashbox_id = "main"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use khazna_core::{Currency, DEFAULT_CASHBOX_ID};
use khazna_db::LedgerSettings;

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "khazna.toml";

/// Database file name inside the platform data directory.
pub const DATABASE_FILE_NAME: &str = "khazna.db";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Could not determine the platform data directory")]
    NoDataDirectory,
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Displayed on receipts and in logs.
    pub name: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            name: "Khazna Store".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// `None` means `khazna.db` in the platform data directory.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Currency customer balances and purchases are kept in.
    pub base_currency: Currency,
    /// Cashbox used when a request does not name one.
    pub cashbox_id: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        LedgerSection {
            base_currency: Currency::Lyd,
            cashbox_id: DEFAULT_CASHBOX_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// An `EnvFilter` directive; `RUST_LOG` still overrides it.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: "info,khazna=debug,sqlx=warn".to_string(),
        }
    }
}

// =============================================================================
// Register Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    pub store: StoreSection,
    pub database: DatabaseSection,
    pub ledger: LedgerSection,
    pub logging: LoggingSection,
}

impl RegisterConfig {
    /// Loads defaults, then the config file, then the environment.
    ///
    /// An explicit `--config` path must exist; the platform default is
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => RegisterConfig::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overrides fields from `KHAZNA_*` variables found by `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("KHAZNA_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(code) = lookup("KHAZNA_BASE_CURRENCY") {
            self.ledger.base_currency =
                code.parse().map_err(|e: khazna_core::ValidationError| ConfigError::InvalidValue {
                    key: "KHAZNA_BASE_CURRENCY".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(id) = lookup("KHAZNA_CASHBOX_ID") {
            self.ledger.cashbox_id = id;
        }
        if let Some(name) = lookup("KHAZNA_STORE_NAME") {
            self.store.name = name;
        }
        if let Some(level) = lookup("KHAZNA_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.cashbox_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ledger.cashbox_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "database.max_connections".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.store.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "store.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The configured database path, or `khazna.db` in the data directory.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dirs = project_dirs().ok_or(ConfigError::NoDataDirectory)?;
        Ok(dirs.data_dir().join(DATABASE_FILE_NAME))
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            base_currency: self.ledger.base_currency,
            cashbox_id: self.ledger.cashbox_id.clone(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("ly", "khazna", "register")
}

/// `khazna.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
