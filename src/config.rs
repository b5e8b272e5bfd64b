//! Configuration surface consumed from the host application.
//!
//! Configuration is read from YAML. Durations use human-readable values such
//! as `90days`, `1h` or `250ms`. Every section has defaults, so an empty
//! document selects the hash strategy with the in-memory store settings.
//!
//! ```yaml
//! strategy: database
//! database:
//!   thread_id_prefix: teams
//!   store_timeout: 2s
//!   backend:
//!     kind: postgres
//!     url: postgres://bridge@localhost/bridge
//! lifecycle:
//!   inactivity_threshold: 90days
//!   sweep_interval: 1h
//! ```

use crate::mapping::domain::StrategyKind;
use crate::mapping::resolvers::{
    DEFAULT_HASH_LENGTH, DEFAULT_STORE_TIMEOUT, DEFAULT_THREAD_PREFIX, MAX_HASH_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_INACTIVITY_THRESHOLD: Duration = Duration::from_secs(90 * 24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is outside its permitted range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Strategy used to resolve threads.
    pub strategy: StrategyKind,
    /// Hash strategy parameters.
    pub hash: HashSettings,
    /// Database strategy parameters.
    pub database: DatabaseSettings,
    /// Channel tenancy model.
    pub tenancy: TenancySettings,
    /// Sweep parameters.
    pub lifecycle: LifecycleSettings,
    /// Falls back to the hash strategy when the mapping store is unavailable.
    pub fallback_to_hash: bool,
}

/// Hash strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashSettings {
    /// Thread identifier prefix.
    pub prefix: String,
    /// Hex digits kept from the digest.
    pub hash_length: usize,
    /// Optional secret mixed into every digest.
    pub salt: Option<String>,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_THREAD_PREFIX.to_owned(),
            hash_length: DEFAULT_HASH_LENGTH,
            salt: None,
        }
    }
}

/// Database strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// Prefix of generated thread identifiers.
    pub thread_id_prefix: String,
    /// Mapping store backend.
    pub backend: BackendSettings,
    /// Bound applied to every store call.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            thread_id_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
            backend: BackendSettings::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Mapping store backend selection and connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSettings {
    /// In-process store; mappings do not survive a restart.
    #[default]
    Memory,
    /// Embedded document store rooted at `path`.
    Document {
        /// Database directory.
        path: PathBuf,
    },
    /// `PostgreSQL` relational store.
    Postgres {
        /// Connection URL.
        url: String,
        /// Pool size.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

const fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// Channel tenancy model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenancySettings {
    /// Every message must carry a tenant.
    pub multi_tenant: bool,
    /// Tenant attributed to messages on a single-tenant channel.
    pub default_tenant: Option<String>,
}

impl Default for TenancySettings {
    fn default() -> Self {
        Self {
            multi_tenant: true,
            default_tenant: None,
        }
    }
}

/// Sweep parameters for the lifecycle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSettings {
    /// Mappings idle for longer than this are removed.
    #[serde(with = "humantime_serde")]
    pub inactivity_threshold: Duration,
    /// Period of the background sweep.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Rows touched within this window are never removed.
    #[serde(with = "humantime_serde")]
    pub grace_window: Duration,
    /// Rows selected per batch.
    pub batch_size: usize,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            inactivity_threshold: DEFAULT_INACTIVITY_THRESHOLD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            grace_window: Duration::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown fields,
    /// and [`ConfigError::Invalid`] when [`Self::validate`] rejects a value.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`Self::from_yaml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = path.as_ref();
        let source = std::fs::read_to_string(file).map_err(|err| ConfigError::Read {
            path: file.to_path_buf(),
            source: err,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Checks value ranges and cross-field rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first rejected value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash.prefix.trim().is_empty() {
            return Err(invalid("hash.prefix", "must not be empty"));
        }
        if !(1..=MAX_HASH_LENGTH).contains(&self.hash.hash_length) {
            return Err(invalid("hash.hash_length", "must be between 1 and 64"));
        }
        if self.hash.salt.as_deref().is_some_and(|salt| salt.is_empty()) {
            return Err(invalid("hash.salt", "must not be empty when set"));
        }
        self.database.validate()?;
        self.tenancy.validate()?;
        self.lifecycle.validate()
    }
}

impl DatabaseSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_id_prefix.trim().is_empty() {
            return Err(invalid("database.thread_id_prefix", "must not be empty"));
        }
        if self.store_timeout.is_zero() {
            return Err(invalid("database.store_timeout", "must be positive"));
        }
        match &self.backend {
            BackendSettings::Memory => Ok(()),
            BackendSettings::Document { path } if path.as_os_str().is_empty() => {
                Err(invalid("database.backend.path", "must not be empty"))
            }
            BackendSettings::Document { .. } => Ok(()),
            BackendSettings::Postgres { url, .. } if url.trim().is_empty() => {
                Err(invalid("database.backend.url", "must not be empty"))
            }
            BackendSettings::Postgres {
                max_connections, ..
            } if *max_connections == 0 => Err(invalid(
                "database.backend.max_connections",
                "must be positive",
            )),
            BackendSettings::Postgres { .. } => Ok(()),
        }
    }
}

impl TenancySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let has_default = self
            .default_tenant
            .as_deref()
            .is_some_and(|tenant| !tenant.trim().is_empty());
        if !self.multi_tenant && !has_default {
            return Err(invalid(
                "tenancy.default_tenant",
                "required when multi_tenant is false",
            ));
        }
        Ok(())
    }
}

impl LifecycleSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_threshold.is_zero() {
            return Err(invalid("lifecycle.inactivity_threshold", "must be positive"));
        }
        if self.sweep_interval.is_zero() {
            return Err(invalid("lifecycle.sweep_interval", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("lifecycle.batch_size", "must be positive"));
        }
        Ok(())
    }
}

const fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
