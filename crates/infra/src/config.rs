//! Configuration loading and representation.
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file) or from any JSON document deserialized into [`EngineConfig`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use itsm_observability::LogFormat;

pub const ENV_DATABASE_URL: &str = "ITSM_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "ITSM_DB_MAX_CONNECTIONS";
pub const ENV_BASE_DOMAIN: &str = "ITSM_BASE_DOMAIN";
pub const ENV_LOG_FORMAT: &str = "ITSM_LOG_FORMAT";
pub const ENV_REQUIRED_RESOURCE_TYPES: &str = "ITSM_REQUIRED_RESOURCE_TYPES";

/// Resource types whose owner lookups must be registered before start-up.
pub const STANDARD_RESOURCE_TYPES: [&str; 4] = ["incident", "problem", "change", "asset"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PostgreSQL URL. When unset the engine runs on in-memory stores.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Suffix appended to a request subdomain before the domain lookup
    /// (`acme` + `itsm.example.com` → `acme.itsm.example.com`).
    pub base_domain: Option<String>,
    pub log_format: LogFormat,
    pub required_resource_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            base_domain: None,
            log_format: LogFormat::Json,
            required_resource_types: STANDARD_RESOURCE_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        config.database_url = get(ENV_DATABASE_URL);
        config.base_domain = get(ENV_BASE_DOMAIN).map(|d| d.to_ascii_lowercase());

        if let Some(raw) = get(ENV_MAX_CONNECTIONS) {
            let parsed = raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: ENV_MAX_CONNECTIONS,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_MAX_CONNECTIONS,
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_connections = parsed;
        }

        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(|reason| ConfigError::Invalid {
                key: ENV_LOG_FORMAT,
                value: raw.clone(),
                reason,
            })?;
        }

        if let Some(raw) = get(ENV_REQUIRED_RESOURCE_TYPES) {
            config.required_resource_types = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}
