//! Environment variable names used by this crate for convenient
//! configuration of the ingest pipeline from services.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

use crate::attribute::AttributeSpec;
use crate::error::ConfigError;
use crate::init::{IngestConfig, DEFAULT_MANAGER_NAME};

/// Ingest endpoint URL, e.g. `https://{env-id}.live.example.com/api/v2/logs/ingest`.
pub const LOG_INGEST_URL_ENV: &str = "LOG_INGEST_URL";

/// API token with log ingest permission.
pub const LOG_INGEST_TOKEN_ENV: &str = "LOG_INGEST_TOKEN";

/// `false` disables certificate validation. Defaults to `true`.
pub const LOG_INGEST_TLS_VALIDATION_ENV: &str = "LOG_INGEST_TLS_VALIDATION";

/// Optional manager name shared by pipelines in one process.
pub const LOG_INGEST_MANAGER_ENV: &str = "LOG_INGEST_MANAGER";

/// Optional comma separated `name=value` attributes. Values containing
/// `${...}` are resolved per record.
pub const LOG_INGEST_ATTRIBUTES_ENV: &str = "LOG_INGEST_ATTRIBUTES";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl IngestConfig {
    /// Build a config from the `LOG_INGEST_*` variables. Missing endpoint
    /// or token are reported when the pipeline is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        let tls_validation = parse_bool(
            LOG_INGEST_TLS_VALIDATION_ENV,
            &env_or(LOG_INGEST_TLS_VALIDATION_ENV, "true"),
        )?;
        let attributes = parse_attributes(&env_or(LOG_INGEST_ATTRIBUTES_ENV, ""))?;

        Ok(IngestConfig {
            manager_name: env_or(LOG_INGEST_MANAGER_ENV, DEFAULT_MANAGER_NAME),
            endpoint: env_or(LOG_INGEST_URL_ENV, ""),
            token: env_or(LOG_INGEST_TOKEN_ENV, ""),
            tls_validation,
            attributes,
            ..IngestConfig::default()
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_attributes(value: &str) -> Result<Vec<AttributeSpec>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => Ok(AttributeSpec::new(name.trim(), value.trim())),
            None => Err(ConfigError::InvalidEnv {
                key: LOG_INGEST_ATTRIBUTES_ENV,
                value: pair.to_string(),
            }),
        })
        .collect()
}
