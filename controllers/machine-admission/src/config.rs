//! Typed configuration loaded from environment variables.
//!
//! Unrecoverable configuration problems come back as a `ConfigError`
//! for the caller to handle; nothing in here exits the process.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {variable}: {reason}")]
    InvalidValue {
        /// The offending variable
        variable: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Webhook configuration, sourced from `MAAS_*` and server variables
#[derive(Debug, Clone)]
pub struct Config {
    /// MAAS base URL, e.g. "http://maas:5240/MAAS"
    pub maas_api_url: String,
    /// MAAS API version segment
    pub maas_api_version: String,
    /// MAAS API key (consumer:token:secret)
    pub maas_api_key: String,
    /// Address the admission server listens on
    pub bind_addr: String,
    /// Namespace whose Machine objects are managed
    pub namespace: Option<String>,
    /// Distro series deployed when a Machine names no image
    pub default_image: Option<String>,
    /// Per-call deadline for MAAS and binding store calls
    pub call_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let maas_api_url = env::var("MAAS_API_URL")
            .unwrap_or_else(|_| "http://localhost:5240/MAAS".to_string());
        let maas_api_version = env::var("MAAS_API_VERSION").unwrap_or_else(|_| "2.0".to_string());
        let maas_api_key =
            env::var("MAAS_API_KEY").map_err(|_| ConfigError::MissingVar("MAAS_API_KEY"))?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8443".to_string());
        let namespace = env::var("WATCH_NAMESPACE").ok();
        let default_image = env::var("MACHINE_DISTRO_SERIES").ok();

        let call_timeout = match env::var("CALL_TIMEOUT_SECS") {
            Err(_) => Duration::from_secs(60),
            Ok(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue {
                    variable: "CALL_TIMEOUT_SECS",
                    reason: e.to_string(),
                }
            })?),
        };

        Ok(Self {
            maas_api_url,
            maas_api_version,
            maas_api_key,
            bind_addr,
            namespace,
            default_image,
            call_timeout,
        })
    }
}
