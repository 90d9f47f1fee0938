//! Client configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional file,
//! then `NAMING_*` environment variables.
//!
//! ```toml
//! endpoints = ["http://10.0.0.1:2379", "http://10.0.0.2:2379"]
//! request_timeout_ms = 1000
//! enforce_known_types = false
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Prefix of the environment variables read by [`ClientConfig::load`]
pub const ENV_PREFIX: &str = "NAMING";

/// Store endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:2379";

/// Errors from configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("at least one store endpoint is required")]
    NoEndpoints,
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Registry client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Store endpoints, as a list or a comma-separated string
    #[serde(default = "default_endpoints", deserialize_with = "endpoint_list")]
    pub endpoints: Vec<String>,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Reject service types outside the known set on create and update
    #[serde(default)]
    pub enforce_known_types: bool,
}

fn default_endpoints() -> Vec<String> {
    vec![DEFAULT_ENDPOINT.to_string()]
}

fn default_request_timeout_ms() -> u64 {
    1000
}

fn endpoint_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Endpoints {
        List(Vec<String>),
        Joined(String),
    }

    let raw = match Endpoints::deserialize(deserializer)? {
        Endpoints::List(list) => list,
        Endpoints::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };

    Ok(raw
        .iter()
        .map(|endpoint| endpoint.trim())
        .filter(|endpoint| !endpoint.is_empty())
        .map(str::to_string)
        .collect())
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            request_timeout_ms: default_request_timeout_ms(),
            enforce_known_types: false,
        }
    }
}

impl ClientConfig {
    /// Load from an optional file and the `NAMING_*` environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config = Self::from_source(builder.build()?)?;
        debug!(
            endpoints = ?config.endpoints,
            request_timeout_ms = config.request_timeout_ms,
            enforce_known_types = config.enforce_known_types,
            "Loaded client configuration"
        );
        Ok(config)
    }

    /// Parse a TOML document, without consulting the environment.
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::from_source(config)
    }

    fn from_source(source: Config) -> ConfigResult<Self> {
        let config: Self = source.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
