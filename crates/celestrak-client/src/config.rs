//! Client configuration: defaults, TOML files, and environment overrides.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::client::{DEFAULT_BASE_URL, MAX_RESPONSE_SIZE};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid TOML: {message}")]
    ParseError { message: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },
}

/// Environment variable names.
pub mod vars {
    pub const CELESTRAK_BASE_URL: &str = "CELESTRAK_BASE_URL";
    pub const CELESTRAK_USER_AGENT: &str = "CELESTRAK_USER_AGENT";
    pub const CELESTRAK_MAX_RETRIES: &str = "CELESTRAK_MAX_RETRIES";
    pub const CELESTRAK_RETRY_DELAY_MS: &str = "CELESTRAK_RETRY_DELAY_MS";
    pub const CELESTRAK_MAX_RESPONSE_BYTES: &str = "CELESTRAK_MAX_RESPONSE_BYTES";
}

/// Settings fixed for the lifetime of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin the endpoint paths are resolved against.
    pub base_url: Url,
    /// `User-Agent` header; omitted when `None`.
    pub user_agent: Option<String>,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles after each wait.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Largest accepted response body.
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            user_agent: Some(format!("celestrak-rs/{}", env!("CARGO_PKG_VERSION"))),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_response_bytes: MAX_RESPONSE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Optional file, then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Override fields from the `CELESTRAK_*` variables that are set.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(base) = env::var(vars::CELESTRAK_BASE_URL) {
            self.base_url = Url::parse(base.trim()).map_err(|e| ConfigError::InvalidValue {
                var: vars::CELESTRAK_BASE_URL.to_string(),
                message: e.to_string(),
            })?;
        }

        if let Ok(user_agent) = env::var(vars::CELESTRAK_USER_AGENT) {
            let user_agent = user_agent.trim();
            self.user_agent = (!user_agent.is_empty()).then(|| user_agent.to_string());
        }

        if let Some(retries) = parse_var(vars::CELESTRAK_MAX_RETRIES)? {
            self.max_retries = retries;
        }

        if let Some(delay_ms) = parse_var::<u64>(vars::CELESTRAK_RETRY_DELAY_MS)? {
            self.retry_delay = Duration::from_millis(delay_ms);
        }

        if let Some(max) = parse_var(vars::CELESTRAK_MAX_RESPONSE_BYTES)? {
            self.max_response_bytes = max;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::ValidationError {
                message: format!("base_url cannot be a base: {}", self.base_url),
            });
        }

        if self.max_response_bytes == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_response_bytes must be greater than 0".to_string(),
            });
        }

        if let Some(user_agent) = &self.user_agent {
            if reqwest::header::HeaderValue::from_str(user_agent).is_err() {
                return Err(ConfigError::ValidationError {
                    message: "user_agent is not a valid header value".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn parse_var<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var: var.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
