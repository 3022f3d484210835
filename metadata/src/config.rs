use serde::Deserialize;
use std::fs::File;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("hang timeout cannot be 0")]
    ZeroHangTimeout,

    #[error("client timeout ({client}s) must be greater than the hang timeout ({hang}s)")]
    ClientTimeoutTooShort { client: u64, hang: u64 },

    #[error("unsupported metadata URL scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.metadata.validate()
    }
}

/// Where and how long to wait for the metadata server.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    pub url: Url,
    /// Server side wait for a change, sent as `timeout_sec`
    pub hang_timeout_secs: u64,
    /// Upper bound for a whole request, including the server side wait
    pub client_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        MetadataConfig {
            url: Url::parse(DEFAULT_METADATA_URL).expect("default metadata URL is valid"),
            hang_timeout_secs: 60,
            client_timeout_secs: 70,
        }
    }
}

impl MetadataConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hang_timeout_secs == 0 {
            return Err(ValidationError::ZeroHangTimeout);
        }

        if self.client_timeout_secs <= self.hang_timeout_secs {
            return Err(ValidationError::ClientTimeoutTooShort {
                client: self.client_timeout_secs,
                hang: self.hang_timeout_secs,
            });
        }

        match self.url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, `RUST_LOG` takes precedence when set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".into(),
        }
    }
}
