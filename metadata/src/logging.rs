use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLevel(#[from] ParseError),
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Installs a fmt subscriber for agents embedding the watcher. `RUST_LOG`
/// overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => configured_filter(config),
    }
}

fn configured_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    Ok(EnvFilter::try_new(&config.level)?)
}
