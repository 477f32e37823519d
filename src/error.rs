use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unable to load billing credentials: {0}")]
    Credentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

/// Failure of a single page request against the billing source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillingError {
    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("billing API error: {0}")]
    Api(String),

    #[error("invalid request: {0}")]
    Request(String),
}

impl BillingError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BillingError::Throttled(_) | BillingError::Transport(_) | BillingError::Timeout(_)
        )
    }
}

#[derive(Debug, Error)]
#[error("failed to get cost and usage for {start} to {end}: {source}")]
pub struct FetchError {
    pub start: String,
    pub end: String,
    #[source]
    pub source: BillingError,
}
