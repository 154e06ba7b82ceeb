//! Error taxonomy for the price pipeline.
//!
//! Each concern has its own enum so callers can match on exactly the failures a
//! stage can produce. `PipelineError` composes them for the service layer.
//!
//! Per-symbol missing data is deliberately absent here: it is a warning carried
//! alongside a successful result (see `NormalizedPrices::missing_symbols`).

use chrono::NaiveDate;
use thiserror::Error;

/// Query construction failures, raised before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query must contain at least one symbol")]
    EmptySymbols,

    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Provider fetch failures. Fatal for the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("provider request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("provider returned no data for any requested symbol")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether a caller-driven retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::NetworkUnreachable(_)
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::Upstream(_)
        )
    }
}

/// The raw provider output has a shape the normalizer does not recognize.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed provider output [{shape}]: {reason}")]
pub struct MalformedOutputError {
    /// Description of the offending raw shape, for diagnosis.
    pub shape: String,
    pub reason: String,
}

impl MalformedOutputError {
    pub fn new(shape: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            reason: reason.into(),
        }
    }
}

/// A price field name that is neither `close` nor `adjusted_close`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown price field '{0}' (expected 'close' or 'adjusted_close')")]
pub struct UnknownFieldError(pub String);

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything that can fail a price request end to end.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    #[error("provider fetch failed: {0}")]
    ProviderFetch(#[from] ProviderError),

    #[error(transparent)]
    MalformedProviderOutput(#[from] MalformedOutputError),

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::ProviderFetch(e) => e.is_retryable(),
            _ => false,
        }
    }
}
