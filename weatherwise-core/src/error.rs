//! Error taxonomy for providers, the merge stage and the pipeline as a whole.

use thiserror::Error;

use crate::coordinator::FetchAttempt;

/// Failure of a single provider client. Contained by the fetch coordinator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("{provider} does not support location '{location}'")]
    LocationNotSupported { provider: String, location: String },

    #[error("{provider} failed to fetch data: {message}")]
    DataFetch { provider: String, message: String },

    #[error("{provider} timed out")]
    Timeout { provider: String },
}

impl ProviderError {
    pub fn data_fetch(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ProviderError::DataFetch { provider: provider.into(), message: err.to_string() }
    }

    /// Stable identifier used in log events and attempt reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::LocationNotSupported { .. } => "location_not_supported",
            ProviderError::DataFetch { .. } => "data_fetch",
            ProviderError::Timeout { .. } => "timeout",
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::LocationNotSupported { provider, .. }
            | ProviderError::DataFetch { provider, .. }
            | ProviderError::Timeout { provider } => provider,
        }
    }
}

/// No provider contributed any daily series data.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no time series available in any source")]
pub struct InsufficientData;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ForecastError {
    #[error("invalid forecaster parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("cannot forecast an empty series")]
    EmptySeries,
}

/// Pipeline-fatal conditions reported to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every attempted provider rejected the location: bad input rather than outage.
    #[error("location '{location}' is not supported by any provider")]
    LocationNotSupported { location: String },

    #[error("insufficient data for '{location}': {}", summarize(.attempts))]
    InsufficientData { location: String, attempts: Vec<FetchAttempt> },

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

fn summarize(attempts: &[FetchAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers were attempted".to_string();
    }

    attempts
        .iter()
        .map(|a| format!("{} ({})", a.provider, a.outcome))
        .collect::<Vec<_>>()
        .join(", ")
}
