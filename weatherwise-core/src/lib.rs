//! Core library for the `weatherwise` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The provider client abstraction and the built-in providers
//! - Concurrent multi-provider fetch with partial-failure handling
//! - Consensus aggregation of scalar readings and merging of daily series
//! - The forecasting boundary and the end-to-end pipeline
//!
//! It is used by `weatherwise-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod forecast;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod stats;

pub use aggregate::Aggregator;
pub use config::{Config, Coordinates, ProviderConfig};
pub use context::Context;
pub use coordinator::{FetchAttempt, FetchCoordinator, FetchOutcome, FetchReport};
pub use error::{ForecastError, InsufficientData, PipelineError, ProviderError};
pub use forecast::{Forecaster, HoltForecaster, MAX_HORIZON_DAYS};
pub use merge::SeriesMerger;
pub use model::{
    AggregatedSummary, CanonicalPoint, CanonicalSeries, FieldSummary, ForecastRow, Metric,
    Observation, SeriesPoint,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use provider::{ProviderClient, ProviderId};
