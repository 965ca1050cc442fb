//! End-to-end cycle: fetch, aggregate, merge, forecast.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    aggregate::Aggregator,
    context::Context,
    coordinator::{FetchCoordinator, FetchReport},
    error::PipelineError,
    forecast::{Forecaster, HoltForecaster},
    merge::SeriesMerger,
    model::{AggregatedSummary, CanonicalSeries, ForecastRow},
    provider::ProviderClient,
};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub location: String,
    pub fetch: FetchReport,
    pub summary: AggregatedSummary,
    pub series: CanonicalSeries,
    pub forecast: Vec<ForecastRow>,
}

impl PipelineReport {
    pub fn future_rows(&self) -> impl Iterator<Item = &ForecastRow> {
        self.forecast.iter().filter(|r| r.is_future)
    }
}

#[derive(Debug)]
pub struct Pipeline {
    clients: Vec<Arc<dyn ProviderClient>>,
    coordinator: FetchCoordinator,
    aggregator: Aggregator,
    merger: SeriesMerger,
    forecaster: Box<dyn Forecaster>,
    horizon_days: u32,
}

impl Pipeline {
    /// Build a pipeline with the default Holt forecaster.
    pub fn new(ctx: &Context, clients: Vec<Arc<dyn ProviderClient>>) -> Result<Self, PipelineError> {
        let forecaster = HoltForecaster::from_context(ctx)?;
        Ok(Self::with_forecaster(ctx, clients, Box::new(forecaster)))
    }

    pub fn with_forecaster(
        ctx: &Context,
        clients: Vec<Arc<dyn ProviderClient>>,
        forecaster: Box<dyn Forecaster>,
    ) -> Self {
        Self {
            clients,
            coordinator: FetchCoordinator::new(ctx),
            aggregator: Aggregator::new(ctx),
            merger: SeriesMerger::new(ctx),
            forecaster,
            horizon_days: ctx.config.forecast.horizon_days,
        }
    }

    pub fn with_horizon(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    /// Fetch and aggregate only; no series data required.
    pub async fn summarize(
        &self,
        location: &str,
    ) -> Result<(FetchReport, AggregatedSummary), PipelineError> {
        let fetch = self.coordinator.fetch_all(location, &self.clients).await?;
        let summary = self.aggregator.aggregate(&fetch.observations);
        Ok((fetch, summary))
    }

    #[instrument(skip(self), fields(horizon = self.horizon_days))]
    pub async fn run(&self, location: &str) -> Result<PipelineReport, PipelineError> {
        let (fetch, summary) = self.summarize(location).await?;

        let series = self.merger.merge(&fetch.observations).map_err(|_| {
            PipelineError::InsufficientData {
                location: location.to_string(),
                attempts: fetch.attempts.clone(),
            }
        })?;

        let forecast = self.forecaster.forecast(&series, self.horizon_days)?;

        info!(
            sources = fetch.succeeded(),
            days = series.len(),
            rows = forecast.len(),
            "pipeline finished"
        );

        Ok(PipelineReport { location: location.to_string(), fetch, summary, series, forecast })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        config::Config,
        coordinator::FetchOutcome,
        error::ProviderError,
        model::{Metric, Observation, SeriesPoint},
    };

    #[derive(Debug)]
    struct StaticClient {
        name: &'static str,
        result: Result<Observation, ProviderError>,
    }

    #[async_trait]
    impl ProviderClient for StaticClient {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn fetch(&self, _location: &str) -> Result<Observation, ProviderError> {
            self.result.clone()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    fn ok_client(name: &'static str, avg: f64, temps: &[(u32, f64)]) -> Arc<dyn ProviderClient> {
        let obs = Observation::empty(name, "warsaw")
            .with_metric(Metric::AvgTemp, Some(avg))
            .with_series(temps.iter().map(|(d, t)| SeriesPoint::new(day(*d), *t)).collect());
        Arc::new(StaticClient { name, result: Ok(obs) })
    }

    fn failing_client(name: &'static str) -> Arc<dyn ProviderClient> {
        Arc::new(StaticClient { name, result: Err(ProviderError::data_fetch(name, "down")) })
    }

    fn context() -> Context {
        let mut cfg = Config::default();
        cfg.fetch.workers = Some(2);
        cfg.forecast.horizon_days = 3;
        Context::new(cfg)
    }

    #[tokio::test]
    async fn full_cycle_produces_forecast() {
        let clients = vec![
            ok_client("a", 10.0, &[(1, 10.0), (2, 11.0)]),
            ok_client("b", 20.0, &[(1, 20.0), (3, 12.0)]),
            failing_client("c"),
        ];

        let pipeline = Pipeline::new(&context(), clients).expect("pipeline");
        let report = pipeline.run("warsaw").await.expect("report");

        assert_eq!(report.fetch.observations.len(), 2);
        assert_eq!(report.summary.get(Metric::AvgTemp).value, Some(15.0));
        assert_eq!(report.series.len(), 3);
        assert_eq!(report.series.points[0].mean_temperature, 15.0);
        assert_eq!(report.forecast.len(), 6);
        assert_eq!(report.future_rows().count(), 3);
    }

    #[tokio::test]
    async fn no_series_is_fatal_and_lists_attempts() {
        let clients = vec![ok_client("a", 10.0, &[]), failing_client("b")];

        let pipeline = Pipeline::new(&context(), clients).expect("pipeline");
        let err = pipeline.run("warsaw").await.unwrap_err();

        match err {
            PipelineError::InsufficientData { location, mut attempts } => {
                assert_eq!(location, "warsaw");
                attempts.sort_by(|x, y| x.provider.cmp(&y.provider));
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].outcome, FetchOutcome::Succeeded);
                assert!(matches!(attempts[1].outcome, FetchOutcome::Failed { kind: "data_fetch", .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn summarize_works_without_series() {
        let clients = vec![ok_client("a", 10.0, &[]), ok_client("b", 12.0, &[])];

        let pipeline = Pipeline::new(&context(), clients).expect("pipeline");
        let (fetch, summary) = pipeline.summarize("warsaw").await.expect("summary");

        assert_eq!(fetch.succeeded(), 2);
        assert_eq!(summary.get(Metric::AvgTemp).value, Some(11.0));
    }

    #[test]
    fn invalid_forecast_config_fails_construction() {
        let mut cfg = Config::default();
        cfg.forecast.alpha = 0.0;

        let err = Pipeline::new(&Context::new(cfg), vec![]).unwrap_err();
        assert!(matches!(err, PipelineError::Forecast(_)));
    }
}
