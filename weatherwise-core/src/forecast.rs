//! Forecasting boundary: canonical series in, dated point forecasts with intervals out.

use chrono::{Duration as ChronoDuration, NaiveDate};
use tracing::debug;

use crate::{
    context::Context,
    error::ForecastError,
    model::{CanonicalSeries, ForecastRow},
    stats::{self, StdDevKind},
};

/// Longest horizon a forecaster accepts, in days.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// A black-box forecaster over the merged daily series.
pub trait Forecaster: Send + Sync + std::fmt::Debug {
    /// Rows for every observed date followed by `horizon_days` future days.
    fn forecast(
        &self,
        series: &CanonicalSeries,
        horizon_days: u32,
    ) -> Result<Vec<ForecastRow>, ForecastError>;
}

/// Holt's linear (double exponential) smoothing.
///
/// The series is treated as a sequence in date order; gaps are not resampled.
/// Intervals come from the one-step residual spread, widened by `sqrt(h)`.
#[derive(Debug, Clone)]
pub struct HoltForecaster {
    alpha: f64,
    beta: f64,
    confidence: f64,
}

impl HoltForecaster {
    pub fn new(alpha: f64, beta: f64, confidence: f64) -> Result<Self, ForecastError> {
        for (name, value) in [("alpha", alpha), ("beta", beta), ("confidence", confidence)] {
            if !(0.0 < value && value < 1.0) {
                return Err(ForecastError::InvalidParameter {
                    name,
                    reason: format!("must be between 0 and 1 (exclusive), got {value}"),
                });
            }
        }

        Ok(Self { alpha, beta, confidence })
    }

    pub fn from_context(ctx: &Context) -> Result<Self, ForecastError> {
        let cfg = &ctx.config.forecast;
        Self::new(cfg.alpha, cfg.beta, cfg.confidence)
    }

    /// Approximate two-sided z-score for the configured confidence level.
    fn z_score(&self) -> f64 {
        match self.confidence {
            x if x >= 0.99 => 2.576,
            x if x >= 0.95 => 1.96,
            x if x >= 0.90 => 1.645,
            x if x >= 0.80 => 1.282,
            _ => 1.0,
        }
    }
}

impl Forecaster for HoltForecaster {
    fn forecast(
        &self,
        series: &CanonicalSeries,
        horizon_days: u32,
    ) -> Result<Vec<ForecastRow>, ForecastError> {
        if horizon_days > MAX_HORIZON_DAYS {
            return Err(ForecastError::InvalidParameter {
                name: "horizon_days",
                reason: format!("must be at most {MAX_HORIZON_DAYS}, got {horizon_days}"),
            });
        }

        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = series.values().unzip();
        let (Some(&first), Some(&last_date)) = (values.first(), dates.last()) else {
            return Err(ForecastError::EmptySeries);
        };

        let mut level = first;
        let mut trend = values.get(1).map(|second| second - first).unwrap_or(0.0);
        let mut fitted = Vec::with_capacity(values.len());
        let mut residuals = Vec::with_capacity(values.len().saturating_sub(1));
        fitted.push(first);

        for &y in &values[1..] {
            let predicted = level + trend;
            fitted.push(predicted);
            residuals.push(y - predicted);

            let prev_level = level;
            level = self.alpha * y + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
        }

        let spread = stats::std_dev(&residuals, StdDevKind::Population).unwrap_or(0.0);
        let z = self.z_score();

        let mut rows: Vec<ForecastRow> = dates
            .iter()
            .zip(&fitted)
            .map(|(&date, &point)| ForecastRow {
                date,
                point,
                lower: point - z * spread,
                upper: point + z * spread,
                is_future: false,
            })
            .collect();

        rows.reserve(horizon_days as usize);
        for h in 1..=horizon_days {
            let date = last_date
                .checked_add_signed(ChronoDuration::days(i64::from(h)))
                .ok_or_else(|| ForecastError::InvalidParameter {
                    name: "horizon_days",
                    reason: format!("{h} days after {last_date} is out of the calendar range"),
                })?;

            let point = level + f64::from(h) * trend;
            let margin = z * spread * f64::from(h).sqrt();
            rows.push(ForecastRow {
                date,
                point,
                lower: point - margin,
                upper: point + margin,
                is_future: true,
            });
        }

        debug!(history = fitted.len(), horizon_days, spread, "forecast computed");
        Ok(rows)
    }
}
