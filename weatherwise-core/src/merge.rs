//! Reconciles per-source daily series into one canonical, date-ordered series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    context::Context,
    error::InsufficientData,
    model::{CanonicalPoint, CanonicalSeries, Observation},
    stats::{self, StdDevKind},
};

/// Groups every source's `(date, temperature)` rows by calendar day and
/// combines overlapping days into mean, count and spread.
///
/// Dates no source reported stay absent; nothing is interpolated.
#[derive(Debug, Clone, Default)]
pub struct SeriesMerger {
    std_dev: StdDevKind,
}

impl SeriesMerger {
    pub fn new(ctx: &Context) -> Self {
        Self { std_dev: ctx.config.series.std_dev }
    }

    pub fn merge(&self, observations: &[Observation]) -> Result<CanonicalSeries, InsufficientData> {
        let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

        for point in observations.iter().flat_map(|o| o.series.iter()) {
            if point.temperature.is_finite() {
                by_date.entry(point.date).or_default().push(point.temperature);
            }
        }

        if by_date.is_empty() {
            return Err(InsufficientData);
        }

        let points: Vec<CanonicalPoint> = by_date
            .into_iter()
            .map(|(date, mut temps)| {
                stats::sort_values(&mut temps);
                CanonicalPoint {
                    date,
                    // Non-empty: every group has at least the row that created it.
                    mean_temperature: stats::mean(&temps).unwrap_or_default(),
                    sample_count: temps.len(),
                    std_dev: stats::std_dev(&temps, self.std_dev),
                }
            })
            .collect();

        debug!(
            sources = observations.len(),
            days = points.len(),
            overlapping = points.iter().filter(|p| p.sample_count > 1).count(),
            "series merge finished"
        );

        Ok(CanonicalSeries { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeriesPoint;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn with_series(source: &str, rows: &[(&str, f64)]) -> Observation {
        Observation::empty(source, "warsaw").with_series(
            rows.iter().map(|(d, t)| SeriesPoint::new(day(d), *t)).collect(),
        )
    }

    #[test]
    fn overlapping_day_is_averaged() {
        let a = with_series("a", &[("2024-01-01", 10.0)]);
        let b = with_series("b", &[("2024-01-01", 20.0)]);

        let series = SeriesMerger::default().merge(&[a, b]).expect("data");

        assert_eq!(series.len(), 1);
        let p = series.points[0];
        assert_eq!(p.date, day("2024-01-01"));
        assert_eq!(p.mean_temperature, 15.0);
        assert_eq!(p.sample_count, 2);
        let sd = p.std_dev.expect("two samples");
        assert!((sd - 50f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn single_contributor_has_no_std_dev() {
        let series = SeriesMerger::default()
            .merge(&[with_series("a", &[("2024-01-01", 3.0)])])
            .expect("data");

        assert_eq!(series.points[0].sample_count, 1);
        assert_eq!(series.points[0].std_dev, None);
    }

    #[test]
    fn output_is_sorted_sparse_and_unique() {
        let a = with_series("a", &[("2024-01-05", 5.0), ("2024-01-01", 1.0)]);
        let b = with_series("b", &[("2024-01-03", 3.0), ("2024-01-05", 7.0)]);

        let series = SeriesMerger::default().merge(&[a, b]).expect("data");

        let dates: Vec<_> = series.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day("2024-01-01"), day("2024-01-03"), day("2024-01-05")]);
        assert_eq!(series.points[2].mean_temperature, 6.0);
        assert!(series.points.iter().all(|p| p.sample_count >= 1));
    }

    #[test]
    fn merge_is_commutative() {
        let a = with_series("a", &[("2024-01-01", 0.1), ("2024-01-02", 2.7), ("2024-01-04", -1.3)]);
        let b = with_series("b", &[("2024-01-01", 0.2), ("2024-01-02", 9.9)]);
        let c = with_series("c", &[("2024-01-01", 0.3), ("2024-01-03", 4.4)]);

        let merger = SeriesMerger::default();
        let abc = merger.merge(&[a.clone(), b.clone(), c.clone()]).expect("data");
        let ab = merger.merge(&[a.clone(), b.clone()]).expect("data");
        assert_eq!(merger.merge(&[b.clone(), a.clone()]).expect("data"), ab);
        assert_eq!(merger.merge(&[c, b, a]).expect("data"), abc);
    }

    #[test]
    fn no_series_is_insufficient_data() {
        let merger = SeriesMerger::default();

        assert_eq!(merger.merge(&[]), Err(InsufficientData));
        let empty = [Observation::empty("a", "warsaw"), Observation::empty("b", "warsaw")];
        assert_eq!(merger.merge(&empty), Err(InsufficientData));
    }

    #[test]
    fn non_finite_rows_are_dropped() {
        let a = with_series("a", &[("2024-01-01", f64::NAN), ("2024-01-02", 4.0)]);

        let series = SeriesMerger::default().merge(&[a]).expect("data");
        assert_eq!(series.len(), 1);
        assert_eq!(series.first_date(), Some(day("2024-01-02")));

        let only_nan = with_series("b", &[("2024-01-01", f64::NAN)]);
        assert_eq!(SeriesMerger::default().merge(&[only_nan]), Err(InsufficientData));
    }

    #[test]
    fn population_std_dev_from_config() {
        let mut cfg = crate::config::Config::default();
        cfg.series.std_dev = StdDevKind::Population;
        let merger = SeriesMerger::new(&Context::new(cfg));

        let a = with_series("a", &[("2024-01-01", 10.0)]);
        let b = with_series("b", &[("2024-01-01", 20.0)]);
        let series = merger.merge(&[a, b]).expect("data");
        assert_eq!(series.points[0].std_dev, Some(5.0));
    }
}
