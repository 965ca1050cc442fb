//! Robust consensus over the scalar fields reported by several providers.

use tracing::debug;

use crate::{
    context::Context,
    model::{AggregatedSummary, FieldSummary, Metric, Observation},
    stats,
};

/// Reduces observations to a per-metric median with min/max/count provenance.
///
/// Every metric is reduced independently, so a source missing one field still
/// contributes its other fields. Values are sorted before reduction, which
/// makes the output independent of the order observations arrived in.
#[derive(Debug, Clone)]
pub struct Aggregator {
    precision: u32,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self { precision: 2 }
    }
}

impl Aggregator {
    pub fn new(ctx: &Context) -> Self {
        Self { precision: ctx.config.aggregate.precision }
    }

    pub fn aggregate(&self, observations: &[Observation]) -> AggregatedSummary {
        let fields = Metric::all()
            .iter()
            .map(|metric| (*metric, self.summarize(observations, *metric)))
            .collect();

        let summary = AggregatedSummary { fields };
        debug!(
            sources = observations.len(),
            populated = summary.iter().filter(|(_, s)| s.count > 0).count(),
            "aggregation finished"
        );
        summary
    }

    fn summarize(&self, observations: &[Observation], metric: Metric) -> FieldSummary {
        let mut values: Vec<f64> = observations
            .iter()
            .filter_map(|o| o.metric(metric))
            .filter(|v| v.is_finite())
            .collect();
        stats::sort_values(&mut values);

        let round = |v: f64| stats::round_to(v, self.precision);

        FieldSummary {
            value: stats::median_sorted(&values).map(round),
            min: values.first().copied().map(round),
            max: values.last().copied().map(round),
            count: values.len(),
        }
    }
}
