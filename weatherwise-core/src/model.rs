use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One daily temperature reading inside a provider's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub temperature: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, temperature: f64) -> Self {
        Self { date, temperature }
    }
}

/// Scalar fields carried by an [`Observation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AvgTemp,
    MaxTemp,
    MinTemp,
    Humidity,
    Pressure,
    WindSpeed,
    Precipitation,
}

impl Metric {
    pub const fn all() -> &'static [Metric] {
        &[
            Metric::AvgTemp,
            Metric::MaxTemp,
            Metric::MinTemp,
            Metric::Humidity,
            Metric::Pressure,
            Metric::WindSpeed,
            Metric::Precipitation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::AvgTemp => "avg_temp",
            Metric::MaxTemp => "max_temp",
            Metric::MinTemp => "min_temp",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
            Metric::WindSpeed => "wind_speed",
            Metric::Precipitation => "precipitation",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::AvgTemp | Metric::MaxTemp | Metric::MinTemp => "°C",
            Metric::Humidity => "%",
            Metric::Pressure => "hPa",
            Metric::WindSpeed => "m/s",
            Metric::Precipitation => "mm",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's weather data for one location, produced once per fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub source: String,
    pub location: String,
    pub observed_at: DateTime<Utc>,
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    /// Daily temperatures, ascending by date. Rows without a usable
    /// temperature are dropped by the provider before this is built.
    #[serde(default)]
    pub series: Vec<SeriesPoint>,
}

impl Observation {
    /// An observation with every scalar empty and no series.
    pub fn empty(source: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            location: location.into(),
            observed_at: Utc::now(),
            avg_temp: None,
            max_temp: None,
            min_temp: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            precipitation: None,
            series: Vec::new(),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::AvgTemp => self.avg_temp,
            Metric::MaxTemp => self.max_temp,
            Metric::MinTemp => self.min_temp,
            Metric::Humidity => self.humidity,
            Metric::Pressure => self.pressure,
            Metric::WindSpeed => self.wind_speed,
            Metric::Precipitation => self.precipitation,
        }
    }

    pub fn with_metric(mut self, metric: Metric, value: Option<f64>) -> Self {
        let slot = match metric {
            Metric::AvgTemp => &mut self.avg_temp,
            Metric::MaxTemp => &mut self.max_temp,
            Metric::MinTemp => &mut self.min_temp,
            Metric::Humidity => &mut self.humidity,
            Metric::Pressure => &mut self.pressure,
            Metric::WindSpeed => &mut self.wind_speed,
            Metric::Precipitation => &mut self.precipitation,
        };
        *slot = value;
        self
    }

    pub fn with_series(mut self, series: Vec<SeriesPoint>) -> Self {
        self.series = series;
        self
    }
}

/// Consensus value for one metric plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSummary {
    pub value: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: usize,
}

/// Per-metric consensus across all sources of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedSummary {
    pub fields: BTreeMap<Metric, FieldSummary>,
}

impl AggregatedSummary {
    /// Summary for `metric`; metrics never aggregated read as empty.
    pub fn get(&self, metric: Metric) -> FieldSummary {
        self.fields.get(&metric).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, &FieldSummary)> {
        self.fields.iter().map(|(m, s)| (*m, s))
    }
}

/// One merged day of the canonical series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPoint {
    pub date: NaiveDate,
    pub mean_temperature: f64,
    pub sample_count: usize,
    /// `None` when fewer than two sources contributed.
    pub std_dev: Option<f64>,
}

/// Date-ordered, gap-preserving merged daily series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanonicalSeries {
    pub points: Vec<CanonicalPoint>,
}

impl CanonicalSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// The `(date, value)` pairs handed to a forecaster.
    pub fn values(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|p| (p.date, p.mean_temperature))
    }
}

/// Forecaster output row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
    /// `false` for fitted rows over the observed history.
    pub is_future: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_accessors_match_builder() {
        let obs = Metric::all()
            .iter()
            .enumerate()
            .fold(Observation::empty("test", "warsaw"), |obs, (i, m)| {
                obs.with_metric(*m, Some(i as f64))
            });

        for (i, m) in Metric::all().iter().enumerate() {
            assert_eq!(obs.metric(*m), Some(i as f64), "{m}");
        }
    }

    #[test]
    fn summary_get_defaults_to_empty() {
        let summary = AggregatedSummary::default();
        let s = summary.get(Metric::Pressure);
        assert_eq!(s, FieldSummary { value: None, min: None, max: None, count: 0 });
    }

    #[test]
    fn summary_serializes_metric_keys_as_strings() {
        let mut summary = AggregatedSummary::default();
        summary.fields.insert(
            Metric::WindSpeed,
            FieldSummary { value: Some(3.5), min: Some(3.0), max: Some(4.0), count: 2 },
        );

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["fields"]["wind_speed"]["count"], 2);
    }
}
