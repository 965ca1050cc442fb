use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ProviderError,
    model::{Observation, SeriesPoint},
    provider::{ClientSettings, map_reqwest_error, round_opt, truncate_body},
    stats,
};

use super::{ProviderClient, ProviderId};

const DEFAULT_BASE_URL: &str = "https://archive-api.open-meteo.com";
const DAILY_FIELDS: &str = "temperature_2m_mean,temperature_2m_max,temperature_2m_min,\
relative_humidity_2m_mean,pressure_msl_mean,wind_speed_10m_mean,precipitation_sum";

/// Open-Meteo historical archive. Free, no credential needed.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    settings: ClientSettings,
    base_url: String,
    http: Client,
}

impl OpenMeteoClient {
    pub fn new(settings: ClientSettings) -> Result<Self, reqwest::Error> {
        let http = settings.http_client()?;
        Ok(Self { settings, base_url: DEFAULT_BASE_URL.to_string(), http })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn name_str() -> &'static str {
        ProviderId::OpenMeteo.as_str()
    }

    async fn fetch_daily(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<OmDaily, ProviderError> {
        let provider = Self::name_str();
        let (start, end) = self.settings.date_range();
        let url = format!("{}/v1/archive", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "UTC".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest_error(provider, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| map_reqwest_error(provider, e))?;

        if !status.is_success() {
            return Err(ProviderError::data_fetch(
                provider,
                format!("archive request failed with status {}: {}", status, truncate_body(&body)),
            ));
        }

        let parsed: OmResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::data_fetch(provider, format!("failed to parse archive JSON: {e}"))
        })?;

        parsed
            .daily
            .ok_or_else(|| ProviderError::data_fetch(provider, "response contained no daily data"))
    }
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    daily: Option<OmDaily>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmDaily {
    time: Vec<String>,
    temperature_2m_mean: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    relative_humidity_2m_mean: Vec<Option<f64>>,
    pressure_msl_mean: Vec<Option<f64>>,
    wind_speed_10m_mean: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().filter(|v| v.is_finite()).collect()
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

impl OmDaily {
    /// Pairs dates with mean temperature, dropping rows where either is unusable.
    fn series(&self) -> Vec<SeriesPoint> {
        self.time
            .iter()
            .zip(&self.temperature_2m_mean)
            .filter_map(|(date, temp)| {
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
                let temp = temp.filter(|t| t.is_finite())?;
                Some(SeriesPoint::new(date, temp))
            })
            .collect()
    }

    fn into_observation(self, location: &str) -> Observation {
        let series = self.series();

        Observation {
            source: OpenMeteoClient::name_str().to_string(),
            location: location.to_string(),
            observed_at: Utc::now(),
            avg_temp: round_opt(stats::mean(&present(&self.temperature_2m_mean))),
            max_temp: round_opt(max_of(&present(&self.temperature_2m_max))),
            min_temp: round_opt(min_of(&present(&self.temperature_2m_min))),
            humidity: round_opt(stats::mean(&present(&self.relative_humidity_2m_mean))),
            pressure: round_opt(stats::mean(&present(&self.pressure_msl_mean))),
            wind_speed: round_opt(stats::mean(&present(&self.wind_speed_10m_mean))),
            precipitation: round_opt(stats::mean(&present(&self.precipitation_sum))),
            series,
        }
    }
}

#[async_trait]
impl ProviderClient for OpenMeteoClient {
    fn name(&self) -> &str {
        Self::name_str()
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn fetch(&self, location: &str) -> Result<Observation, ProviderError> {
        let coords = self.settings.resolve(self.name(), location)?;
        let daily = self.fetch_daily(coords.latitude, coords.longitude).await?;

        if daily.time.is_empty() {
            return Err(ProviderError::data_fetch(self.name(), "archive returned no days"));
        }

        let observation = daily.into_observation(location);
        debug!(
            provider = self.name(),
            location,
            days = observation.series.len(),
            "parsed Open-Meteo archive"
        );

        Ok(observation)
    }
}
