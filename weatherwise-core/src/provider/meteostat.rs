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

const DEFAULT_BASE_URL: &str = "https://meteostat.p.rapidapi.com";
const RAPIDAPI_HOST: &str = "meteostat.p.rapidapi.com";

/// Meteostat point data via RapidAPI. Needs an API key to be available.
#[derive(Debug, Clone)]
pub struct MeteostatClient {
    api_key: Option<String>,
    settings: ClientSettings,
    base_url: String,
    http: Client,
}

impl MeteostatClient {
    pub fn new(api_key: Option<String>, settings: ClientSettings) -> Result<Self, reqwest::Error> {
        let http = settings.http_client()?;
        Ok(Self { api_key, settings, base_url: DEFAULT_BASE_URL.to_string(), http })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_rows(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<MsDay>, ProviderError> {
        let provider = self.name();
        let (start, end) = self.settings.date_range();
        let url = format!("{}/point/daily", self.base_url);

        let res = self
            .http
            .get(&url)
            .header("x-rapidapi-key", api_key)
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest_error(provider, e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| map_reqwest_error(provider, e))?;

        if !status.is_success() {
            return Err(ProviderError::data_fetch(
                provider,
                format!("daily request failed with status {}: {}", status, truncate_body(&body)),
            ));
        }

        let parsed: MsResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::data_fetch(provider, format!("failed to parse daily JSON: {e}"))
        })?;

        Ok(parsed.data)
    }
}

#[derive(Debug, Deserialize)]
struct MsResponse {
    #[serde(default)]
    data: Vec<MsDay>,
}

#[derive(Debug, Deserialize)]
struct MsDay {
    date: Option<String>,
    tavg: Option<f64>,
    tmin: Option<f64>,
    tmax: Option<f64>,
    prcp: Option<f64>,
    /// km/h
    wspd: Option<f64>,
    pres: Option<f64>,
}

impl MsDay {
    /// Calendar day of the row. Meteostat aggregates daily rows over the
    /// station's local day; that day is used as-is and any time part dropped.
    fn date(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?;
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    fn midpoint(&self) -> Option<f64> {
        Some((self.tmin? + self.tmax?) / 2.0)
    }
}

fn collect<F>(rows: &[MsDay], f: F) -> Vec<f64>
where
    F: Fn(&MsDay) -> Option<f64>,
{
    rows.iter().filter_map(f).filter(|v| v.is_finite()).collect()
}

fn build_observation(rows: &[MsDay], location: &str) -> Observation {
    let tavg = collect(rows, |d| d.tavg);
    let avg_temp = if tavg.is_empty() {
        stats::mean(&collect(rows, MsDay::midpoint))
    } else {
        stats::mean(&tavg)
    };

    let series = rows
        .iter()
        .filter_map(|d| {
            let temp = d.tavg.filter(|t| t.is_finite())?;
            Some(SeriesPoint::new(d.date()?, temp))
        })
        .collect();

    Observation {
        source: ProviderId::Meteostat.as_str().to_string(),
        location: location.to_string(),
        observed_at: Utc::now(),
        avg_temp: round_opt(avg_temp),
        max_temp: round_opt(collect(rows, |d| d.tmax).into_iter().reduce(f64::max)),
        min_temp: round_opt(collect(rows, |d| d.tmin).into_iter().reduce(f64::min)),
        humidity: None,
        pressure: round_opt(stats::mean(&collect(rows, |d| d.pres))),
        wind_speed: round_opt(stats::mean(&collect(rows, |d| d.wspd)).map(|kmh| kmh / 3.6)),
        precipitation: round_opt(stats::mean(&collect(rows, |d| d.prcp))),
        series,
    }
}

#[async_trait]
impl ProviderClient for MeteostatClient {
    fn name(&self) -> &str {
        ProviderId::Meteostat.as_str()
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    async fn fetch(&self, location: &str) -> Result<Observation, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::data_fetch(self.name(), "no API key configured"))?;

        let coords = self.settings.resolve(self.name(), location)?;
        let rows = self.fetch_rows(api_key, coords.latitude, coords.longitude).await?;

        if rows.is_empty() {
            return Err(ProviderError::data_fetch(self.name(), "no daily data returned"));
        }

        let observation = build_observation(&rows, location);
        debug!(
            provider = self.name(),
            location,
            days = observation.series.len(),
            "parsed Meteostat daily data"
        );

        Ok(observation)
    }
}
