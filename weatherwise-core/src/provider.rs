use crate::{
    Config, Observation,
    config::{Coordinates, location_key},
    error::ProviderError,
    provider::{meteostat::MeteostatClient, open_meteo::OpenMeteoClient},
    stats,
};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use std::{collections::BTreeMap, fmt::Debug, sync::Arc, time::Duration};

pub mod meteostat;
pub mod open_meteo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    Meteostat,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::Meteostat => "meteostat",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::Meteostat]
    }

    /// Whether the provider refuses to work without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::Meteostat)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openmeteo" | "open-meteo" => Ok(ProviderId::OpenMeteo),
            "meteostat" => Ok(ProviderId::Meteostat),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openmeteo, meteostat."
            )),
        }
    }
}

/// One independent weather data source.
///
/// Implementations are read-only after construction and shared across
/// concurrent fetch tasks.
#[async_trait]
pub trait ProviderClient: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Cheap readiness check (e.g. credential present). Never does I/O.
    fn is_available(&self) -> bool;

    /// Fetch one observation. Must bound its own network time.
    async fn fetch(&self, location: &str) -> Result<Observation, ProviderError>;
}

/// Shared construction inputs for the concrete clients.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub locations: Arc<BTreeMap<String, Coordinates>>,
    pub history_days: u32,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            locations: Arc::new(
                config.locations.iter().map(|(name, c)| (location_key(name), *c)).collect(),
            ),
            history_days: config.forecast.history_days,
            timeout: config.fetch.client_timeout(),
        }
    }

    pub fn resolve(&self, provider: &str, location: &str) -> Result<Coordinates, ProviderError> {
        self.locations.get(&location_key(location)).copied().ok_or_else(|| {
            ProviderError::LocationNotSupported {
                provider: provider.to_string(),
                location: location.to_string(),
            }
        })
    }

    /// Inclusive `(start, end)` window of daily history to request.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let today = Utc::now().date_naive();
        (today - ChronoDuration::days(i64::from(self.history_days)), today)
    }

    pub fn http_client(&self) -> Result<Client, reqwest::Error> {
        Client::builder().timeout(self.timeout).build()
    }
}

/// Statically declared registry: one client per known provider, available or not.
pub fn registry(config: &Config) -> anyhow::Result<Vec<Arc<dyn ProviderClient>>> {
    let settings = ClientSettings::from_config(config);

    ProviderId::all()
        .iter()
        .map(|id| client_from_config(*id, config, &settings))
        .collect()
}

/// Construct a single provider client from config.
pub fn client_from_config(
    id: ProviderId,
    config: &Config,
    settings: &ClientSettings,
) -> anyhow::Result<Arc<dyn ProviderClient>> {
    let api_key = config.provider_api_key(id).map(str::to_owned);

    let client: Arc<dyn ProviderClient> = match id {
        ProviderId::OpenMeteo => Arc::new(OpenMeteoClient::new(settings.clone())?),
        ProviderId::Meteostat => Arc::new(MeteostatClient::new(api_key, settings.clone())?),
    };

    Ok(client)
}

pub(crate) fn map_reqwest_error(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { provider: provider.to_string() }
    } else {
        ProviderError::data_fetch(provider, err)
    }
}

pub(crate) fn round_opt(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| stats::round_to(v, 2))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
