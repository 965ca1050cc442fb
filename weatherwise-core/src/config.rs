use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    provider::ProviderId,
    stats::{self, StdDevKind},
};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Concurrency settings for the fetch coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Worker pool size; `None` means available parallelism minus one.
    pub workers: Option<usize>,
    /// Per-request timeout applied inside every provider client.
    pub client_timeout_secs: u64,
    /// Stop waiting for stragglers after this long and keep partial results.
    pub overall_timeout_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { workers: None, client_timeout_secs: 15, overall_timeout_secs: None }
    }
}

impl FetchConfig {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Decimal digits kept on consensus, min and max values.
    #[serde(deserialize_with = "deserialize_precision")]
    pub precision: u32,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self { precision: 2 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub std_dev: StdDevKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub horizon_days: u32,
    /// How far back providers are asked for daily history.
    pub history_days: u32,
    /// Level smoothing, in (0, 1).
    pub alpha: f64,
    /// Trend smoothing, in (0, 1).
    pub beta: f64,
    pub confidence: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self { horizon_days: 7, history_days: 365, alpha: 0.5, beta: 0.1, confidence: 0.95 }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Example TOML:
    /// [providers.meteostat]
    /// api_key = "..."
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Known locations, keyed by lowercase name. Entries read from a file
    /// are layered over the built-in table.
    #[serde(deserialize_with = "deserialize_locations")]
    pub locations: BTreeMap<String, Coordinates>,

    pub fetch: FetchConfig,
    pub aggregate: AggregateConfig,
    pub series: SeriesConfig,
    pub forecast: ForecastConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: BTreeMap::new(),
            locations: default_locations(),
            fetch: FetchConfig::default(),
            aggregate: AggregateConfig::default(),
            series: SeriesConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

fn default_locations() -> BTreeMap<String, Coordinates> {
    [
        ("warsaw", 52.2297, 21.0122),
        ("krakow", 50.0647, 19.9450),
        ("poznan", 52.4064, 16.9252),
        ("gdansk", 54.3520, 18.6466),
        ("wroclaw", 51.1079, 17.0385),
        ("lodz", 51.7592, 19.4559),
    ]
    .into_iter()
    .map(|(name, latitude, longitude)| (name.to_string(), Coordinates { latitude, longitude }))
    .collect()
}

/// Lookup key for a location name: trimmed and lowercased.
pub fn location_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn deserialize_locations<'de, D>(deserializer: D) -> Result<BTreeMap<String, Coordinates>, D::Error>
where
    D: Deserializer<'de>,
{
    let from_file = BTreeMap::<String, Coordinates>::deserialize(deserializer)?;
    let mut locations = default_locations();
    locations.extend(from_file.into_iter().map(|(name, coords)| (location_key(&name), coords)));
    Ok(locations)
}

fn deserialize_precision<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(u32::deserialize(deserializer)?.min(stats::MAX_PRECISION))
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherwise", "weatherwise")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
    }

    /// Returns API key for a provider, if present and non-blank.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)
            .map(|cfg| cfg.api_key.trim())
            .filter(|key| !key.is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn defaults_cover_known_locations() {
        let cfg = Config::default();

        assert_eq!(cfg.locations.len(), 6);
        assert!(cfg.locations.contains_key(&location_key("  KRAKOW ")));
        assert_eq!(cfg.forecast.horizon_days, 7);
        assert_eq!(cfg.aggregate.precision, 2);
    }

    #[test]
    fn set_api_key_for_provider() {
        let mut cfg = Config::default();
        assert!(!cfg.is_provider_configured(ProviderId::Meteostat));

        cfg.upsert_provider_api_key(ProviderId::Meteostat, "KEY".into());

        assert_eq!(cfg.provider_api_key(ProviderId::Meteostat), Some("KEY"));
        assert!(cfg.is_provider_configured(ProviderId::Meteostat));
    }

    #[test]
    fn blank_api_key_is_not_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Meteostat, "   ".into());

        assert!(!cfg.is_provider_configured(ProviderId::Meteostat));
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let fetch = FetchConfig { workers: Some(0), ..FetchConfig::default() };
        assert_eq!(fetch.worker_count(), 1);
        assert!(FetchConfig::default().worker_count() >= 1);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [forecast]
            horizon_days = 3

            [series]
            std_dev = "population"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.forecast.horizon_days, 3);
        assert_eq!(cfg.forecast.history_days, 365);
        assert_eq!(cfg.series.std_dev, StdDevKind::Population);
        assert!(cfg.locations.contains_key("gdansk"));
    }

    #[test]
    fn file_locations_extend_defaults_with_lowercase_keys() {
        let cfg: Config = toml::from_str(
            r#"
            [locations.Berlin]
            latitude = 52.52
            longitude = 13.40

            [locations." Warsaw "]
            latitude = 1.0
            longitude = 2.0
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.locations.len(), 7);
        assert_eq!(
            cfg.locations.get("berlin"),
            Some(&Coordinates { latitude: 52.52, longitude: 13.40 })
        );
        assert!(!cfg.locations.contains_key("Berlin"));
        assert_eq!(cfg.locations.get("warsaw"), Some(&Coordinates { latitude: 1.0, longitude: 2.0 }));
        assert!(cfg.locations.contains_key("lodz"));
    }

    #[test]
    fn oversized_precision_is_clamped() {
        let cfg: Config = toml::from_str("[aggregate]\nprecision = 4000000000\n").expect("valid toml");
        assert_eq!(cfg.aggregate.precision, stats::MAX_PRECISION);

        let cfg: Config = toml::from_str("[aggregate]\nprecision = 3\n").expect("valid toml");
        assert_eq!(cfg.aggregate.precision, 3);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Meteostat, "SECRET".into());
        cfg.fetch.workers = Some(4);
        cfg.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.provider_api_key(ProviderId::Meteostat), Some("SECRET"));
        assert_eq!(loaded.fetch.workers, Some(4));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from(&dir.path().join("absent.toml")).expect("defaults");
        assert!(cfg.providers.is_empty());
    }
}
