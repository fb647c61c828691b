//! Server configuration from environment.

use flightpath_core::OptimizerKind;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub weather_url: String,
    /// Serve calm fixed snapshots instead of calling the weather provider.
    pub weather_offline: bool,
    pub weather_timeout_ms: u64,
    pub weather_cache_ttl_s: u64,
    pub weather_cache_max_entries: usize,
    pub cache_prune_interval_s: u64,
    /// Candidates whose snapshots are fetched at the same time.
    pub eval_concurrency: usize,
    pub default_method: OptimizerKind,
    pub aco_ants: Option<usize>,
    pub aco_iterations: Option<usize>,
    pub ga_generations: Option<usize>,
    pub ga_population: Option<usize>,
    pub optimizer_seed: Option<u64>,
    pub catalog_path: Option<String>,
    pub log_json: bool,
    pub broadcast_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: parse_var("FP_PORT").unwrap_or(3000),
            weather_url: env::var("FP_WEATHER_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WEATHER_URL.to_string()),
            weather_offline: flag("FP_WEATHER_OFFLINE"),
            weather_timeout_ms: parse_var("FP_WEATHER_TIMEOUT_MS").unwrap_or(4000),
            weather_cache_ttl_s: parse_var("FP_WEATHER_CACHE_TTL_S").unwrap_or(900),
            weather_cache_max_entries: parse_var("FP_WEATHER_CACHE_MAX_ENTRIES").unwrap_or(5000),
            cache_prune_interval_s: parse_var("FP_CACHE_PRUNE_INTERVAL_S").unwrap_or(60),
            eval_concurrency: parse_var("FP_EVAL_CONCURRENCY").unwrap_or(8),
            default_method: parse_var("FP_DEFAULT_METHOD").unwrap_or_default(),
            aco_ants: parse_var("FP_ACO_ANTS"),
            aco_iterations: parse_var("FP_ACO_ITERATIONS"),
            ga_generations: parse_var("FP_GA_GENERATIONS"),
            ga_population: parse_var("FP_GA_POPULATION"),
            optimizer_seed: parse_var("FP_OPTIMIZER_SEED"),
            catalog_path: env::var("FP_CATALOG_PATH").ok().filter(|path| !path.trim().is_empty()),
            log_json: flag("FP_LOG_JSON"),
            broadcast_capacity: parse_var("FP_BROADCAST_CAPACITY").unwrap_or(256),
        }
    }

    /// Settings for tests and offline runs: no network, fixed seed.
    pub fn offline() -> Self {
        Self {
            weather_offline: true,
            optimizer_seed: Some(7),
            ..Self::from_env()
        }
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_millis(self.weather_timeout_ms.max(1))
    }

    pub fn weather_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.weather_cache_ttl_s.max(1))
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

fn flag(name: &str) -> bool {
    matches!(
        env::var(name).map(|value| value.trim().to_ascii_lowercase()),
        Ok(value) if value == "1" || value == "true" || value == "yes"
    )
}
