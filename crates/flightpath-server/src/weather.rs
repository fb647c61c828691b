//! Open-Meteo atmospheric provider.

use crate::backoff::Backoff;
use crate::config::Config;
use chrono::Utc;
use flightpath_core::{AtmosphereError, AtmosphereProvider, AtmosphericSnapshot, Coordinate, FixedAtmosphere};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

const CURRENT_FIELDS: &str = "wind_speed_10m,wind_direction_10m,precipitation,rain,showers,snowfall,\
cloud_cover,weather_code";
const HOURLY_FIELDS: &str = "cloud_cover_low,cloud_cover_mid,cloud_cover_high,visibility,\
wind_speed_250hPa,wind_direction_250hPa,vertical_velocity_250hPa,cape,temperature_500hPa,\
temperature_700hPa,relative_humidity_500hPa,relative_humidity_700hPa";

#[derive(Debug, Default, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    current: CurrentBlock,
    #[serde(default)]
    hourly: HourlyBlock,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentBlock {
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    precipitation: Option<f64>,
    rain: Option<f64>,
    showers: Option<f64>,
    snowfall: Option<f64>,
    cloud_cover: Option<f64>,
    weather_code: Option<u16>,
}

/// Pressure-level and hourly-only fields; the first sample is used.
#[derive(Debug, Default, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    cloud_cover_low: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_mid: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover_high: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default, rename = "wind_speed_250hPa")]
    wind_speed_250hpa: Vec<Option<f64>>,
    #[serde(default, rename = "wind_direction_250hPa")]
    wind_direction_250hpa: Vec<Option<f64>>,
    #[serde(default, rename = "vertical_velocity_250hPa")]
    vertical_velocity_250hpa: Vec<Option<f64>>,
    #[serde(default)]
    cape: Vec<Option<f64>>,
    #[serde(default, rename = "temperature_500hPa")]
    temperature_500hpa: Vec<Option<f64>>,
    #[serde(default, rename = "temperature_700hPa")]
    temperature_700hpa: Vec<Option<f64>>,
    #[serde(default, rename = "relative_humidity_500hPa")]
    relative_humidity_500hpa: Vec<Option<f64>>,
    #[serde(default, rename = "relative_humidity_700hPa")]
    relative_humidity_700hpa: Vec<Option<f64>>,
}

fn first(values: &[Option<f64>]) -> Option<f64> {
    values.first().copied().flatten().filter(|value| value.is_finite())
}

impl ForecastResponse {
    fn into_snapshot(self) -> AtmosphericSnapshot {
        let calm = AtmosphericSnapshot::calm();
        let current = self.current;
        let hourly = self.hourly;
        AtmosphericSnapshot {
            wind_speed_10m: current.wind_speed_10m.unwrap_or(calm.wind_speed_10m),
            wind_direction_10m: current.wind_direction_10m.unwrap_or(calm.wind_direction_10m),
            precipitation: current.precipitation.unwrap_or(calm.precipitation),
            rain: current.rain.unwrap_or(calm.rain),
            showers: current.showers.unwrap_or(calm.showers),
            snowfall: current.snowfall.unwrap_or(calm.snowfall),
            cloud_cover: current.cloud_cover.unwrap_or(calm.cloud_cover),
            cloud_cover_low: first(&hourly.cloud_cover_low).unwrap_or(calm.cloud_cover_low),
            cloud_cover_mid: first(&hourly.cloud_cover_mid).unwrap_or(calm.cloud_cover_mid),
            cloud_cover_high: first(&hourly.cloud_cover_high).unwrap_or(calm.cloud_cover_high),
            visibility: first(&hourly.visibility).unwrap_or(calm.visibility),
            weather_code: current.weather_code.unwrap_or(calm.weather_code),
            jet_stream_speed: first(&hourly.wind_speed_250hpa).unwrap_or(calm.jet_stream_speed),
            jet_stream_direction: first(&hourly.wind_direction_250hpa)
                .unwrap_or(calm.jet_stream_direction),
            vertical_velocity_250hpa: first(&hourly.vertical_velocity_250hpa)
                .unwrap_or(calm.vertical_velocity_250hpa),
            cape: first(&hourly.cape).unwrap_or(calm.cape),
            temperature_500hpa: first(&hourly.temperature_500hpa).unwrap_or(calm.temperature_500hpa),
            temperature_700hpa: first(&hourly.temperature_700hpa).unwrap_or(calm.temperature_700hpa),
            relative_humidity_500hpa: first(&hourly.relative_humidity_500hpa)
                .unwrap_or(calm.relative_humidity_500hpa),
            relative_humidity_700hpa: first(&hourly.relative_humidity_700hpa)
                .unwrap_or(calm.relative_humidity_700hpa),
            fetched_at: Utc::now(),
            degraded: false,
        }
    }
}

pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    backoff: Mutex<Backoff>,
}

impl OpenMeteoProvider {
    pub fn new(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            backoff: Mutex::new(Backoff::new(Duration::from_secs(1), Duration::from_secs(60))),
        }
    }

    fn request_url(&self, at: Coordinate) -> String {
        let separator = if self.base_url.contains('?') { "&" } else { "?" };
        format!(
            "{}{}latitude={:.4}&longitude={:.4}&current={}&hourly={}&forecast_hours=1&wind_speed_unit=kmh",
            self.base_url, separator, at.lat, at.lon, CURRENT_FIELDS, HOURLY_FIELDS
        )
    }

    fn backing_off(&self) -> Option<Duration> {
        let backoff = self.backoff.lock().ok()?;
        (!backoff.ready()).then(|| backoff.remaining())
    }

    fn record(&self, ok: bool) {
        let Ok(mut backoff) = self.backoff.lock() else {
            return;
        };
        if ok {
            backoff.record_success();
        } else {
            let delay = backoff.record_failure();
            tracing::warn!(
                "Weather provider failing ({} in a row), pausing {} ms",
                backoff.failures(),
                delay.as_millis()
            );
        }
    }

    async fn request(&self, at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
        let response = self
            .client
            .get(self.request_url(at))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AtmosphereError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    AtmosphereError::Transport(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AtmosphereError::Status(response.status().as_u16()));
        }

        let payload: ForecastResponse = response
            .json()
            .await
            .map_err(|err| AtmosphereError::Decode(err.to_string()))?;
        Ok(payload.into_snapshot())
    }
}

impl AtmosphereProvider for OpenMeteoProvider {
    async fn fetch(&self, at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
        if let Some(remaining) = self.backing_off() {
            return Err(AtmosphereError::BackingOff(remaining.as_millis() as u64));
        }
        let result = self.request(at).await;
        self.record(result.is_ok());
        result
    }
}

/// The provider selected by configuration.
pub enum WeatherSource {
    OpenMeteo(OpenMeteoProvider),
    Fixed(FixedAtmosphere),
}

impl WeatherSource {
    pub fn from_config(config: &Config) -> Self {
        if config.weather_offline {
            tracing::info!("Weather offline mode: serving calm snapshots");
            return WeatherSource::Fixed(FixedAtmosphere::calm());
        }
        WeatherSource::OpenMeteo(OpenMeteoProvider::new(
            Client::new(),
            config.weather_url.clone(),
            config.weather_timeout(),
        ))
    }
}

impl AtmosphereProvider for WeatherSource {
    async fn fetch(&self, at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
        match self {
            WeatherSource::OpenMeteo(provider) => provider.fetch(at).await,
            WeatherSource::Fixed(provider) => provider.fetch(at).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_and_first_hourly_sample() {
        let body = serde_json::json!({
            "latitude": 28.56,
            "longitude": 77.1,
            "current": {
                "time": "2024-05-01T06:00",
                "wind_speed_10m": 18.5,
                "wind_direction_10m": 270.0,
                "precipitation": 0.4,
                "rain": 0.4,
                "showers": 0.0,
                "snowfall": 0.0,
                "cloud_cover": 62.0,
                "weather_code": 61
            },
            "hourly": {
                "time": ["2024-05-01T06:00", "2024-05-01T07:00"],
                "visibility": [4200.0, 9000.0],
                "cape": [1250.0, 300.0],
                "wind_speed_250hPa": [145.0, 120.0],
                "wind_direction_250hPa": [260.0, 250.0],
                "vertical_velocity_250hPa": [null, 0.1],
                "cloud_cover_high": [85.0, 10.0]
            }
        });
        let payload: ForecastResponse = serde_json::from_value(body).expect("decode");
        let snapshot = payload.into_snapshot();

        assert_eq!(snapshot.wind_speed_10m, 18.5);
        assert_eq!(snapshot.weather_code, 61);
        assert_eq!(snapshot.visibility, 4200.0);
        assert_eq!(snapshot.cape, 1250.0);
        assert_eq!(snapshot.jet_stream_speed, 145.0);
        assert_eq!(snapshot.cloud_cover_high, 85.0);
        assert_eq!(snapshot.vertical_velocity_250hpa, 0.0);
        assert!(!snapshot.degraded);
    }

    #[test]
    fn missing_blocks_read_as_calm() {
        let payload: ForecastResponse = serde_json::from_str("{}").expect("decode");
        let snapshot = payload.into_snapshot();
        assert_eq!(snapshot.visibility, 10_000.0);
        assert_eq!(snapshot.cape, 0.0);
    }

    #[test]
    fn request_url_carries_rounded_coordinate() {
        let provider = OpenMeteoProvider::new(
            Client::new(),
            "http://localhost:9/v1/forecast",
            Duration::from_millis(100),
        );
        let url = provider.request_url(Coordinate::new(19.08961, 72.86559));
        assert!(url.starts_with("http://localhost:9/v1/forecast?latitude=19.0896&longitude=72.8656"));
        assert!(url.contains("vertical_velocity_250hPa"));
    }

    #[tokio::test]
    async fn unreachable_provider_backs_off() {
        let provider = OpenMeteoProvider::new(
            Client::new(),
            "http://127.0.0.1:9/v1/forecast",
            Duration::from_millis(200),
        );
        let first = provider.fetch(Coordinate::new(19.0, 72.0)).await;
        assert!(first.is_err());
        let second = provider.fetch(Coordinate::new(19.0, 72.0)).await;
        assert!(matches!(second, Err(AtmosphereError::BackingOff(_))));
    }
}
