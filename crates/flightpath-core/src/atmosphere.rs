//! Atmospheric snapshots and the provider contract the evaluator relies on.

use crate::models::{Coordinate, Route, Waypoint};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Decimal places kept when keying snapshots by coordinate.
pub const SNAPSHOT_KEY_PRECISION: i32 = 4;

/// Point-in-time atmospheric readings for one coordinate.
///
/// Wind directions are meteorological: the direction the wind blows from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericSnapshot {
    /// km/h
    #[serde(default)]
    pub wind_speed_10m: f64,
    #[serde(default)]
    pub wind_direction_10m: f64,
    /// mm
    #[serde(default)]
    pub precipitation: f64,
    #[serde(default)]
    pub rain: f64,
    #[serde(default)]
    pub showers: f64,
    /// cm
    #[serde(default)]
    pub snowfall: f64,
    /// Percent
    #[serde(default)]
    pub cloud_cover: f64,
    #[serde(default)]
    pub cloud_cover_low: f64,
    #[serde(default)]
    pub cloud_cover_mid: f64,
    #[serde(default)]
    pub cloud_cover_high: f64,
    /// Meters
    #[serde(default = "default_visibility")]
    pub visibility: f64,
    /// WMO weather interpretation code
    #[serde(default)]
    pub weather_code: u16,
    /// 250 hPa wind speed, km/h
    #[serde(default)]
    pub jet_stream_speed: f64,
    #[serde(default)]
    pub jet_stream_direction: f64,
    /// 250 hPa vertical velocity, m/s
    #[serde(default)]
    pub vertical_velocity_250hpa: f64,
    /// J/kg
    #[serde(default)]
    pub cape: f64,
    #[serde(default)]
    pub temperature_500hpa: f64,
    #[serde(default)]
    pub temperature_700hpa: f64,
    #[serde(default)]
    pub relative_humidity_500hpa: f64,
    #[serde(default)]
    pub relative_humidity_700hpa: f64,
    pub fetched_at: DateTime<Utc>,
    /// Set when the provider failed and this is a fallback value
    #[serde(default)]
    pub degraded: bool,
}

fn default_visibility() -> f64 {
    10_000.0
}

impl AtmosphericSnapshot {
    /// Still air, clear skies, unlimited visibility.
    pub fn calm() -> Self {
        Self {
            wind_speed_10m: 0.0,
            wind_direction_10m: 0.0,
            precipitation: 0.0,
            rain: 0.0,
            showers: 0.0,
            snowfall: 0.0,
            cloud_cover: 0.0,
            cloud_cover_low: 0.0,
            cloud_cover_mid: 0.0,
            cloud_cover_high: 0.0,
            visibility: default_visibility(),
            weather_code: 0,
            jet_stream_speed: 0.0,
            jet_stream_direction: 0.0,
            vertical_velocity_250hpa: 0.0,
            cape: 0.0,
            temperature_500hpa: 0.0,
            temperature_700hpa: 0.0,
            relative_humidity_500hpa: 0.0,
            relative_humidity_700hpa: 0.0,
            fetched_at: Utc::now(),
            degraded: false,
        }
    }

    /// Best-effort fallback used when no reading could be obtained.
    pub fn degraded_default() -> Self {
        Self {
            degraded: true,
            ..Self::calm()
        }
    }

    pub fn into_degraded(self) -> Self {
        Self {
            degraded: true,
            ..self
        }
    }
}

impl Default for AtmosphericSnapshot {
    fn default() -> Self {
        Self::calm()
    }
}

/// Cache key: a coordinate rounded to [`SNAPSHOT_KEY_PRECISION`] decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl SnapshotKey {
    pub fn from_coordinate(at: Coordinate) -> Self {
        let scale = 10f64.powi(SNAPSHOT_KEY_PRECISION);
        Self {
            lat_e4: (at.lat * scale).round() as i64,
            lon_e4: (at.lon * scale).round() as i64,
        }
    }

    /// The rounded coordinate this key stands for.
    pub fn coordinate(&self) -> Coordinate {
        let scale = 10f64.powi(SNAPSHOT_KEY_PRECISION);
        Coordinate::new(self.lat_e4 as f64 / scale, self.lon_e4 as f64 / scale)
    }
}

#[derive(Debug, Error)]
pub enum AtmosphereError {
    #[error("atmosphere request failed: {0}")]
    Transport(String),
    #[error("atmosphere provider returned HTTP {0}")]
    Status(u16),
    #[error("atmosphere response could not be decoded: {0}")]
    Decode(String),
    #[error("atmosphere request timed out after {0} ms")]
    Timeout(u64),
    #[error("atmosphere provider backing off for {0} ms")]
    BackingOff(u64),
}

/// Source of atmospheric snapshots.
pub trait AtmosphereProvider: Send + Sync {
    fn fetch(
        &self,
        at: Coordinate,
    ) -> impl Future<Output = Result<AtmosphericSnapshot, AtmosphereError>> + Send;
}

/// Provider that returns the same snapshot for every coordinate.
#[derive(Debug, Clone, Default)]
pub struct FixedAtmosphere {
    snapshot: AtmosphericSnapshot,
}

impl FixedAtmosphere {
    pub fn new(snapshot: AtmosphericSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn calm() -> Self {
        Self::new(AtmosphericSnapshot::calm())
    }
}

impl AtmosphereProvider for FixedAtmosphere {
    async fn fetch(&self, _at: Coordinate) -> Result<AtmosphericSnapshot, AtmosphereError> {
        Ok(self.snapshot.clone())
    }
}

/// Fetch a snapshot, degrading to the calm default on failure.
pub async fn fetch_or_default<P: AtmosphereProvider>(provider: &P, at: Coordinate) -> AtmosphericSnapshot {
    match provider.fetch(at).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(
                "Atmosphere fetch failed at ({:.4}, {:.4}), using default: {}",
                at.lat,
                at.lon,
                err
            );
            AtmosphericSnapshot::degraded_default()
        }
    }
}

/// Fill in snapshots for every waypoint that does not have one yet.
///
/// At most `concurrency` fetches are outstanding at once; results are
/// written back by index so completion order does not matter.
pub async fn attach_snapshots<P: AtmosphereProvider>(
    waypoints: &mut [Waypoint],
    provider: &P,
    concurrency: usize,
) {
    let missing: Vec<(usize, Coordinate)> = waypoints
        .iter()
        .enumerate()
        .filter(|(_, wp)| wp.snapshot.is_none())
        .map(|(idx, wp)| (idx, wp.position))
        .collect();

    let mut fetched = stream::iter(missing)
        .map(|(idx, at)| async move { (idx, fetch_or_default(provider, at).await) })
        .buffer_unordered(concurrency.max(1));
    while let Some((idx, snapshot)) = fetched.next().await {
        if let Some(wp) = waypoints.get_mut(idx) {
            wp.snapshot = Some(snapshot);
        }
    }
}

/// Same as [`attach_snapshots`] across a whole candidate set.
///
/// Every (route, waypoint) fetch shares one pool of `concurrency` slots.
pub async fn attach_route_snapshots<P: AtmosphereProvider>(
    routes: &mut [Route],
    provider: &P,
    concurrency: usize,
) {
    let missing: Vec<(usize, usize, Coordinate)> = routes
        .iter()
        .enumerate()
        .flat_map(|(route_idx, route)| {
            route
                .waypoints
                .iter()
                .enumerate()
                .filter(|(_, wp)| wp.snapshot.is_none())
                .map(move |(wp_idx, wp)| (route_idx, wp_idx, wp.position))
        })
        .collect();

    let mut fetched = stream::iter(missing)
        .map(|(route_idx, wp_idx, at)| async move {
            (route_idx, wp_idx, fetch_or_default(provider, at).await)
        })
        .buffer_unordered(concurrency.max(1));
    while let Some((route_idx, wp_idx, snapshot)) = fetched.next().await {
        if let Some(wp) = routes
            .get_mut(route_idx)
            .and_then(|route| route.waypoints.get_mut(wp_idx))
        {
            wp.snapshot = Some(snapshot);
        }
    }
}
