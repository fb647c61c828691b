//! Core data models for route planning.

use crate::atmosphere::AtmosphericSnapshot;
use crate::geo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Read-only airport reference entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// IATA code, e.g. "DEL"
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub city: String,
    pub location: Coordinate,
    #[serde(default)]
    pub elevation_m: f64,
    #[serde(default)]
    pub timezone: String,
}

/// Performance figures used for fuel and time estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftProfile {
    pub model: String,
    pub cruise_speed_kmh: f64,
    /// Usable fuel in liters
    pub fuel_capacity_l: f64,
    /// Cruise consumption in liters per hour
    pub fuel_burn_lph: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointStatus {
    #[default]
    Pending,
    Active,
    Passed,
    Blocked,
}

impl fmt::Display for WaypointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaypointStatus::Pending => "pending",
            WaypointStatus::Active => "active",
            WaypointStatus::Passed => "passed",
            WaypointStatus::Blocked => "blocked",
        };
        f.write_str(label)
    }
}

/// One ordered point along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: Uuid,
    /// 1-based, dense within a route
    pub sequence: u32,
    pub position: Coordinate,
    /// Atmospheric readings, absent until fetched
    #[serde(default)]
    pub snapshot: Option<AtmosphericSnapshot>,
    #[serde(default)]
    pub status: WaypointStatus,
}

impl Waypoint {
    pub fn new(sequence: u32, position: Coordinate) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            position,
            snapshot: None,
            status: WaypointStatus::Pending,
        }
    }

    /// Copy of this waypoint under a new identity.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

/// Geometric style of a generated candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    Direct,
    Left,
    Right,
    North,
    South,
    Wide,
}

impl PathStyle {
    pub const ALL: [PathStyle; 6] = [
        PathStyle::Direct,
        PathStyle::Left,
        PathStyle::Right,
        PathStyle::North,
        PathStyle::South,
        PathStyle::Wide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathStyle::Direct => "direct",
            PathStyle::Left => "left",
            PathStyle::Right => "right",
            PathStyle::North => "north",
            PathStyle::South => "south",
            PathStyle::Wide => "wide",
        }
    }
}

impl fmt::Display for PathStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown path style '{}'", s))
    }
}

/// Route tag: a generated style or a rerouted variant of one.
///
/// Serialized as a plain string: `"left"`, `"rerouted_left"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PathType {
    Generated(PathStyle),
    Rerouted(PathStyle),
}

const REROUTED_PREFIX: &str = "rerouted_";

impl PathType {
    pub fn style(&self) -> PathStyle {
        match self {
            PathType::Generated(style) | PathType::Rerouted(style) => *style,
        }
    }

    pub fn is_rerouted(&self) -> bool {
        matches!(self, PathType::Rerouted(_))
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathType::Generated(style) => write!(f, "{}", style),
            PathType::Rerouted(style) => write!(f, "{}{}", REROUTED_PREFIX, style),
        }
    }
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(REROUTED_PREFIX) {
            Some(style) => Ok(PathType::Rerouted(style.parse()?)),
            None => Ok(PathType::Generated(s.parse()?)),
        }
    }
}

impl From<PathType> for String {
    fn from(value: PathType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PathType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMethod {
    Aco,
    Genetic,
    Reroute,
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OptimizationMethod::Aco => "aco",
            OptimizationMethod::Genetic => "genetic",
            OptimizationMethod::Reroute => "reroute",
        };
        f.write_str(label)
    }
}

/// One applied splice: which waypoint was blocked and which style replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerouteRecord {
    pub blocked_waypoint_id: Uuid,
    pub path_type: PathStyle,
}

/// Circular no-go area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExcludedRegion {
    pub center: Coordinate,
    pub radius_km: f64,
}

impl ExcludedRegion {
    pub fn contains(&self, point: Coordinate) -> bool {
        geo::distance(self.center, point) <= self.radius_km
    }
}

/// A candidate or selected flight path.
///
/// `distance_km`, `duration_min`, `fuel_l` and `fitness` are derived from
/// `waypoints` by the fitness evaluator and must be refreshed after any
/// structural edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub origin: Airport,
    pub destination: Airport,
    pub waypoints: Vec<Waypoint>,
    pub path_type: PathType,
    #[serde(default)]
    pub optimization_method: Option<OptimizationMethod>,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub duration_min: f64,
    /// Lower is better
    #[serde(default)]
    pub fitness: f64,
    #[serde(default)]
    pub fuel_l: f64,
    /// Scored with at least one missing or degraded snapshot
    #[serde(default)]
    pub degraded_data: bool,
    #[serde(default)]
    pub reroute_history: Vec<RerouteRecord>,
    pub created_at: DateTime<Utc>,
}

impl Route {
    pub fn new(
        origin: Airport,
        destination: Airport,
        waypoints: Vec<Waypoint>,
        path_type: PathType,
    ) -> Self {
        let mut route = Self {
            id: Uuid::new_v4(),
            origin,
            destination,
            waypoints,
            path_type,
            optimization_method: None,
            distance_km: 0.0,
            duration_min: 0.0,
            fitness: 0.0,
            fuel_l: 0.0,
            degraded_data: false,
            reroute_history: Vec::new(),
            created_at: Utc::now(),
        };
        route.renumber();
        route
    }

    /// Copy under a new route id with fresh waypoint ids.
    pub fn fork(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            waypoints: self.waypoints.iter().map(Waypoint::duplicate).collect(),
            ..self.clone()
        }
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.waypoints.iter().map(|wp| wp.position).collect()
    }

    pub fn waypoint_index(&self, id: Uuid) -> Option<usize> {
        self.waypoints.iter().position(|wp| wp.id == id)
    }

    /// Reassign sequence numbers 1..=n in current order.
    pub fn renumber(&mut self) {
        for (idx, wp) in self.waypoints.iter_mut().enumerate() {
            wp.sequence = idx as u32 + 1;
        }
    }

    /// Index of the waypoint closest to `point`, with its distance in km.
    pub fn nearest_waypoint(&self, point: Coordinate) -> Option<(usize, f64)> {
        nearest_index(&self.waypoints, point)
    }

    /// Styles this route's lineage has already used.
    pub fn used_styles(&self) -> impl Iterator<Item = PathStyle> + '_ {
        self.reroute_history.iter().map(|record| record.path_type)
    }
}

pub(crate) fn nearest_index(waypoints: &[Waypoint], point: Coordinate) -> Option<(usize, f64)> {
    waypoints
        .iter()
        .enumerate()
        .map(|(idx, wp)| (idx, geo::distance(wp.position, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
