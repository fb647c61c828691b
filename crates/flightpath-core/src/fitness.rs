//! Route scoring: fuel, time and weather-driven safety penalties folded into
//! a single lower-is-better fitness value.

use crate::atmosphere::AtmosphericSnapshot;
use crate::geo;
use crate::models::{AircraftProfile, Coordinate, Route, Waypoint};
use serde::{Deserialize, Serialize};

/// Weights and thresholds for the fitness model.
///
/// Defaults reflect typical commercial operations; tests override individual
/// fields to isolate one term at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Ground speed never drops below this fraction of cruise speed.
    pub min_ground_speed_ratio: f64,
    /// Fuel change per `low_wind_unit_kmh` of surface headwind (0.02 = 2%).
    pub low_wind_fuel_factor: f64,
    pub low_wind_unit_kmh: f64,
    /// Fixed term added whenever fuel exceeds usable capacity.
    pub capacity_penalty: f64,
    /// Extra penalty per unit of relative overrun.
    pub capacity_overrun_weight: f64,

    /// Vertical velocity magnitude at 250 hPa (m/s).
    pub turbulence_threshold: f64,
    pub turbulence_weight: f64,
    /// CAPE (J/kg) above which a waypoint counts as convective.
    pub cape_threshold: f64,
    /// High cloud cover (%) that also counts as convective.
    pub high_cloud_threshold: f64,
    pub convective_weight: f64,
    /// Meters.
    pub low_visibility_threshold: f64,
    pub low_visibility_weight: f64,
    /// Total cloud cover (%).
    pub cloud_cover_threshold: f64,
    pub cloud_cover_weight: f64,
    pub precipitation_threshold: f64,
    pub rain_threshold: f64,
    pub showers_threshold: f64,
    pub snowfall_threshold: f64,
    pub contamination_weight: f64,
    /// km/h across the route's overall bearing.
    pub crosswind_threshold_kmh: f64,
    pub crosswind_weight: f64,
    /// WMO codes above this are treated as hazardous.
    pub hazard_code_threshold: u16,
    pub hazard_code_weight: f64,

    /// Left at 1 so each rule's weight is its exact fitness contribution.
    pub safety_weight: f64,
    pub safety_scale: f64,
    pub fuel_weight: f64,
    /// Liters mapped to one unit of normalized fuel.
    pub fuel_scale: f64,
    pub length_penalty_threshold_km: f64,
    /// Applied per 1000 km beyond the threshold.
    pub length_penalty_weight: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            min_ground_speed_ratio: 0.5,
            low_wind_fuel_factor: 0.02,
            low_wind_unit_kmh: 10.0,
            capacity_penalty: 1000.0,
            capacity_overrun_weight: 10.0,
            turbulence_threshold: 0.5,
            turbulence_weight: 2.0,
            cape_threshold: 1000.0,
            high_cloud_threshold: 80.0,
            convective_weight: 3.0,
            low_visibility_threshold: 5000.0,
            low_visibility_weight: 1.0,
            cloud_cover_threshold: 80.0,
            cloud_cover_weight: 0.5,
            precipitation_threshold: 10.0,
            rain_threshold: 5.0,
            showers_threshold: 5.0,
            snowfall_threshold: 1.0,
            contamination_weight: 0.75,
            crosswind_threshold_kmh: 20.0,
            crosswind_weight: 0.5,
            hazard_code_threshold: 50,
            hazard_code_weight: 0.3,
            safety_weight: 1.0,
            safety_scale: 1.0,
            fuel_weight: 0.4,
            fuel_scale: 10_000.0,
            length_penalty_threshold_km: 5000.0,
            length_penalty_weight: 1.0,
        }
    }
}

/// How many times each safety rule fired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardCounts {
    pub turbulence: u32,
    pub convective: u32,
    pub low_visibility: u32,
    pub cloud_cover: u32,
    pub contamination: u32,
    pub crosswind: u32,
    pub hazard_code: u32,
}

impl HazardCounts {
    pub fn total(&self) -> u32 {
        self.turbulence
            + self.convective
            + self.low_visibility
            + self.cloud_cover
            + self.contamination
            + self.crosswind
            + self.hazard_code
    }
}

/// Every term that went into a fitness value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    pub distance_km: f64,
    pub duration_min: f64,
    pub fuel_l: f64,
    pub safety_score: f64,
    pub hazards: HazardCounts,
    pub capacity_penalty: f64,
    pub length_penalty: f64,
    pub fitness: f64,
    /// At least one waypoint had no snapshot or a fallback snapshot.
    pub degraded: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
}

struct Leg<'a> {
    from: Coordinate,
    to: Coordinate,
    snapshot: Option<&'a AtmosphericSnapshot>,
}

impl FitnessEvaluator {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Score a route without modifying it.
    pub fn evaluate(&self, route: &Route, aircraft: &AircraftProfile) -> FitnessBreakdown {
        self.evaluate_waypoints(
            route.origin.location,
            route.destination.location,
            &route.waypoints,
            aircraft,
        )
    }

    /// Score a route and write the derived figures back onto it.
    pub fn apply(&self, route: &mut Route, aircraft: &AircraftProfile) -> FitnessBreakdown {
        let breakdown = self.evaluate(route, aircraft);
        route.distance_km = breakdown.distance_km;
        route.duration_min = breakdown.duration_min;
        route.fuel_l = breakdown.fuel_l;
        route.fitness = breakdown.fitness;
        route.degraded_data = breakdown.degraded;
        breakdown
    }

    pub fn evaluate_waypoints(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Waypoint],
        aircraft: &AircraftProfile,
    ) -> FitnessBreakdown {
        let cfg = &self.config;
        let legs = build_legs(origin, destination, waypoints);
        let cruise = aircraft.cruise_speed_kmh.max(1.0);

        let mut distance_km = 0.0;
        let mut time_h = 0.0;
        let mut fuel_l = 0.0;

        for leg in &legs {
            let leg_km = geo::distance(leg.from, leg.to);
            let heading = geo::bearing(leg.from, leg.to);
            let (jet_speed, jet_dir, surface_speed, surface_dir) = match leg.snapshot {
                Some(s) => (
                    s.jet_stream_speed,
                    s.jet_stream_direction,
                    s.wind_speed_10m,
                    s.wind_direction_10m,
                ),
                None => (0.0, 0.0, 0.0, 0.0),
            };

            let ground_speed = (cruise + tailwind_component(jet_speed, jet_dir, heading))
                .max(cruise * cfg.min_ground_speed_ratio);
            let leg_h = leg_km / ground_speed;

            let headwind = -tailwind_component(surface_speed, surface_dir, heading);
            let unit = cfg.low_wind_unit_kmh.max(f64::EPSILON);
            let wind_factor = (1.0 + cfg.low_wind_fuel_factor * headwind / unit).clamp(0.5, 1.5);

            distance_km += leg_km;
            time_h += leg_h;
            fuel_l += leg_h * aircraft.fuel_burn_lph * wind_factor;
        }

        let route_heading = geo::bearing(origin, destination);
        let (hazards, degraded) = self.count_hazards(waypoints, route_heading);
        let safety_score = self.safety_score(&hazards);

        let capacity_penalty = if fuel_l > aircraft.fuel_capacity_l {
            let capacity = aircraft.fuel_capacity_l.max(f64::EPSILON);
            cfg.capacity_penalty + cfg.capacity_overrun_weight * (fuel_l - capacity) / capacity
        } else {
            0.0
        };

        let length_penalty = if distance_km > cfg.length_penalty_threshold_km {
            cfg.length_penalty_weight * (distance_km - cfg.length_penalty_threshold_km) / 1000.0
        } else {
            0.0
        };

        let fitness = cfg.safety_weight * safety_score / cfg.safety_scale.max(f64::EPSILON)
            + cfg.fuel_weight * fuel_l / cfg.fuel_scale.max(f64::EPSILON)
            + capacity_penalty
            + length_penalty;

        FitnessBreakdown {
            distance_km,
            duration_min: time_h * 60.0,
            fuel_l,
            safety_score,
            hazards,
            capacity_penalty,
            length_penalty,
            fitness,
            degraded,
        }
    }

    fn count_hazards(&self, waypoints: &[Waypoint], route_heading: f64) -> (HazardCounts, bool) {
        let cfg = &self.config;
        let calm = AtmosphericSnapshot::calm();
        let mut counts = HazardCounts::default();
        let mut degraded = false;

        for wp in waypoints {
            let snapshot = match wp.snapshot.as_ref() {
                Some(snapshot) => {
                    degraded |= snapshot.degraded;
                    snapshot
                }
                None => {
                    degraded = true;
                    &calm
                }
            };
            if snapshot.vertical_velocity_250hpa.abs() > cfg.turbulence_threshold {
                counts.turbulence += 1;
            }
            if snapshot.cape > cfg.cape_threshold || snapshot.cloud_cover_high > cfg.high_cloud_threshold {
                counts.convective += 1;
            }
        }

        let endpoints: Vec<&Waypoint> = match waypoints {
            [] => Vec::new(),
            [only] => vec![only],
            [first, .., last] => vec![first, last],
        };
        for wp in endpoints {
            let snapshot = wp.snapshot.as_ref().unwrap_or(&calm);

            if snapshot.visibility < cfg.low_visibility_threshold {
                counts.low_visibility += 1;
            }
            if snapshot.cloud_cover > cfg.cloud_cover_threshold {
                counts.cloud_cover += 1;
            }
            if snapshot.precipitation > cfg.precipitation_threshold
                || snapshot.rain > cfg.rain_threshold
                || snapshot.showers > cfg.showers_threshold
                || snapshot.snowfall > cfg.snowfall_threshold
            {
                counts.contamination += 1;
            }
            let crosswind = crosswind_component(
                snapshot.wind_speed_10m,
                snapshot.wind_direction_10m,
                route_heading,
            );
            if crosswind > cfg.crosswind_threshold_kmh {
                counts.crosswind += 1;
            }
            if snapshot.weather_code > cfg.hazard_code_threshold {
                counts.hazard_code += 1;
            }
        }

        (counts, degraded)
    }

    fn safety_score(&self, hazards: &HazardCounts) -> f64 {
        let cfg = &self.config;
        hazards.turbulence as f64 * cfg.turbulence_weight
            + hazards.convective as f64 * cfg.convective_weight
            + hazards.low_visibility as f64 * cfg.low_visibility_weight
            + hazards.cloud_cover as f64 * cfg.cloud_cover_weight
            + hazards.contamination as f64 * cfg.contamination_weight
            + hazards.crosswind as f64 * cfg.crosswind_weight
            + hazards.hazard_code as f64 * cfg.hazard_code_weight
    }

    /// Weather risk tally over a run of waypoints, used by fuel-aware
    /// rerouting. Missing snapshots contribute nothing.
    pub fn weather_risk(&self, waypoints: &[Waypoint]) -> f64 {
        let cfg = &self.config;
        waypoints
            .iter()
            .filter_map(|wp| wp.snapshot.as_ref())
            .map(|s| {
                let mut risk = 0.0;
                if s.vertical_velocity_250hpa.abs() > cfg.turbulence_threshold {
                    risk += s.vertical_velocity_250hpa.abs() * 2.0;
                }
                if s.visibility < cfg.low_visibility_threshold {
                    risk += (cfg.low_visibility_threshold - s.visibility) / 1000.0;
                }
                if s.cloud_cover > cfg.cloud_cover_threshold {
                    risk += (s.cloud_cover - cfg.cloud_cover_threshold) / 5.0;
                }
                risk
            })
            .sum()
    }
}

fn build_legs(origin: Coordinate, destination: Coordinate, waypoints: &[Waypoint]) -> Vec<Leg<'_>> {
    let mut legs = Vec::with_capacity(waypoints.len() + 1);
    let Some(first) = waypoints.first() else {
        legs.push(Leg {
            from: origin,
            to: destination,
            snapshot: None,
        });
        return legs;
    };

    legs.push(Leg {
        from: origin,
        to: first.position,
        snapshot: first.snapshot.as_ref(),
    });
    for pair in waypoints.windows(2) {
        legs.push(Leg {
            from: pair[0].position,
            to: pair[1].position,
            snapshot: pair[0].snapshot.as_ref(),
        });
    }
    if let Some(last) = waypoints.last() {
        legs.push(Leg {
            from: last.position,
            to: destination,
            snapshot: last.snapshot.as_ref(),
        });
    }

    legs.retain(|leg| leg.from != leg.to);
    legs
}

/// Component of a "from" wind along `heading_deg`; positive is a tailwind.
pub fn tailwind_component(speed: f64, from_deg: f64, heading_deg: f64) -> f64 {
    -speed * (heading_deg - from_deg).to_radians().cos()
}

/// Magnitude of a "from" wind across `heading_deg`.
pub fn crosswind_component(speed: f64, from_deg: f64, heading_deg: f64) -> f64 {
    (speed * (heading_deg - from_deg).to_radians().sin()).abs()
}
