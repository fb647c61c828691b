//! Mid-flight rerouting around a blocked waypoint.
//!
//! The flown prefix of the current route is kept, and the tail is replaced by
//! the remainder of the closest unused alternative. Each splice appends one
//! entry to the route's history so a detour style is never tried twice on
//! the same flight.

use crate::atmosphere::{attach_snapshots, AtmosphereProvider};
use crate::error::RerouteError;
use crate::fitness::FitnessEvaluator;
use crate::geo;
use crate::models::{
    nearest_index, AircraftProfile, Coordinate, OptimizationMethod, PathStyle, PathType,
    RerouteRecord, Route, Waypoint, WaypointStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerouteConfig {
    /// Fuel-aware scoring: weight on liters of fuel.
    pub fuel_weight: f64,
    /// Fuel-aware scoring: weight on the tail's weather risk.
    pub weather_risk_weight: f64,
    /// Concurrent snapshot fetches for the new tail.
    pub snapshot_concurrency: usize,
}

impl Default for RerouteConfig {
    fn default() -> Self {
        Self {
            fuel_weight: 0.2,
            weather_risk_weight: 0.1,
            snapshot_concurrency: 8,
        }
    }
}

/// Inputs for one reroute.
#[derive(Debug, Clone, Copy)]
pub struct RerouteRequest<'a> {
    pub route: &'a Route,
    pub blocked_waypoint_id: Uuid,
    pub current_position: Coordinate,
    pub alternatives: &'a [Route],
    pub aircraft: &'a AircraftProfile,
    pub fuel_aware: bool,
}

/// Spliced waypoints before rescoring.
#[derive(Debug, Clone)]
pub struct SplicePlan {
    pub route: Route,
    /// Index of the first waypoint taken from the alternative.
    pub tail_start: usize,
    pub chosen_style: PathStyle,
    /// Index in the alternative where the tail was joined.
    pub join_index: usize,
    pub join_distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouteSummary {
    pub previous_route_id: Uuid,
    pub route_id: Uuid,
    pub blocked_waypoint_id: Uuid,
    pub chosen_style: PathStyle,
    pub join_index: usize,
    pub join_distance_km: f64,
    /// New distance minus the pre-block distance.
    pub distance_delta_km: f64,
    pub previous_fitness: f64,
    pub fitness: f64,
    /// Plain evaluator fitness, before any fuel-aware terms.
    pub base_fitness: f64,
    pub fuel_aware: bool,
    pub weather_risk: Option<f64>,
    pub degraded_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerouteOutcome {
    pub route: Route,
    pub summary: RerouteSummary,
}

#[derive(Debug, Clone, Default)]
pub struct Rerouter {
    evaluator: FitnessEvaluator,
    config: RerouteConfig,
}

impl Rerouter {
    pub fn new(evaluator: FitnessEvaluator, config: RerouteConfig) -> Self {
        Self { evaluator, config }
    }

    /// Splice, refresh snapshots on the new tail, and rescore.
    pub async fn reroute<P: AtmosphereProvider>(
        &self,
        request: RerouteRequest<'_>,
        provider: &P,
    ) -> Result<RerouteOutcome, RerouteError> {
        let mut plan = self.splice(&request)?;
        attach_snapshots(
            &mut plan.route.waypoints[plan.tail_start..],
            provider,
            self.config.snapshot_concurrency,
        )
        .await;
        Ok(self.rescore(plan, &request))
    }

    /// Alternatives not yet tried by this flight.
    ///
    /// The current route's own style is excluded as well: its geometry is
    /// the one containing the blocked waypoint.
    pub fn eligible<'r>(&self, route: &Route, alternatives: &'r [Route]) -> Vec<&'r Route> {
        let current = route.path_type.style();
        alternatives
            .iter()
            .filter(|alt| !alt.path_type.is_rerouted())
            .filter(|alt| !alt.waypoints.is_empty())
            .filter(|alt| {
                let style = alt.path_type.style();
                style != current && !route.used_styles().any(|used| used == style)
            })
            .collect()
    }

    /// Build the spliced waypoint sequence without touching snapshots.
    pub fn splice(&self, request: &RerouteRequest<'_>) -> Result<SplicePlan, RerouteError> {
        let route = request.route;
        if route.waypoints.is_empty() {
            return Err(RerouteError::EmptyRoute);
        }
        let blocked_idx = route
            .waypoint_index(request.blocked_waypoint_id)
            .ok_or(RerouteError::UnknownWaypoint(request.blocked_waypoint_id))?;
        if blocked_idx == 0 {
            return Err(RerouteError::BlockedAtOrigin);
        }
        if route.waypoints[blocked_idx].status == WaypointStatus::Passed {
            return Err(RerouteError::AlreadyPassed(request.blocked_waypoint_id));
        }

        let (chosen, join_index, join_distance_km) = self
            .eligible(route, request.alternatives)
            .into_iter()
            .filter_map(|alt| {
                alt.nearest_waypoint(request.current_position)
                    .map(|(idx, dist)| (alt, idx, dist))
            })
            .reduce(|best, next| {
                let order = next
                    .2
                    .total_cmp(&best.2)
                    .then(next.0.fitness.total_cmp(&best.0.fitness));
                if order.is_lt() {
                    next
                } else {
                    best
                }
            })
            .ok_or_else(|| {
                let mut used: Vec<PathStyle> = route.used_styles().collect();
                used.push(route.path_type.style());
                used.sort();
                used.dedup();
                RerouteError::Exhausted { used }
            })?;

        let keep_through = nearest_index(&route.waypoints[..blocked_idx], request.current_position)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let mut waypoints: Vec<Waypoint> = route.waypoints[..=keep_through].to_vec();
        let tail_start = waypoints.len();
        let joint = waypoints[tail_start - 1].position;

        for wp in &chosen.waypoints[join_index..] {
            if waypoints.len() == tail_start && wp.position == joint {
                continue;
            }
            let mut fresh = wp.duplicate();
            fresh.status = WaypointStatus::Pending;
            fresh.snapshot = None;
            waypoints.push(fresh);
        }
        let destination = route.destination.location;
        let reaches_destination = waypoints
            .last()
            .map(|wp| geo::distance(wp.position, destination) < 1e-6)
            .unwrap_or(false);
        if !reaches_destination {
            waypoints.push(Waypoint::new(0, destination));
        }

        let style = chosen.path_type.style();
        let mut spliced = Route::new(
            route.origin.clone(),
            route.destination.clone(),
            waypoints,
            PathType::Rerouted(style),
        );
        spliced.optimization_method = Some(OptimizationMethod::Reroute);
        spliced.reroute_history = route.reroute_history.clone();
        spliced.reroute_history.push(RerouteRecord {
            blocked_waypoint_id: request.blocked_waypoint_id,
            path_type: style,
        });

        Ok(SplicePlan {
            route: spliced,
            tail_start,
            chosen_style: style,
            join_index,
            join_distance_km,
        })
    }

    /// Recompute derived figures for a spliced route.
    pub fn rescore(&self, plan: SplicePlan, request: &RerouteRequest<'_>) -> RerouteOutcome {
        let SplicePlan {
            mut route,
            tail_start,
            chosen_style,
            join_index,
            join_distance_km,
        } = plan;

        let breakdown = self.evaluator.apply(&mut route, request.aircraft);
        let weather_risk = if request.fuel_aware {
            let risk = self.evaluator.weather_risk(&route.waypoints[tail_start..]);
            route.fitness = breakdown.fitness
                + self.config.fuel_weight * breakdown.fuel_l
                + self.config.weather_risk_weight * risk;
            Some(risk)
        } else {
            None
        };

        let previous = request.route;
        let summary = RerouteSummary {
            previous_route_id: previous.id,
            route_id: route.id,
            blocked_waypoint_id: request.blocked_waypoint_id,
            chosen_style,
            join_index,
            join_distance_km,
            distance_delta_km: route.distance_km - previous.distance_km,
            previous_fitness: previous.fitness,
            fitness: route.fitness,
            base_fitness: breakdown.fitness,
            fuel_aware: request.fuel_aware,
            weather_risk,
            degraded_data: route.degraded_data,
        };

        RerouteOutcome { route, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::{AtmosphericSnapshot, FixedAtmosphere};
    use crate::generator::{GenerationRequest, GeneratorConfig, RouteGenerator};
    use crate::models::Airport;

    fn airport(code: &str, lat: f64, lon: f64) -> Airport {
        Airport {
            code: code.to_string(),
            name: code.to_string(),
            city: String::new(),
            location: Coordinate::new(lat, lon),
            elevation_m: 0.0,
            timezone: String::new(),
        }
    }

    fn a320() -> AircraftProfile {
        AircraftProfile {
            model: "A320".to_string(),
            cruise_speed_kmh: 840.0,
            fuel_capacity_l: 24_210.0,
            fuel_burn_lph: 2_500.0,
        }
    }

    /// Scored DEL-BOM candidates, the direct route first.
    fn candidates(waypoint_count: usize) -> Vec<Route> {
        let generator = RouteGenerator::new(GeneratorConfig {
            waypoint_count,
            ..GeneratorConfig::default()
        });
        let request = GenerationRequest {
            origin: airport("DEL", 28.5562, 77.1000),
            destination: airport("BOM", 19.0896, 72.8656),
            styles: Vec::new(),
            exclusions: Vec::new(),
        };
        let evaluator = FitnessEvaluator::default();
        let mut routes = generator.generate(&request).expect("routes");
        for route in &mut routes {
            for wp in &mut route.waypoints {
                wp.snapshot = Some(AtmosphericSnapshot::calm());
            }
            evaluator.apply(route, &a320());
        }
        routes
    }

    fn request<'a>(
        route: &'a Route,
        blocked: usize,
        alternatives: &'a [Route],
        aircraft: &'a AircraftProfile,
    ) -> RerouteRequest<'a> {
        RerouteRequest {
            route,
            blocked_waypoint_id: route.waypoints[blocked].id,
            current_position: route.waypoints[blocked - 1].position,
            alternatives,
            aircraft,
            fuel_aware: false,
        }
    }

    #[test]
    fn test_splice_preserves_prefix_and_numbering() {
        let routes = candidates(10);
        let aircraft = a320();
        let current = &routes[0];
        let rerouter = Rerouter::default();
        let plan = rerouter.splice(&request(current, 4, &routes, &aircraft)).expect("splice");

        let spliced = &plan.route;
        for (kept, original) in spliced.waypoints[..plan.tail_start].iter().zip(&current.waypoints) {
            assert_eq!(kept.id, original.id);
            assert_eq!(kept.position, original.position);
        }
        assert_eq!(plan.tail_start, 4);
        let sequences: Vec<u32> = spliced.waypoints.iter().map(|wp| wp.sequence).collect();
        assert_eq!(sequences, (1..=spliced.waypoints.len() as u32).collect::<Vec<_>>());
        assert!(spliced.waypoints.iter().all(|wp| wp.id != current.waypoints[4].id));
        assert_eq!(
            spliced.waypoints.last().map(|wp| wp.position),
            Some(current.destination.location)
        );
    }

    #[test]
    fn test_tail_waypoints_get_fresh_identity() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let plan = rerouter.splice(&request(&routes[0], 3, &routes, &aircraft)).expect("splice");
        let alternative_ids: Vec<Uuid> = routes
            .iter()
            .flat_map(|route| route.waypoints.iter().map(|wp| wp.id))
            .collect();
        for wp in &plan.route.waypoints[plan.tail_start..] {
            assert!(!alternative_ids.contains(&wp.id));
            assert!(wp.snapshot.is_none());
            assert_eq!(wp.status, WaypointStatus::Pending);
        }
    }

    #[test]
    fn test_history_styles_are_never_reused() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let mut current = routes[0].clone();

        // Blocking right after the origin joins every alternative at its
        // first waypoint, so the pick falls to fitness each time.
        for splice in 1..=PathStyle::ALL.len() {
            let plan = rerouter
                .splice(&request(&current, 1, &routes, &aircraft))
                .expect("alternative left");
            assert!(!current.used_styles().any(|used| used == plan.chosen_style));
            assert_ne!(plan.chosen_style, current.path_type.style());
            assert_eq!(plan.route.reroute_history.len(), splice);
            current = plan.route;
        }

        let result = rerouter.splice(&request(&current, 1, &routes, &aircraft));
        match result {
            Err(RerouteError::Exhausted { used }) => assert_eq!(used, PathStyle::ALL.to_vec()),
            other => panic!("expected exhaustion, got {:?}", other.map(|plan| plan.chosen_style)),
        }
    }

    #[test]
    fn test_rejects_origin_and_unknown_waypoints() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let current = &routes[0];

        let mut req = request(current, 1, &routes, &aircraft);
        req.blocked_waypoint_id = current.waypoints[0].id;
        assert_eq!(rerouter.splice(&req).err(), Some(RerouteError::BlockedAtOrigin));

        let stray = Uuid::new_v4();
        req.blocked_waypoint_id = stray;
        assert_eq!(rerouter.splice(&req).err(), Some(RerouteError::UnknownWaypoint(stray)));
    }

    #[test]
    fn test_passed_waypoint_cannot_be_blocked() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let mut current = routes[0].clone();
        current.waypoints[2].status = WaypointStatus::Passed;
        let result = rerouter.splice(&request(&current, 2, &routes, &aircraft));
        assert!(matches!(result, Err(RerouteError::AlreadyPassed(_))));
    }

    #[test]
    fn test_closest_alternative_wins() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let current = &routes[0];
        let target = routes
            .iter()
            .find(|route| route.path_type == PathType::Generated(PathStyle::Right))
            .expect("right route");

        let mut req = request(current, 5, &routes, &aircraft);
        req.current_position = target.waypoints[5].position;
        let plan = rerouter.splice(&req).expect("splice");
        assert_eq!(plan.chosen_style, PathStyle::Right);
        assert_eq!(plan.join_index, 5);
        assert!(plan.join_distance_km < 1e-9);
    }

    #[tokio::test]
    async fn test_fuel_aware_score_adds_fuel_and_risk() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let current = &routes[0];

        let mut stormy = AtmosphericSnapshot::calm();
        stormy.visibility = 3000.0;
        let provider = FixedAtmosphere::new(stormy);

        let plain = rerouter
            .reroute(request(current, 3, &routes, &aircraft), &provider)
            .await
            .expect("plain");
        let mut req = request(current, 3, &routes, &aircraft);
        req.fuel_aware = true;
        let aware = rerouter.reroute(req, &provider).await.expect("aware");

        let risk = aware.summary.weather_risk.expect("risk tallied");
        let tail = aware.route.waypoints.len() - 3;
        assert!((risk - 2.0 * tail as f64).abs() < 1e-9);
        let expected = aware.summary.base_fitness + 0.2 * aware.route.fuel_l + 0.1 * risk;
        assert!((aware.route.fitness - expected).abs() < 1e-9);
        assert_eq!(plain.summary.weather_risk, None);
        assert_eq!(plain.route.fitness, plain.summary.base_fitness);
    }

    #[tokio::test]
    async fn test_reroute_refetches_tail_snapshots() {
        let routes = candidates(10);
        let aircraft = a320();
        let rerouter = Rerouter::default();
        let current = &routes[0];

        let outcome = rerouter
            .reroute(request(current, 3, &routes, &aircraft), &FixedAtmosphere::calm())
            .await
            .expect("reroute");
        assert!(outcome.route.waypoints.iter().all(|wp| wp.snapshot.is_some()));
        assert!(!outcome.route.degraded_data);
        assert_eq!(outcome.summary.previous_route_id, current.id);
        assert_eq!(outcome.route.path_type.to_string(), format!("rerouted_{}", outcome.summary.chosen_style));
        assert!(
            (outcome.summary.distance_delta_km - (outcome.route.distance_km - current.distance_km)).abs()
                < 1e-12
        );
    }
}
