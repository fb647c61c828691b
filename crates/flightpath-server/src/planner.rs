//! Planning and rerouting workflows on top of the shared state.
//!
//! Handlers stay thin: every operation here takes the state and a request
//! body, touches the route store, and publishes live updates.

use crate::error::ApiError;
use crate::state::{AppState, RouteMessage, StoredRoute};
use flightpath_core::{
    attach_route_snapshots, optimize, AircraftProfile, Coordinate, ExcludedRegion, FitnessEvaluator,
    GenerationRequest, Optimization, OptimizerKind, OptimizerSettings, PathStyle, ReferenceData,
    RerouteError, RerouteOutcome, RerouteRequest, Route, WaypointStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    /// Origin airport code
    pub origin: String,
    pub destination: String,
    /// Aircraft model, e.g. "A320"
    pub aircraft: String,
    #[serde(default)]
    pub method: Option<OptimizerKind>,
    /// Candidate styles; all when empty.
    #[serde(default)]
    pub styles: Vec<PathStyle>,
    #[serde(default)]
    pub exclusions: Vec<ExcludedRegion>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub best: Route,
    pub candidates: Vec<Route>,
    pub method: OptimizerKind,
    pub degraded_data: bool,
    pub rounds: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockRequest {
    pub blocked_waypoint_id: Uuid,
    pub current_position: Coordinate,
    #[serde(default)]
    pub fuel_aware: bool,
}

/// Reroute with the whole route supplied by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRerouteRequest {
    pub route: Route,
    pub alternatives: Vec<Route>,
    pub aircraft_model: String,
    pub blocked_waypoint_id: Uuid,
    pub current_position: Coordinate,
    #[serde(default)]
    pub fuel_aware: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressRequest {
    pub waypoint_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequest {
    pub candidates: Vec<Route>,
    pub aircraft: String,
    #[serde(default)]
    pub method: Option<OptimizerKind>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Fetch snapshots for waypoints that arrive without one.
    #[serde(default)]
    pub fetch_snapshots: bool,
}

pub async fn plan(state: &AppState, request: PlanRequest) -> Result<PlanResponse, ApiError> {
    let catalog = state.catalog();
    let origin = catalog.airport(&request.origin)?;
    let destination = catalog.airport(&request.destination)?;
    let aircraft = catalog.aircraft(&request.aircraft)?;
    for region in &request.exclusions {
        if !region.center.is_valid() || !region.radius_km.is_finite() || region.radius_km <= 0.0 {
            return Err(ApiError::BadRequest(
                "excluded regions need a valid center and a positive radius".to_string(),
            ));
        }
    }

    let method = request.method.unwrap_or(state.config().default_method);
    let mut candidates = state.generator().generate(&GenerationRequest {
        origin,
        destination,
        styles: request.styles,
        exclusions: request.exclusions,
    })?;
    attach_candidate_snapshots(state, &mut candidates).await;

    let settings = seeded_settings(state.optimizer_settings(), request.seed);
    let optimization = run_optimizer(
        method,
        candidates,
        state.evaluator().clone(),
        aircraft.clone(),
        settings,
    )
    .await?;

    if optimization
        .evaluated
        .iter()
        .all(|route| route.fuel_l > aircraft.fuel_capacity_l)
    {
        return Err(ApiError::Infeasible(format!(
            "every candidate needs more than the {} capacity of {:.0} L",
            aircraft.model, aircraft.fuel_capacity_l
        )));
    }

    let best = optimization.best.clone();
    state.routes.insert(StoredRoute {
        route: best.clone(),
        alternatives: optimization.evaluated.clone(),
        aircraft,
        lineage: best.id,
        superseded_by: None,
    });

    tracing::info!(
        "Planned {} -> {} via {} ({}): {:.1} km, fitness {:.4}{}",
        best.origin.code,
        best.destination.code,
        best.path_type,
        method,
        best.distance_km,
        best.fitness,
        if best.degraded_data { ", degraded data" } else { "" }
    );

    Ok(PlanResponse {
        degraded_data: best.degraded_data,
        best,
        candidates: optimization.evaluated,
        method,
        rounds: optimization.rounds,
        evaluations: optimization.evaluations,
    })
}

/// Reroute a stored route around a blocked waypoint.
pub async fn block_and_reroute(
    state: &AppState,
    route_id: Uuid,
    request: BlockRequest,
) -> Result<RerouteOutcome, ApiError> {
    if !request.current_position.is_valid() {
        return Err(ApiError::BadRequest("current_position is out of range".to_string()));
    }

    let lock = state.routes.reroute_lock(route_id);
    let _guard = lock
        .try_lock()
        .map_err(|_| ApiError::Conflict(format!("route {} is already being rerouted", route_id)))?;

    let stored = state
        .routes
        .get(&route_id)
        .ok_or(ApiError::RouteNotFound(route_id))?;
    if let Some(successor) = stored.superseded_by {
        return Err(ApiError::Conflict(format!(
            "route {} was already rerouted to {}",
            route_id, successor
        )));
    }

    let result = state
        .rerouter()
        .reroute(
            RerouteRequest {
                route: &stored.route,
                blocked_waypoint_id: request.blocked_waypoint_id,
                current_position: request.current_position,
                alternatives: &stored.alternatives,
                aircraft: &stored.aircraft,
                fuel_aware: request.fuel_aware,
            },
            state.cache.as_ref(),
        )
        .await;

    // The hazard stands even when no detour is left.
    if matches!(result, Ok(_) | Err(RerouteError::Exhausted { .. })) {
        if let Some(change) =
            state
                .routes
                .set_status(&route_id, &request.blocked_waypoint_id, WaypointStatus::Blocked)
        {
            state.publish_status(stored.lineage, route_id, &[change]);
        }
    }
    let outcome = result.map_err(|err| {
        tracing::warn!("Reroute of {} failed: {}", route_id, err);
        ApiError::from(err)
    })?;

    let route = outcome.route.clone();
    state.routes.supersede(
        &route_id,
        StoredRoute {
            route: route.clone(),
            alternatives: stored.alternatives,
            aircraft: stored.aircraft,
            lineage: stored.lineage,
            superseded_by: None,
        },
    );
    state.publish(
        stored.lineage,
        RouteMessage::RouteUpdate {
            route_id: route.id,
            previous_route_id: Some(route_id),
            route,
            summary: Some(outcome.summary.clone()),
        },
    );

    tracing::info!(
        "Rerouted {} -> {} via {} (join {}, {:+.1} km)",
        route_id,
        outcome.route.id,
        outcome.summary.chosen_style,
        outcome.summary.join_index,
        outcome.summary.distance_delta_km
    );
    Ok(outcome)
}

/// Reroute a caller-supplied route without touching the store.
pub async fn reroute_payload(
    state: &AppState,
    request: PayloadRerouteRequest,
) -> Result<RerouteOutcome, ApiError> {
    let aircraft = state.catalog().aircraft(&request.aircraft_model)?;
    let route_id = request.route.id;

    let lock = state.routes.reroute_lock(route_id);
    let guard = lock
        .try_lock()
        .map_err(|_| ApiError::Conflict(format!("route {} is already being rerouted", route_id)))?;

    let result = state
        .rerouter()
        .reroute(
            RerouteRequest {
                route: &request.route,
                blocked_waypoint_id: request.blocked_waypoint_id,
                current_position: request.current_position,
                alternatives: &request.alternatives,
                aircraft: &aircraft,
                fuel_aware: request.fuel_aware,
            },
            state.cache.as_ref(),
        )
        .await;

    drop(guard);
    drop(lock);
    state.routes.release_lock(&route_id);
    Ok(result?)
}

/// Progress report: the named waypoint is now active.
pub fn advance(state: &AppState, route_id: Uuid, request: ProgressRequest) -> Result<Route, ApiError> {
    let stored = state
        .routes
        .get(&route_id)
        .ok_or(ApiError::RouteNotFound(route_id))?;
    if let Some(successor) = stored.superseded_by {
        return Err(ApiError::Conflict(format!(
            "route {} was replaced by {}",
            route_id, successor
        )));
    }

    let changes = state
        .routes
        .advance(&route_id, &request.waypoint_id)
        .ok_or(ApiError::Reroute(RerouteError::UnknownWaypoint(request.waypoint_id)))?;
    state.publish_status(stored.lineage, route_id, &changes);

    state
        .routes
        .get(&route_id)
        .map(|stored| stored.route)
        .ok_or(ApiError::RouteNotFound(route_id))
}

pub async fn optimize_candidates(
    state: &AppState,
    request: OptimizeRequest,
) -> Result<Optimization, ApiError> {
    let aircraft = state.catalog().aircraft(&request.aircraft)?;
    let method = request.method.unwrap_or(state.config().default_method);
    let mut candidates = request.candidates;
    if request.fetch_snapshots {
        attach_candidate_snapshots(state, &mut candidates).await;
    }

    let settings = seeded_settings(state.optimizer_settings(), request.seed);
    run_optimizer(method, candidates, state.evaluator().clone(), aircraft, settings).await
}

/// Fill snapshots for every candidate with at most `eval_concurrency`
/// provider fetches outstanding.
pub async fn attach_candidate_snapshots(state: &AppState, candidates: &mut [Route]) {
    let limit = state.config().eval_concurrency.max(1);
    attach_route_snapshots(candidates, state.cache.as_ref(), limit).await;
}

fn seeded_settings(base: &OptimizerSettings, seed: Option<u64>) -> OptimizerSettings {
    let mut settings = base.clone();
    if let Some(seed) = seed {
        settings.ant_colony.seed = Some(seed);
        settings.genetic.seed = Some(seed);
    }
    settings
}

/// Runs the search on the blocking pool.
async fn run_optimizer(
    kind: OptimizerKind,
    candidates: Vec<Route>,
    evaluator: FitnessEvaluator,
    aircraft: AircraftProfile,
    settings: OptimizerSettings,
) -> Result<Optimization, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || {
        optimize(kind, &candidates, &evaluator, &aircraft, &settings)
    })
    .await
    .map_err(|err| ApiError::Internal(format!("optimizer task failed: {}", err)))?;
    Ok(outcome?)
}
