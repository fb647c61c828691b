//! REST API routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use flightpath_core::{AircraftProfile, Airport, Optimization, ReferenceData, RerouteOutcome, Route};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::ws;
use crate::error::ApiError;
use crate::planner::{
    self, BlockRequest, OptimizeRequest, PayloadRerouteRequest, PlanRequest, PlanResponse,
    ProgressRequest,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/routes/plan", post(plan_route))
        .route("/v1/routes/:route_id", get(get_route))
        .route("/v1/routes/:route_id/block", post(block_waypoint))
        .route("/v1/routes/:route_id/progress", post(report_progress))
        .route("/v1/reroute", post(reroute))
        .route("/v1/optimize", post(optimize))
        .route("/v1/airports/:code", get(get_airport))
        .route("/v1/aircraft/:model", get(get_aircraft))
        .route("/v1/ws", get(ws::ws_handler))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "routes": state.routes.len(),
        "cached_snapshots": state.cache.len(),
    }))
}

/// POST /v1/routes/plan
async fn plan_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    planner::plan(&state, request).await.map(Json)
}

/// GET /v1/routes/:route_id
async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<Uuid>,
) -> Result<Json<Route>, ApiError> {
    state
        .routes
        .get(&route_id)
        .map(|stored| Json(stored.route))
        .ok_or(ApiError::RouteNotFound(route_id))
}

/// POST /v1/routes/:route_id/block
async fn block_waypoint(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<Uuid>,
    Json(request): Json<BlockRequest>,
) -> Result<Json<RerouteOutcome>, ApiError> {
    planner::block_and_reroute(&state, route_id, request)
        .await
        .map(Json)
}

/// POST /v1/routes/:route_id/progress
async fn report_progress(
    State(state): State<Arc<AppState>>,
    Path(route_id): Path<Uuid>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<Route>, ApiError> {
    planner::advance(&state, route_id, request).map(Json)
}

/// POST /v1/reroute
async fn reroute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PayloadRerouteRequest>,
) -> Result<Json<RerouteOutcome>, ApiError> {
    planner::reroute_payload(&state, request).await.map(Json)
}

/// POST /v1/optimize
async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<Optimization>, ApiError> {
    planner::optimize_candidates(&state, request).await.map(Json)
}

async fn get_airport(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Airport>, ApiError> {
    Ok(Json(state.catalog().airport(&code)?))
}

async fn get_aircraft(
    State(state): State<Arc<AppState>>,
    Path(model): Path<String>,
) -> Result<Json<AircraftProfile>, ApiError> {
    Ok(Json(state.catalog().aircraft(&model)?))
}
