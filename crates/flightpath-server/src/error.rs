//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flightpath_core::{LookupError, OptimizeError, PlanError, RerouteError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("route {0} not found")]
    RouteNotFound(Uuid),
    #[error("no feasible route: {0}")]
    Infeasible(String),
    #[error(transparent)]
    Reroute(RerouteError),
    /// Another reroute holds the route, or the route was already replaced.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Lookup(_) | ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Reroute(RerouteError::Exhausted { .. }) | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Reroute(RerouteError::UnknownWaypoint(_)) => StatusCode::NOT_FOUND,
            ApiError::Reroute(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Lookup(LookupError::UnknownAirport(_)) => "unknown_airport",
            ApiError::Lookup(LookupError::UnknownAircraft(_)) => "unknown_aircraft",
            ApiError::RouteNotFound(_) => "route_not_found",
            ApiError::Infeasible(_) => "infeasible",
            ApiError::Reroute(RerouteError::Exhausted { .. }) => "no_further_detours",
            ApiError::Reroute(RerouteError::UnknownWaypoint(_)) => "unknown_waypoint",
            ApiError::Reroute(RerouteError::BlockedAtOrigin) => "blocked_at_origin",
            ApiError::Reroute(RerouteError::AlreadyPassed(_)) => "waypoint_passed",
            ApiError::Reroute(RerouteError::EmptyRoute) => "empty_route",
            ApiError::Conflict(_) => "reroute_conflict",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Lookup(err) => ApiError::Lookup(err),
            PlanError::Infeasible(reason) => ApiError::Infeasible(reason),
            PlanError::Optimize(err) => err.into(),
        }
    }
}

impl From<OptimizeError> for ApiError {
    fn from(err: OptimizeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RerouteError> for ApiError {
    fn from(err: RerouteError) -> Self {
        ApiError::Reroute(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}
