//! Error taxonomy for planning and rerouting.

use crate::models::PathStyle;
use thiserror::Error;
use uuid::Uuid;

/// Unknown reference-data code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown airport code '{0}'")]
    UnknownAirport(String),
    #[error("unknown aircraft model '{0}'")]
    UnknownAircraft(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// No candidate satisfies the exclusion or capacity constraints.
    #[error("no feasible route: {0}")]
    Infeasible(String),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    #[error("no candidate routes to optimize")]
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RerouteError {
    #[error("route has no waypoints")]
    EmptyRoute,
    #[error("waypoint {0} is not part of the route")]
    UnknownWaypoint(Uuid),
    #[error("cannot reroute around the origin waypoint")]
    BlockedAtOrigin,
    #[error("waypoint {0} has already been passed")]
    AlreadyPassed(Uuid),
    /// Every alternative style has already been used by this flight.
    #[error("no further detours available (used: {})", format_styles(.used))]
    Exhausted { used: Vec<PathStyle> },
}

fn format_styles(styles: &[PathStyle]) -> String {
    styles
        .iter()
        .map(|style| style.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
