//! Flightpath CLI - command line clients for the route planning server.
//!
//! Binaries:
//! - plan_route: request a plan and print the chosen route
//! - block_waypoint: report a blocked waypoint and print the reroute
//! - watch_route: stream live updates for a route

pub mod client;

pub use client::{parse_exclusion, PlanParams, PlanSummary, PlannerClient, RouteStream};
