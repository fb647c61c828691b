//! Shared library surface for the route planning server and its tests.

pub mod api;
pub mod backoff;
pub mod cache;
pub mod config;
pub mod error;
pub mod loops;
pub mod planner;
pub mod state;
pub mod weather;
