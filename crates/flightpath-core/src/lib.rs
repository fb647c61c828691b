pub mod atmosphere;
pub mod error;
pub mod fitness;
pub mod generator;
pub mod geo;
pub mod models;
pub mod optimizer;
pub mod reference;
pub mod reroute;

pub use atmosphere::{
    attach_route_snapshots, attach_snapshots, fetch_or_default, AtmosphereError,
    AtmosphereProvider, AtmosphericSnapshot, FixedAtmosphere, SnapshotKey,
};
pub use error::{LookupError, OptimizeError, PlanError, RerouteError};
pub use fitness::{FitnessBreakdown, FitnessConfig, FitnessEvaluator, HazardCounts};
pub use generator::{GenerationRequest, GeneratorConfig, RouteGenerator};
pub use models::{
    AircraftProfile, Airport, Coordinate, ExcludedRegion, OptimizationMethod, PathStyle, PathType,
    RerouteRecord, Route, Waypoint, WaypointStatus,
};
pub use optimizer::{
    optimize, AntColony, AntColonyConfig, Genetic, GeneticConfig, Optimization, Optimizer,
    OptimizerKind, OptimizerSettings, PheromoneTable, RouteOptimizer,
};
pub use reference::{Catalog, CatalogFile, ReferenceData};
pub use reroute::{
    RerouteConfig, RerouteOutcome, RerouteRequest, RerouteSummary, Rerouter, SplicePlan,
};
