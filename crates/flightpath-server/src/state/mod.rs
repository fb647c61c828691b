//! Shared application state.

pub mod store;

pub use store::{RouteStore, StatusChange, StoredRoute};

use crate::cache::SnapshotCache;
use crate::config::Config;
use crate::weather::WeatherSource;
use flightpath_core::{
    Catalog, FitnessEvaluator, OptimizerSettings, RerouteSummary, Rerouter, Route, RouteGenerator,
    WaypointStatus,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Live update pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteMessage {
    RouteUpdate {
        route_id: Uuid,
        previous_route_id: Option<Uuid>,
        route: Route,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<RerouteSummary>,
    },
    WaypointStatus {
        route_id: Uuid,
        waypoint_id: Uuid,
        sequence: u32,
        status: WaypointStatus,
    },
}

/// Broadcast envelope: the serialized message plus the ids used to filter it.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    pub lineage: Uuid,
    pub route_id: Uuid,
    pub previous_route_id: Option<Uuid>,
    pub payload: Arc<str>,
}

impl RouteEvent {
    /// Subscribers may follow a concrete route, its predecessor, or the
    /// whole lineage.
    pub fn concerns(&self, id: &Uuid) -> bool {
        self.lineage == *id || self.route_id == *id || self.previous_route_id == Some(*id)
    }
}

pub struct AppState {
    config: Config,
    catalog: Catalog,
    evaluator: FitnessEvaluator,
    generator: RouteGenerator,
    rerouter: Rerouter,
    optimizer_settings: OptimizerSettings,
    pub cache: Arc<SnapshotCache<WeatherSource>>,
    pub routes: RouteStore,
    pub tx: broadcast::Sender<RouteEvent>,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        let cache = SnapshotCache::new(
            WeatherSource::from_config(&config),
            config.weather_cache_ttl(),
            config.weather_timeout(),
        );
        Self::with_weather(config, catalog, cache)
    }

    pub fn with_weather(config: Config, catalog: Catalog, cache: SnapshotCache<WeatherSource>) -> Self {
        let evaluator = FitnessEvaluator::default();
        let mut optimizer_settings = OptimizerSettings::default();
        if let Some(ants) = config.aco_ants {
            optimizer_settings.ant_colony.ants = ants;
        }
        if let Some(iterations) = config.aco_iterations {
            optimizer_settings.ant_colony.iterations = iterations;
        }
        if let Some(generations) = config.ga_generations {
            optimizer_settings.genetic.generations = generations;
        }
        if let Some(population) = config.ga_population {
            optimizer_settings.genetic.population = population;
        }
        optimizer_settings.ant_colony.seed = config.optimizer_seed;
        optimizer_settings.genetic.seed = config.optimizer_seed;

        let (tx, _rx) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            rerouter: Rerouter::new(evaluator.clone(), Default::default()),
            evaluator,
            generator: RouteGenerator::default(),
            optimizer_settings,
            catalog,
            cache: Arc::new(cache),
            routes: RouteStore::new(),
            tx,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    pub fn generator(&self) -> &RouteGenerator {
        &self.generator
    }

    pub fn rerouter(&self) -> &Rerouter {
        &self.rerouter
    }

    pub fn optimizer_settings(&self) -> &OptimizerSettings {
        &self.optimizer_settings
    }

    /// Serialize and broadcast; having no subscribers is not an error.
    pub fn publish(&self, lineage: Uuid, message: RouteMessage) {
        let (route_id, previous_route_id) = match &message {
            RouteMessage::RouteUpdate {
                route_id,
                previous_route_id,
                ..
            } => (*route_id, *previous_route_id),
            RouteMessage::WaypointStatus { route_id, .. } => (*route_id, None),
        };
        match serde_json::to_string(&message) {
            Ok(json) => {
                let _ = self.tx.send(RouteEvent {
                    lineage,
                    route_id,
                    previous_route_id,
                    payload: Arc::from(json),
                });
            }
            Err(err) => tracing::warn!("Failed to serialize route event: {}", err),
        }
    }

    pub fn publish_status(&self, lineage: Uuid, route_id: Uuid, changes: &[StatusChange]) {
        for change in changes {
            self.publish(
                lineage,
                RouteMessage::WaypointStatus {
                    route_id,
                    waypoint_id: change.waypoint_id,
                    sequence: change.sequence,
                    status: change.status,
                },
            );
        }
    }
}
