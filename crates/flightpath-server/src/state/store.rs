//! In-memory route store using DashMap.

use dashmap::DashMap;
use flightpath_core::{AircraftProfile, Route, WaypointStatus};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A planned or rerouted route with what is needed to reroute it again.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRoute {
    pub route: Route,
    /// Candidates generated for the original plan.
    pub alternatives: Vec<Route>,
    pub aircraft: AircraftProfile,
    /// Id of the first route in this flight's lineage.
    pub lineage: Uuid,
    /// Set once a reroute has replaced this route.
    pub superseded_by: Option<Uuid>,
}

/// One waypoint whose status changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub waypoint_id: Uuid,
    pub sequence: u32,
    pub status: WaypointStatus,
}

#[derive(Default)]
pub struct RouteStore {
    routes: DashMap<Uuid, StoredRoute>,
    reroute_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, stored: StoredRoute) {
        self.routes.insert(stored.route.id, stored);
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredRoute> {
        self.routes.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Lock serializing reroutes of one route.
    pub fn reroute_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.reroute_locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the lock for `id` once no request holds a handle to it.
    pub fn release_lock(&self, id: &Uuid) {
        self.reroute_locks
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Record `successor` and point the replaced route at it.
    pub fn supersede(&self, previous: &Uuid, successor: StoredRoute) {
        let successor_id = successor.route.id;
        if let Some(mut entry) = self.routes.get_mut(previous) {
            entry.superseded_by = Some(successor_id);
        }
        self.insert(successor);
        self.reroute_locks.remove(previous);
    }

    /// Apply a status change to one waypoint. Returns `None` when the route
    /// or waypoint is unknown, or the status was already set.
    pub fn set_status(&self, route_id: &Uuid, waypoint_id: &Uuid, status: WaypointStatus) -> Option<StatusChange> {
        let mut entry = self.routes.get_mut(route_id)?;
        let wp = entry
            .route
            .waypoints
            .iter_mut()
            .find(|wp| wp.id == *waypoint_id)?;
        if wp.status == status {
            return None;
        }
        wp.status = status;
        Some(StatusChange {
            waypoint_id: wp.id,
            sequence: wp.sequence,
            status,
        })
    }

    /// Mark `waypoint_id` active and everything before it passed.
    pub fn advance(&self, route_id: &Uuid, waypoint_id: &Uuid) -> Option<Vec<StatusChange>> {
        let mut entry = self.routes.get_mut(route_id)?;
        let target = entry.route.waypoint_index(*waypoint_id)?;
        let mut changes = Vec::new();
        for (idx, wp) in entry.route.waypoints.iter_mut().enumerate() {
            let next = match idx.cmp(&target) {
                std::cmp::Ordering::Less => WaypointStatus::Passed,
                std::cmp::Ordering::Equal => WaypointStatus::Active,
                std::cmp::Ordering::Greater => continue,
            };
            if wp.status != next {
                wp.status = next;
                changes.push(StatusChange {
                    waypoint_id: wp.id,
                    sequence: wp.sequence,
                    status: next,
                });
            }
        }
        Some(changes)
    }
}
