//! Planning and rerouting integration tests.
//!
//! Run with: cargo test --test plan_test -- --ignored
//! Requires a running server (FP_WEATHER_OFFLINE=1 keeps it off the network).

use flightpath_core::{RerouteOutcome, Route};
use reqwest::Client;
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("FP_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

async fn plan(client: &Client, body: Value) -> reqwest::Response {
    client
        .post(format!("{}/v1/routes/plan", base_url()))
        .json(&body)
        .send()
        .await
        .unwrap()
}

/// A planned route is stored and can be fetched back.
#[tokio::test]
#[ignore]
async fn test_plan_and_fetch() {
    let client = Client::new();
    let resp = plan(
        &client,
        json!({"origin": "DEL", "destination": "BOM", "aircraft": "A320"}),
    )
    .await;
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    let best: Route = serde_json::from_value(body["best"].clone()).unwrap();
    assert_eq!(best.waypoints.first().map(|wp| wp.position), Some(best.origin.location));

    let fetched: Route = client
        .get(format!("{}/v1/routes/{}", base_url(), best.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.id, best.id);
}

/// Blocking a waypoint returns a spliced route and retires the old one.
#[tokio::test]
#[ignore]
async fn test_block_reroutes() {
    let client = Client::new();
    let body: Value = plan(
        &client,
        json!({"origin": "BLR", "destination": "CCU", "aircraft": "B737-800", "method": "genetic"}),
    )
    .await
    .json()
    .await
    .unwrap();
    let best: Route = serde_json::from_value(body["best"].clone()).unwrap();

    let resp = client
        .post(format!("{}/v1/routes/{}/block", base_url(), best.id))
        .json(&json!({
            "blocked_waypoint_id": best.waypoints[8].id,
            "current_position": best.waypoints[4].position,
            "fuel_aware": true
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let outcome: RerouteOutcome = resp.json().await.unwrap();
    assert_eq!(outcome.summary.previous_route_id, best.id);
    assert!(outcome.summary.weather_risk.is_some());

    let again = client
        .post(format!("{}/v1/routes/{}/block", base_url(), best.id))
        .json(&json!({
            "blocked_waypoint_id": best.waypoints[8].id,
            "current_position": best.waypoints[4].position
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);
}

/// Unknown codes are rejected before any generation work.
#[tokio::test]
#[ignore]
async fn test_unknown_aircraft() {
    let client = Client::new();
    let resp = plan(
        &client,
        json!({"origin": "DEL", "destination": "BOM", "aircraft": "CONCORDE"}),
    )
    .await;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unknown_aircraft");
}
