//! HTTP and WebSocket client for the route planning server.

use anyhow::{Context, Result};
use flightpath_core::{
    Coordinate, ExcludedRegion, OptimizerKind, PathStyle, RerouteOutcome, Route,
};
use futures::StreamExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

/// Body of `POST /v1/routes/plan`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanParams {
    pub origin: String,
    pub destination: String,
    pub aircraft: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<OptimizerKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<PathStyle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<ExcludedRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanSummary {
    pub best: Route,
    pub candidates: Vec<Route>,
    pub method: OptimizerKind,
    pub degraded_data: bool,
    #[serde(default)]
    pub rounds: usize,
    #[serde(default)]
    pub evaluations: usize,
}

#[derive(Debug, Serialize)]
struct BlockParams {
    blocked_waypoint_id: Uuid,
    current_position: Coordinate,
    fuel_aware: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: String,
}

/// Client for the planning server.
pub struct PlannerClient {
    base_url: String,
    client: reqwest::Client,
}

/// Live update stream for one route lineage.
pub struct RouteStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PlannerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn plan(&self, params: &PlanParams) -> Result<PlanSummary> {
        let url = format!("{}/v1/routes/plan", self.base_url);
        let response = self.client.post(&url).json(params).send().await?;
        read_response(response).await
    }

    pub async fn route(&self, route_id: Uuid) -> Result<Route> {
        let url = format!("{}/v1/routes/{}", self.base_url, route_id);
        let response = self.client.get(&url).send().await?;
        read_response(response).await
    }

    /// Report a blocked waypoint and receive the reroute.
    pub async fn block(
        &self,
        route_id: Uuid,
        waypoint_id: Uuid,
        position: Coordinate,
        fuel_aware: bool,
    ) -> Result<RerouteOutcome> {
        let url = format!("{}/v1/routes/{}/block", self.base_url, route_id);
        let response = self
            .client
            .post(&url)
            .json(&BlockParams {
                blocked_waypoint_id: waypoint_id,
                current_position: position,
                fuel_aware,
            })
            .send()
            .await?;
        read_response(response).await
    }

    /// Connect to the update stream filtered to `route_id`.
    pub async fn watch(&self, route_id: Uuid) -> Result<RouteStream> {
        let url = build_ws_url(&self.base_url, route_id)?;
        let (socket, _) = connect_async(url.as_str()).await?;
        Ok(RouteStream { socket })
    }
}

impl RouteStream {
    /// Read the next update (returns None on close).
    pub async fn next_update(&mut self) -> Result<Option<Value>> {
        while let Some(msg) = self.socket.next().await {
            match msg? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

async fn read_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => anyhow::bail!("{} ({}): {}", status, err.code, err.error),
        Err(_) => anyhow::bail!("{}: {}", status, body),
    }
}

fn build_ws_url(base: &str, route_id: Uuid) -> Result<Url> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => other,
    }
    .to_string();

    url.set_scheme(&scheme)
        .map_err(|_| anyhow::anyhow!("Invalid base URL scheme"))?;
    url.set_path("/v1/ws");
    url.query_pairs_mut()
        .append_pair("route_id", &route_id.to_string());
    Ok(url)
}

/// Parse `lat,lon,radius_km`.
pub fn parse_exclusion(value: &str) -> Result<ExcludedRegion> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid exclusion '{}'", value))?;
    let [lat, lon, radius_km] = parts[..] else {
        anyhow::bail!("exclusion '{}' must be lat,lon,radius_km", value);
    };
    Ok(ExcludedRegion {
        center: Coordinate::new(lat, lon),
        radius_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_scheme_and_filters() {
        let id = Uuid::new_v4();
        let url = build_ws_url("http://localhost:3000", id).unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/v1/ws");
        assert_eq!(url.query(), Some(format!("route_id={}", id).as_str()));

        let secure = build_ws_url("https://planner.example", id).unwrap();
        assert_eq!(secure.scheme(), "wss");
    }

    #[test]
    fn parses_exclusion_triplet() {
        let region = parse_exclusion("21.5, 75.0, 120").unwrap();
        assert_eq!(region.center, Coordinate::new(21.5, 75.0));
        assert_eq!(region.radius_km, 120.0);

        assert!(parse_exclusion("21.5,75.0").is_err());
        assert!(parse_exclusion("a,b,c").is_err());
    }

    #[test]
    fn plan_params_omit_unset_fields() {
        let params = PlanParams {
            origin: "DEL".to_string(),
            destination: "BOM".to_string(),
            aircraft: "A320".to_string(),
            method: Some(OptimizerKind::Genetic),
            styles: Vec::new(),
            exclusions: Vec::new(),
            seed: None,
        };
        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(body["method"], "genetic");
        assert!(body.get("styles").is_none());
        assert!(body.get("seed").is_none());
    }
}
