//! ==============================================================================
//! client.rs - http client for the telemetry server and waypoint relay
//! ==============================================================================
//!
//! purpose:
//!     every request the ground station makes goes through here.
//!
//!     the two poll fetches (`fetch_boat_status`, `fetch_waypoints`) never
//!     fail: a dead network turns into a fallback snapshot or an empty list
//!     so the display always has something to show. operator actions
//!     (send/pull waypoints, parameters) return `GsResult` so the controller
//!     can log what went wrong.
//!
//! endpoints (relative to telemetry base url):
//!     boat_status/get              GET   telemetry snapshot
//!     waypoints/set                POST  {"value": [[lat, lon], ...]}
//!     waypoints/test               POST  {"value": [[lat, lon], ...]}
//!     autopilot_parameters/get     GET   {five parameters}
//!     autopilot_parameters/set     POST  {"value": {...}} (server merges)
//!
//!     the waypoint list itself is polled from a separate local url.
//!
//! ==============================================================================

use crate::config::{TelemetryConfig, WaypointsConfig};
use crate::domain::{AutopilotParameters, TelemetrySnapshot, Waypoint, WaypointList};
use crate::error::{GroundStationError, GsResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub boat_status: String,
    pub set_waypoints: String,
    pub test_waypoints: String,
    pub get_autopilot_parameters: String,
    pub set_autopilot_parameters: String,
    pub local_waypoints: String,
}

impl Endpoints {
    pub fn new(base_url: &str, local_waypoints: &str) -> Self {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Self {
            boat_status: format!("{}boat_status/get", base),
            set_waypoints: format!("{}waypoints/set", base),
            test_waypoints: format!("{}waypoints/test", base),
            get_autopilot_parameters: format!("{}autopilot_parameters/get", base),
            set_autopilot_parameters: format!("{}autopilot_parameters/set", base),
            local_waypoints: local_waypoints.to_string(),
        }
    }

    pub fn from_config(telemetry: &TelemetryConfig, waypoints: &WaypointsConfig) -> Self {
        Self::new(&telemetry.base_url, &waypoints.url)
    }
}

/// where `send_waypoints` posts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointTarget {
    Live,
    Test,
}

#[derive(Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl TelemetryClient {
    /// every request is bounded by `timeout`; a timeout counts as a transport error
    pub fn new(endpoints: Endpoints, timeout: Duration) -> GsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sailbot-groundstation/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, endpoints: Arc::new(endpoints) })
    }

    async fn get_json(&self, url: &str) -> GsResult<Value> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    async fn post_value<T: Serialize + ?Sized>(&self, url: &str, value: &T) -> GsResult<()> {
        self.http
            .post(url)
            .json(&json!({ "value": value }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    // ==========================================================================
    // poll fetches
    // ==========================================================================

    /// one telemetry poll; falls back instead of failing
    pub async fn fetch_boat_status(&self) -> TelemetrySnapshot {
        match self.get_json(&self.endpoints.boat_status).await {
            Ok(body) => match TelemetrySnapshot::from_json(&body) {
                Some(snapshot) => snapshot,
                None => {
                    log::warn!("[TELEMETRY] Malformed boat status. Using default values.");
                    TelemetrySnapshot::fallback()
                }
            },
            Err(e) => {
                log::warn!("[TELEMETRY] Failed to fetch boat data ({}). Using default values.", e);
                TelemetrySnapshot::fallback()
            }
        }
    }

    /// one waypoint poll; an empty list on any failure
    pub async fn fetch_waypoints(&self) -> WaypointList {
        let body = match self.get_json(&self.endpoints.local_waypoints).await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("[WAYPOINTS] Fetch failed: {}", e);
                return Vec::new();
            }
        };
        serde_json::from_value(body).unwrap_or_else(|e| {
            log::debug!("[WAYPOINTS] Malformed waypoint list: {}", e);
            Vec::new()
        })
    }

    // ==========================================================================
    // operator actions
    // ==========================================================================

    pub async fn send_waypoints(&self, waypoints: &[Waypoint], target: WaypointTarget) -> GsResult<()> {
        let url = match target {
            WaypointTarget::Live => &self.endpoints.set_waypoints,
            WaypointTarget::Test => &self.endpoints.test_waypoints,
        };
        self.post_value(url, waypoints).await
    }

    /// the route the boat is currently following
    pub async fn fetch_route(&self) -> GsResult<WaypointList> {
        let body = self.get_json(&self.endpoints.boat_status).await?;
        let snapshot =
            TelemetrySnapshot::from_json(&body).ok_or(GroundStationError::NoData("boat status"))?;
        Ok(snapshot.current_route.unwrap_or_default())
    }

    pub async fn fetch_autopilot_parameters(&self) -> GsResult<AutopilotParameters> {
        let body = self.get_json(&self.endpoints.get_autopilot_parameters).await?;
        if body.as_object().map_or(true, |obj| obj.is_empty()) {
            return Err(GroundStationError::NoData("autopilot parameters"));
        }
        Ok(serde_json::from_value(body)?)
    }

    pub async fn send_autopilot_parameters(&self, params: &AutopilotParameters) -> GsResult<()> {
        self.post_value(&self.endpoints.set_autopilot_parameters, params).await
    }

    /// partial update; the server merges it into its current parameters
    pub async fn send_autopilot_parameter_update(
        &self,
        update: &serde_json::Map<String, Value>,
    ) -> GsResult<()> {
        self.post_value(&self.endpoints.set_autopilot_parameters, update).await
    }
}
