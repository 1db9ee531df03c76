//! ==============================================================================
//! server.rs - operator dashboard and local waypoint relay
//! ==============================================================================
//!
//! purpose:
//!     two small axum apps:
//!
//!     dashboard (default port 3000)
//!         GET  /                 telemetry text as html
//!         GET  /api              full dashboard state as json
//!         GET  /api/telemetry    last snapshot with fallbacks filled in
//!         POST /api/command      ?action=send_waypoints|test_waypoints|...
//!         POST /api/parameter    ?name=<param>&action=edit|send|reset[&value=..]
//!         POST /api/buoys        raw json text of the buoy editor
//!         POST /api/data_limits  raw json text of the data limits editor
//!
//!     waypoint relay (default port 3001)
//!         GET  /waypoints        current list of [lat, lon]
//!         POST /waypoints        {"waypoints": [[lat, lon], ...]} replaces it
//!
//!     handlers never do work themselves: operator actions are queued on the
//!     controller channel and answered immediately.
//!
//! relationships:
//!     - reads: presenter.rs (DashboardPresenter shared state)
//!     - writes: controller.rs (Event::Command)
//!     - polled by: client.rs (fetch_waypoints hits the relay)
//!
//! ==============================================================================

use crate::client::WaypointTarget;
use crate::controller::{Command, Event};
use crate::domain::WaypointList;
use crate::params::AutopilotParameter;
use crate::presenter::{DashboardPresenter, DashboardState};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tower_http::cors::CorsLayer;

// ==============================================================================
// waypoint relay
// ==============================================================================

/// the list the browser map last posted
#[derive(Clone, Default)]
pub struct WaypointRelay {
    inner: Arc<RwLock<WaypointList>>,
}

impl WaypointRelay {
    pub fn list(&self) -> WaypointList {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, list: WaypointList) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = list;
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }
}

pub fn relay_router(relay: WaypointRelay) -> Router {
    Router::new()
        .route("/waypoints", get(relay_get_handler).post(relay_post_handler))
        .layer(CorsLayer::permissive())
        .with_state(relay)
}

async fn relay_get_handler(State(relay): State<WaypointRelay>) -> Json<WaypointList> {
    Json(relay.list())
}

async fn relay_post_handler(
    State(relay): State<WaypointRelay>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let parsed = body
        .get("waypoints")
        .cloned()
        .and_then(|w| serde_json::from_value::<WaypointList>(w).ok());
    match parsed {
        Some(list) => {
            relay.replace(list);
            (StatusCode::OK, Json(json!({"message": "Waypoints updated successfully"})))
        }
        None => (StatusCode::BAD_REQUEST, Json(json!({"message": "Invalid waypoints data"}))),
    }
}

// ==============================================================================
// dashboard
// ==============================================================================

type DashboardCtx = (DashboardPresenter, UnboundedSender<Event>);

pub fn dashboard_router(dashboard: DashboardPresenter, commands: UnboundedSender<Event>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/telemetry", get(telemetry_handler))
        .route("/api/command", post(command_handler))
        .route("/api/parameter", post(parameter_handler))
        .route("/api/buoys", post(buoys_handler))
        .route("/api/data_limits", post(data_limits_handler))
        .layer(CorsLayer::permissive())
        .with_state((dashboard, commands))
}

pub async fn serve(bind: &str, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn dashboard_handler(State((dashboard, _)): State<DashboardCtx>) -> Html<String> {
    let state = dashboard.read();
    let body = if state.report.is_empty() {
        "waiting for telemetry...".to_string()
    } else {
        html_escape(&state.report)
    };
    Html(format!(
        r#"<!doctype html>
<html>
<head><title>ground station</title><meta http-equiv="refresh" content="1"></head>
<body style="font-family: monospace; padding: 2rem; background: #1a1a2e; color: #eee;">
    <pre>{}</pre>
</body>
</html>"#,
        body
    ))
}

async fn api_handler(State((dashboard, _)): State<DashboardCtx>) -> Json<DashboardState> {
    Json(dashboard.read().clone())
}

async fn telemetry_handler(State((dashboard, _)): State<DashboardCtx>) -> Json<Value> {
    let snapshot = dashboard.read().snapshot.clone().unwrap_or_default().with_fallbacks();
    Json(serde_json::to_value(snapshot).unwrap_or(Value::Null))
}

/// command params
#[derive(Deserialize)]
struct CommandParams {
    action: String,
    /// explicit file for the load_* actions
    path: Option<PathBuf>,
}

/// map a dashboard action name to a controller command
fn parse_command(action: &str, path: Option<PathBuf>) -> Option<Command> {
    let command = match action {
        "send_waypoints" => Command::SendWaypoints(WaypointTarget::Live),
        "test_waypoints" => Command::SendWaypoints(WaypointTarget::Test),
        "pull_waypoints" => Command::PullWaypoints,
        "clear_waypoints" => Command::ClearWaypoints,
        "zoom_to_boat" => Command::ZoomToBoat,
        "reset_parameters" => Command::ResetParameters,
        "send_parameters" => Command::SendParameters,
        "save_parameters" => Command::SaveParameters,
        "load_parameters" => Command::LoadParameters(path),
        "save_boat_data" => Command::SaveBoatData,
        "save_buoys" => Command::SaveBuoys,
        "load_buoys" => Command::LoadBuoys(path),
        "save_data_limits" => Command::SaveDataLimits,
        "load_data_limits" => Command::LoadDataLimits(path),
        _ => return None,
    };
    Some(command)
}

fn enqueue(commands: &UnboundedSender<Event>, command: Command) -> Json<Value> {
    match commands.send(Event::Command(command)) {
        Ok(()) => Json(json!({"status": "ok"})),
        Err(_) => Json(json!({"status": "error", "message": "controller stopped"})),
    }
}

/// POST /api/command?action=...
async fn command_handler(
    State((_, commands)): State<DashboardCtx>,
    Query(params): Query<CommandParams>,
) -> Json<Value> {
    match parse_command(&params.action, params.path) {
        Some(command) => enqueue(&commands, command),
        None => Json(json!({"status": "error", "message": "unknown action"})),
    }
}

/// parameter params
#[derive(Deserialize)]
struct ParameterParams {
    name: String,
    action: String,
    value: Option<String>,
}

/// POST /api/parameter?name=tack_distance&action=edit&value=12.5
async fn parameter_handler(
    State((_, commands)): State<DashboardCtx>,
    Query(params): Query<ParameterParams>,
) -> Json<Value> {
    let Ok(param) = params.name.parse::<AutopilotParameter>() else {
        return Json(json!({"status": "error", "message": "unknown parameter"}));
    };
    let command = match (params.action.as_str(), params.value) {
        ("edit", Some(value)) => Command::EditParameter(param, value),
        ("send", _) => Command::SendParameter(param),
        ("reset", _) => Command::ResetParameter(param),
        _ => return Json(json!({"status": "error", "message": "unknown action"})),
    };
    enqueue(&commands, command)
}

/// POST /api/buoys with the editor text as body; parsed by the controller
async fn buoys_handler(State((_, commands)): State<DashboardCtx>, body: String) -> Json<Value> {
    enqueue(&commands, Command::EditBuoys(body))
}

/// POST /api/data_limits
async fn data_limits_handler(State((_, commands)): State<DashboardCtx>, body: String) -> Json<Value> {
    enqueue(&commands, Command::EditDataLimits(body))
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Waypoint;
    use crate::testing::spawn_server;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn relay_round_trip() {
        let relay = WaypointRelay::default();
        let base = spawn_server(relay_router(relay.clone())).await;
        let http = reqwest::Client::new();

        let resp = http
            .post(format!("{}waypoints", base))
            .json(&json!({"waypoints": [[1.0, 2.0], [3.0, 4.0]]}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(relay.list(), vec![Waypoint(1.0, 2.0), Waypoint(3.0, 4.0)]);

        let listed: Value = http.get(format!("{}waypoints", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(listed, json!([[1.0, 2.0], [3.0, 4.0]]));
    }

    #[tokio::test]
    async fn relay_rejects_bad_body() {
        let relay = WaypointRelay::default();
        relay.replace(vec![Waypoint(1.0, 2.0)]);
        let base = spawn_server(relay_router(relay.clone())).await;

        let resp = reqwest::Client::new()
            .post(format!("{}waypoints", base))
            .json(&json!({"waypoints": "everywhere"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(relay.list(), vec![Waypoint(1.0, 2.0)]);
    }

    #[test]
    fn command_names() {
        assert!(matches!(
            parse_command("test_waypoints", None),
            Some(Command::SendWaypoints(WaypointTarget::Test))
        ));
        assert!(matches!(
            parse_command("load_parameters", Some(PathBuf::from("a.json"))),
            Some(Command::LoadParameters(Some(_)))
        ));
        assert!(matches!(
            parse_command("load_buoys", None),
            Some(Command::LoadBuoys(None))
        ));
        assert!(matches!(
            parse_command("load_data_limits", Some(PathBuf::from("limits.json"))),
            Some(Command::LoadDataLimits(Some(_)))
        ));
        assert!(matches!(parse_command("save_data_limits", None), Some(Command::SaveDataLimits)));
        assert!(parse_command("self_destruct", None).is_none());
    }

    #[tokio::test]
    async fn command_endpoint_enqueues() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let base = spawn_server(dashboard_router(DashboardPresenter::new(), tx)).await;
        let http = reqwest::Client::new();

        let ok: Value = http
            .post(format!("{}api/command?action=clear_waypoints", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ok["status"], "ok");
        assert!(matches!(rx.recv().await, Some(Event::Command(Command::ClearWaypoints))));

        let edit: Value = http
            .post(format!("{}api/parameter?name=tack_distance&action=edit&value=12.5", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(edit["status"], "ok");
        match rx.recv().await {
            Some(Event::Command(Command::EditParameter(param, value))) => {
                assert_eq!(param, AutopilotParameter::TackDistance);
                assert_eq!(value, "12.5");
            }
            other => panic!("unexpected {:?}", other),
        }

        let bad: Value = http
            .post(format!("{}api/parameter?name=rudder_gain&action=send", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(bad["status"], "error");
    }

    #[tokio::test]
    async fn editor_bodies_reach_the_controller() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let base = spawn_server(dashboard_router(DashboardPresenter::new(), tx)).await;
        let http = reqwest::Client::new();

        let text = r#"{"start": {"lat": 1.0, "lon": 2.0}}"#;
        let ok: Value = http
            .post(format!("{}api/buoys", base))
            .body(text)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ok["status"], "ok");
        match rx.recv().await {
            Some(Event::Command(Command::EditBuoys(body))) => assert_eq!(body, text),
            other => panic!("unexpected {:?}", other),
        }

        // not valid json, still forwarded as typed
        http.post(format!("{}api/data_limits", base)).body("{oops").send().await.unwrap();
        match rx.recv().await {
            Some(Event::Command(Command::EditDataLimits(body))) => assert_eq!(body, "{oops"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn telemetry_endpoint_fills_fallbacks() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let base = spawn_server(dashboard_router(DashboardPresenter::new(), tx)).await;
        let body: Value = reqwest::get(format!("{}api/telemetry", base)).await.unwrap().json().await.unwrap();
        assert_eq!(body["state"], "N/A");
        assert!(body.get("vesc_data_rpm").is_some());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<b>\"a&b\"</b>"), "&lt;b&gt;&quot;a&amp;b&quot;&lt;/b&gt;");
    }
}
