//! ==============================================================================
//! presenter.rs - turning reconciled state into something an operator sees
//! ==============================================================================
//!
//! purpose:
//!     the controller does not render. it hands reconciled snapshots, change
//!     flags and map commands to a `Presenter`.
//!
//!     `DashboardPresenter` is the presenter the binary uses: it keeps the
//!     rendered text, the waypoint table and the map state in shared memory
//!     for the web dashboard (server.rs) to read.
//!
//! relationships:
//!     - used by: controller.rs (pushes updates), server.rs (reads state)
//!     - uses: reconcile.rs (formatting rules)
//!
//! ==============================================================================

use crate::domain::{BuoyMap, DataLimits, TelemetrySnapshot, Waypoint, UNKNOWN_STATE};
use crate::params::ParameterForm;
use crate::reconcile::{
    format_abs, format_coordinate, format_position, format_value, AveragedField, RollingAverages,
};
use crate::waypoints::{Affordances, RouteState, WaypointPanel};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// keep this many recent map calls for the dashboard
const MAP_LOG_LEN: usize = 64;

/// calls into the embedded map
#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    UpdateBoatLocation(Waypoint),
    UpdateBoatHeading(f64),
    ClearWaypoints,
    AddWaypoint(Waypoint),
    ChangeWaypointColor(&'static str),
    FocusOnBoat,
    ClearBuoys,
    AddBuoy(Waypoint),
}

impl MapCommand {
    /// javascript call understood by the map page
    pub fn script(&self) -> String {
        match self {
            MapCommand::UpdateBoatLocation(p) => format!("map.update_boat_location({}, {})", p.lat(), p.lon()),
            MapCommand::UpdateBoatHeading(h) => format!("map.update_boat_heading({})", h),
            MapCommand::ClearWaypoints => "map.clear_waypoints()".to_string(),
            MapCommand::AddWaypoint(p) => format!("map.add_waypoint({}, {})", p.lat(), p.lon()),
            MapCommand::ChangeWaypointColor(c) => format!("map.change_color_waypoints('{}')", c),
            MapCommand::FocusOnBoat => "map.focus_map_on_boat()".to_string(),
            MapCommand::ClearBuoys => "map.clear_buoys()".to_string(),
            MapCommand::AddBuoy(p) => format!("map.add_buoy({}, {})", p.lat(), p.lon()),
        }
    }
}

/// map updates carried by a snapshot: location and heading, when reported
pub fn map_updates(snapshot: &TelemetrySnapshot) -> Vec<MapCommand> {
    let mut commands = Vec::with_capacity(2);
    if let Some(position) = snapshot.position {
        commands.push(MapCommand::UpdateBoatLocation(position));
    }
    if let Some(heading) = snapshot.heading {
        commands.push(MapCommand::UpdateBoatHeading(heading));
    }
    commands
}

pub trait Presenter {
    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot, averages: &RollingAverages, distance_to_next_wp: f64);

    /// `changed` is the length-only redraw flag
    fn on_waypoints(&mut self, panel: &WaypointPanel, changed: bool);

    fn on_map(&mut self, command: MapCommand);

    fn on_parameters(&mut self, _form: &ParameterForm) {}

    fn on_buoys(&mut self, _buoys: &BuoyMap) {}

    fn on_data_limits(&mut self, _limits: &DataLimits) {}
}

// ==============================================================================
// telemetry text
// ==============================================================================

fn format_route(route: Option<&[Waypoint]>) -> String {
    match route {
        Some(route) => {
            let points: Vec<String> = route.iter().map(|p| format!("[{}, {}]", p.lat(), p.lon())).collect();
            format!("[{}]", points.join(", "))
        }
        None => UNKNOWN_STATE.to_string(),
    }
}

/// the operator's telemetry text block
///
/// motor readings come from the rolling averages, except duty cycle and
/// uptime which are shown raw.
pub fn render_report(snapshot: &TelemetrySnapshot, averages: &RollingAverages, distance_to_next_wp: f64) -> String {
    let avg = |field| Some(averages.get(field));
    let index = snapshot
        .current_waypoint_index
        .map_or_else(|| UNKNOWN_STATE.to_string(), |i| i.to_string());
    let uptime_seconds = snapshot.vesc.uptime_ms.map(|ms| ms / 1000.0);

    format!(
        "Boat Info:\n\
         Position: {}\n\
         State: {}\n\
         Speed: {} knots\n\
         Distance To Next WP: {:.5} meters\n\
         Bearing: {}°\n\
         Heading: {}°\n\
         True Wind Speed: {} knots\n\
         True Wind Angle: {}°\n\
         Apparent Wind Speed: {} knots\n\
         Apparent Wind Angle: {}°\n\
         Sail Angle: {}°\n\
         Rudder Angle: {}°\n\
         Current Waypoint Index: {}\n\
         Current Route: {}\n\
         \n\
         VESC Data:\n\
         RPM: {}\n\
         Duty Cycle: {}%\n\
         Amp Hours: {} Ah\n\
         Amp Hours Charged: {} Ah\n\
         Current to VESC: {} A\n\
         Voltage to VESC: {} V\n\
         Wattage to Motor: {} W\n\
         Voltage to Motor: {} V\n\
         Time Since VESC Startup: {} seconds\n\
         Motor Temperature: {}°C\n",
        format_position(snapshot.position),
        snapshot.state.as_deref().unwrap_or(UNKNOWN_STATE),
        format_value(snapshot.speed),
        distance_to_next_wp,
        format_value(snapshot.bearing),
        format_value(snapshot.heading),
        format_value(snapshot.true_wind_speed),
        format_value(snapshot.true_wind_angle),
        format_value(snapshot.apparent_wind_speed),
        format_value(snapshot.apparent_wind_angle),
        format_value(snapshot.sail_angle),
        format_value(snapshot.rudder_angle),
        index,
        format_route(snapshot.current_route.as_deref()),
        format_abs(avg(AveragedField::Rpm)),
        format_abs(snapshot.vesc.duty_cycle),
        format_value(avg(AveragedField::AmpHours)),
        format_value(avg(AveragedField::AmpHoursCharged)),
        format_value(avg(AveragedField::CurrentToVesc)),
        format_value(avg(AveragedField::VoltageToVesc)),
        format_abs(avg(AveragedField::WattageToMotor)),
        format_value(avg(AveragedField::VoltageToMotor)),
        format_value(uptime_seconds),
        format_abs(avg(AveragedField::MotorTemperature)),
    )
}

// ==============================================================================
// dashboard presenter
// ==============================================================================

/// everything the web dashboard shows
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub report: String,
    pub snapshot: Option<TelemetrySnapshot>,
    pub averages: BTreeMap<&'static str, f64>,
    pub distance_to_next_waypoint: f64,
    pub boat_location: Option<Waypoint>,
    pub boat_heading: Option<f64>,
    /// waypoint table, `[lat, lon]` at 13 decimals
    pub waypoint_rows: Vec<[String; 2]>,
    pub route_state: RouteState,
    pub affordances: Affordances,
    pub parameters: ParameterForm,
    pub buoys: BuoyMap,
    /// buoy table, `[lat, lon]` at 13 decimals
    pub buoy_rows: Vec<[String; 2]>,
    pub data_limits: DataLimits,
    pub map_calls: VecDeque<String>,
    /// unix timestamp (ms) of last telemetry update
    pub last_update: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        let panel = WaypointPanel::new();
        Self {
            report: String::new(),
            snapshot: None,
            averages: RollingAverages::default().entries().collect(),
            distance_to_next_waypoint: 0.0,
            boat_location: None,
            boat_heading: None,
            waypoint_rows: Vec::new(),
            route_state: panel.state(),
            affordances: panel.affordances(),
            parameters: ParameterForm::default(),
            buoys: BuoyMap::new(),
            buoy_rows: Vec::new(),
            data_limits: DataLimits::new(),
            map_calls: VecDeque::new(),
            last_update: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct DashboardPresenter {
    state: Arc<RwLock<DashboardState>>,
}

impl DashboardPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// read access for the web server
    pub fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut DashboardState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl Presenter for DashboardPresenter {
    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot, averages: &RollingAverages, distance_to_next_wp: f64) {
        let report = render_report(snapshot, averages, distance_to_next_wp);
        let updates = map_updates(snapshot);
        self.update(|state| {
            state.report = report;
            state.snapshot = Some(snapshot.clone());
            state.averages = averages.entries().collect();
            state.distance_to_next_waypoint = distance_to_next_wp;
            state.last_update = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default();
        });
        for command in updates {
            self.on_map(command);
        }
    }

    fn on_waypoints(&mut self, panel: &WaypointPanel, changed: bool) {
        self.update(|state| {
            state.route_state = panel.state();
            state.affordances = panel.affordances();
            if changed {
                state.waypoint_rows = panel
                    .waypoints()
                    .iter()
                    .map(|p| [format_coordinate(p.lat()), format_coordinate(p.lon())])
                    .collect();
            }
        });
    }

    fn on_map(&mut self, command: MapCommand) {
        self.update(|state| {
            match command {
                MapCommand::UpdateBoatLocation(p) => state.boat_location = Some(p),
                MapCommand::UpdateBoatHeading(h) => state.boat_heading = Some(h),
                _ => {}
            }
            if state.map_calls.len() == MAP_LOG_LEN {
                state.map_calls.pop_front();
            }
            state.map_calls.push_back(command.script());
        });
    }

    fn on_parameters(&mut self, form: &ParameterForm) {
        let form = form.clone();
        self.update(|state| state.parameters = form);
    }

    fn on_buoys(&mut self, buoys: &BuoyMap) {
        let rows = buoys
            .values()
            .map(|b| [format_coordinate(b.lat), format_coordinate(b.lon)])
            .collect();
        let buoys = buoys.clone();
        self.update(|state| {
            state.buoys = buoys;
            state.buoy_rows = rows;
        });
    }

    fn on_data_limits(&mut self, limits: &DataLimits) {
        let limits = limits.clone();
        self.update(|state| state.data_limits = limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Buoy, VescData};
    use crate::reconcile::reconcile_telemetry;

    #[test]
    fn report_uses_sentinels_and_abs() {
        let snapshot = TelemetrySnapshot {
            state: Some("sailing".to_string()),
            speed: Some(-1.25),
            vesc: VescData { duty_cycle: Some(-0.5), uptime_ms: Some(2500.0), ..VescData::default() },
            ..TelemetrySnapshot::default()
        };
        let report = render_report(&snapshot, &RollingAverages::default(), 0.0);

        assert!(report.contains("Position: -69.42000000, -69.42000000\n"));
        assert!(report.contains("State: sailing\n"));
        assert!(report.contains("Speed: -1.25000 knots\n"));
        assert!(report.contains("Heading: -69.42000°\n"));
        assert!(report.contains("Duty Cycle: 0.50000%\n"));
        assert!(report.contains("Time Since VESC Startup: 2.50000 seconds\n"));
        assert!(report.contains("Current Waypoint Index: N/A\n"));
        assert!(report.contains("Distance To Next WP: 0.00000 meters\n"));
    }

    #[test]
    fn report_shows_averaged_motor_values() {
        let snapshot = TelemetrySnapshot {
            vesc: VescData {
                rpm: Some(-100.0),
                wattage_to_motor: Some(-40.0),
                ..VescData::default()
            },
            ..TelemetrySnapshot::default()
        };
        let averages = reconcile_telemetry(&RollingAverages::default(), &snapshot);
        let report = render_report(&snapshot, &averages, 12.5);
        assert!(report.contains("RPM: 50.00000\n"));
        assert!(report.contains("Wattage to Motor: 20.00000 W\n"));
        assert!(report.contains("Distance To Next WP: 12.50000 meters\n"));
    }

    #[test]
    fn map_updates_only_for_reported_fields() {
        let none = TelemetrySnapshot::default();
        assert!(map_updates(&none).is_empty());

        let both = TelemetrySnapshot {
            position: Some(Waypoint(1.0, 2.0)),
            heading: Some(90.0),
            ..TelemetrySnapshot::default()
        };
        assert_eq!(
            map_updates(&both),
            vec![MapCommand::UpdateBoatLocation(Waypoint(1.0, 2.0)), MapCommand::UpdateBoatHeading(90.0)]
        );
        assert_eq!(map_updates(&both)[0].script(), "map.update_boat_location(1, 2)");
    }

    #[test]
    fn dashboard_rebuilds_table_only_on_change() {
        let mut presenter = DashboardPresenter::new();
        let mut panel = WaypointPanel::new();

        let changed = panel.apply(vec![Waypoint(1.0, 2.0)]);
        presenter.on_waypoints(&panel, changed);
        assert_eq!(
            presenter.read().waypoint_rows,
            vec![["1.0000000000000".to_string(), "2.0000000000000".to_string()]]
        );

        let changed = panel.apply(vec![Waypoint(5.0, 6.0)]);
        presenter.on_waypoints(&panel, changed);
        assert_eq!(presenter.read().waypoint_rows[0][0], "1.0000000000000");
        assert_eq!(presenter.read().route_state, RouteState::Populated);
    }

    #[test]
    fn integer_heading_still_turns_the_boat() {
        let snapshot = TelemetrySnapshot::from_json(&serde_json::json!({"heading": 90})).unwrap();
        assert_eq!(map_updates(&snapshot), vec![MapCommand::UpdateBoatHeading(90.0)]);
        assert_eq!(map_updates(&snapshot)[0].script(), "map.update_boat_heading(90)");
    }

    #[test]
    fn buoy_table_and_map_calls() {
        let mut presenter = DashboardPresenter::new();
        let mut buoys = BuoyMap::new();
        buoys.insert("start".to_string(), Buoy { lat: 36.5, lon: -76.25 });
        presenter.on_buoys(&buoys);

        let state = presenter.read();
        assert_eq!(state.buoy_rows, vec![["36.5000000000000".to_string(), "-76.2500000000000".to_string()]]);
        assert_eq!(state.buoys, buoys);
        assert_eq!(MapCommand::AddBuoy(Waypoint(36.5, -76.25)).script(), "map.add_buoy(36.5, -76.25)");
        assert_eq!(MapCommand::ClearBuoys.script(), "map.clear_buoys()");
    }

    #[test]
    fn telemetry_updates_boat_marker() {
        let mut presenter = DashboardPresenter::new();
        let snapshot = TelemetrySnapshot::fallback();
        presenter.on_telemetry(&snapshot, &RollingAverages::default(), 0.0);

        let state = presenter.read();
        assert_eq!(state.boat_location, snapshot.position);
        assert_eq!(state.boat_heading, Some(0.0));
        assert_eq!(state.map_calls.len(), 2);
        assert!(state.report.starts_with("Boat Info:\n"));
    }
}
