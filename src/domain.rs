//! ==============================================================================
//! domain.rs - telemetry, waypoint and autopilot parameter records
//! ==============================================================================
//!
//! purpose:
//!     typed records for everything that crosses the wire.
//!
//!     the boat's telemetry server is loose about its payload: any field may be
//!     missing, null, or of the wrong type. `TelemetrySnapshot::from_json`
//!     reads each field on its own, so one bad field never hides the rest.
//!     every field has a documented fallback (see `TelemetrySnapshot::fallback`).
//!
//! ==============================================================================

use crate::error::{GroundStationError, GsResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// value shown in place of anything the boat did not report
pub const MISSING_VALUE: f64 = -69.42;

/// shown for the boat state when unknown
pub const UNKNOWN_STATE: &str = "N/A";

/// a `[lat, lon]` pair, the wire form of positions and waypoints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint(pub f64, pub f64);

impl Waypoint {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value.as_array()?.as_slice() {
            [lat, lon] => Some(Waypoint(lat.as_f64()?, lon.as_f64()?)),
            _ => None,
        }
    }
}

/// ordered route; order is traversal order, duplicates allowed
pub type WaypointList = Vec<Waypoint>;

/// motor controller readings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VescData {
    #[serde(rename = "vesc_data_rpm", skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    #[serde(rename = "vesc_data_duty_cycle", skip_serializing_if = "Option::is_none")]
    pub duty_cycle: Option<f64>,
    #[serde(rename = "vesc_data_amp_hours", skip_serializing_if = "Option::is_none")]
    pub amp_hours: Option<f64>,
    #[serde(rename = "vesc_data_amp_hours_charged", skip_serializing_if = "Option::is_none")]
    pub amp_hours_charged: Option<f64>,
    #[serde(rename = "vesc_data_current_to_vesc", skip_serializing_if = "Option::is_none")]
    pub current_to_vesc: Option<f64>,
    #[serde(rename = "vesc_data_voltage_to_motor", skip_serializing_if = "Option::is_none")]
    pub voltage_to_motor: Option<f64>,
    #[serde(rename = "vesc_data_voltage_to_vesc", skip_serializing_if = "Option::is_none")]
    pub voltage_to_vesc: Option<f64>,
    #[serde(rename = "vesc_data_wattage_to_motor", skip_serializing_if = "Option::is_none")]
    pub wattage_to_motor: Option<f64>,
    #[serde(
        rename = "vesc_data_time_since_vesc_startup_in_ms",
        skip_serializing_if = "Option::is_none"
    )]
    pub uptime_ms: Option<f64>,
    #[serde(rename = "vesc_data_motor_temperature", skip_serializing_if = "Option::is_none")]
    pub motor_temperature: Option<f64>,
}

impl VescData {
    fn from_json(obj: &serde_json::Map<String, Value>) -> Self {
        let num = |key: &str| obj.get(key).and_then(Value::as_f64);
        Self {
            rpm: num("vesc_data_rpm"),
            duty_cycle: num("vesc_data_duty_cycle"),
            amp_hours: num("vesc_data_amp_hours"),
            amp_hours_charged: num("vesc_data_amp_hours_charged"),
            current_to_vesc: num("vesc_data_current_to_vesc"),
            voltage_to_motor: num("vesc_data_voltage_to_motor"),
            voltage_to_vesc: num("vesc_data_voltage_to_vesc"),
            wattage_to_motor: num("vesc_data_wattage_to_motor"),
            uptime_ms: num("vesc_data_time_since_vesc_startup_in_ms"),
            motor_temperature: num("vesc_data_motor_temperature"),
        }
    }

    fn zeroed() -> Self {
        Self {
            rpm: Some(0.0),
            duty_cycle: Some(0.0),
            amp_hours: Some(0.0),
            amp_hours_charged: Some(0.0),
            current_to_vesc: Some(0.0),
            voltage_to_motor: Some(0.0),
            voltage_to_vesc: Some(0.0),
            wattage_to_motor: Some(0.0),
            uptime_ms: Some(0.0),
            motor_temperature: Some(0.0),
        }
    }

    fn or(self, other: Self) -> Self {
        Self {
            rpm: self.rpm.or(other.rpm),
            duty_cycle: self.duty_cycle.or(other.duty_cycle),
            amp_hours: self.amp_hours.or(other.amp_hours),
            amp_hours_charged: self.amp_hours_charged.or(other.amp_hours_charged),
            current_to_vesc: self.current_to_vesc.or(other.current_to_vesc),
            voltage_to_motor: self.voltage_to_motor.or(other.voltage_to_motor),
            voltage_to_vesc: self.voltage_to_vesc.or(other.voltage_to_vesc),
            wattage_to_motor: self.wattage_to_motor.or(other.wattage_to_motor),
            uptime_ms: self.uptime_ms.or(other.uptime_ms),
            motor_temperature: self.motor_temperature.or(other.motor_temperature),
        }
    }
}

/// one telemetry reading from `boat_status/get`
///
/// `None` means the boat did not report the field (or reported garbage).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Waypoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_autonomy_maneuver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_wind_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_wind_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sail_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rudder_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_waypoint_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_route: Option<WaypointList>,
    #[serde(flatten)]
    pub vesc: VescData,
}

impl TelemetrySnapshot {
    /// read a snapshot out of a decoded response body
    ///
    /// returns `None` when the body is not a json object at all.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let num = |key: &str| obj.get(key).and_then(Value::as_f64);
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        let current_route = obj.get("current_route").and_then(|route| {
            route
                .as_array()?
                .iter()
                .map(Waypoint::from_json)
                .collect::<Option<WaypointList>>()
        });

        Some(Self {
            position: obj.get("position").and_then(Waypoint::from_json),
            state: text("state"),
            full_autonomy_maneuver: text("full_autonomy_maneuver"),
            speed: num("speed"),
            bearing: num("bearing"),
            heading: num("heading"),
            true_wind_speed: num("true_wind_speed"),
            true_wind_angle: num("true_wind_angle"),
            apparent_wind_speed: num("apparent_wind_speed"),
            apparent_wind_angle: num("apparent_wind_angle"),
            sail_angle: num("sail_angle"),
            rudder_angle: num("rudder_angle"),
            current_waypoint_index: obj.get("current_waypoint_index").and_then(Value::as_i64),
            current_route,
            vesc: VescData::from_json(obj),
        })
    }

    /// the snapshot used whenever the telemetry server cannot be reached
    pub fn fallback() -> Self {
        Self {
            position: Some(Waypoint(36.983731367697374, -76.29555376681454)),
            state: Some(UNKNOWN_STATE.to_string()),
            full_autonomy_maneuver: Some(UNKNOWN_STATE.to_string()),
            speed: Some(0.0),
            bearing: Some(0.0),
            heading: Some(0.0),
            true_wind_speed: Some(0.0),
            true_wind_angle: Some(0.0),
            apparent_wind_speed: Some(0.0),
            apparent_wind_angle: Some(0.0),
            sail_angle: Some(0.0),
            rudder_angle: Some(0.0),
            current_waypoint_index: Some(0),
            current_route: Some(vec![Waypoint(0.0, 0.0)]),
            vesc: VescData::zeroed(),
        }
    }

    /// fill every missing field from `fallback()`
    pub fn with_fallbacks(self) -> Self {
        let fb = Self::fallback();
        Self {
            position: self.position.or(fb.position),
            state: self.state.or(fb.state),
            full_autonomy_maneuver: self.full_autonomy_maneuver.or(fb.full_autonomy_maneuver),
            speed: self.speed.or(fb.speed),
            bearing: self.bearing.or(fb.bearing),
            heading: self.heading.or(fb.heading),
            true_wind_speed: self.true_wind_speed.or(fb.true_wind_speed),
            true_wind_angle: self.true_wind_angle.or(fb.true_wind_angle),
            apparent_wind_speed: self.apparent_wind_speed.or(fb.apparent_wind_speed),
            apparent_wind_angle: self.apparent_wind_angle.or(fb.apparent_wind_angle),
            sail_angle: self.sail_angle.or(fb.sail_angle),
            rudder_angle: self.rudder_angle.or(fb.rudder_angle),
            current_waypoint_index: self.current_waypoint_index.or(fb.current_waypoint_index),
            current_route: self.current_route.or(fb.current_route),
            vesc: self.vesc.or(fb.vesc),
        }
    }

    /// true when the server answered `{}` (or nothing we could read)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// the five autopilot tuning values kept on the telemetry server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutopilotParameters {
    pub perform_forced_jibe_instead_of_tack: bool,
    pub waypoint_accuracy: f64,
    pub no_sail_zone_size: f64,
    pub autopilot_refresh_rate: f64,
    pub tack_distance: f64,
}

/// a course marker the boat rounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buoy {
    pub lat: f64,
    pub lon: f64,
}

impl Buoy {
    pub fn position(&self) -> Waypoint {
        Waypoint(self.lat, self.lon)
    }
}

/// buoys by name: `{"start": {"lat": .., "lon": ..}, ...}`
pub type BuoyMap = BTreeMap<String, Buoy>;

/// operator-edited upper/lower bounds for telemetry fields, kept as written
pub type DataLimits = serde_json::Map<String, Value>;

pub fn parse_buoys(text: &str) -> GsResult<BuoyMap> {
    Ok(serde_json::from_str(text)?)
}

pub fn parse_data_limits(text: &str) -> GsResult<DataLimits> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(limits) => Ok(limits),
        _ => Err(GroundStationError::InvalidInput { field: "boat_data_limits", text: text.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_payload_keeps_present_fields() {
        let snapshot = TelemetrySnapshot::from_json(&json!({
            "position": [36.98, -76.29],
            "speed": 3.5,
            "vesc_data_rpm": 100,
        }))
        .unwrap();

        assert_eq!(snapshot.position, Some(Waypoint(36.98, -76.29)));
        assert_eq!(snapshot.speed, Some(3.5));
        assert_eq!(snapshot.vesc.rpm, Some(100.0));
        assert_eq!(snapshot.heading, None);
        assert_eq!(snapshot.state, None);
    }

    #[test]
    fn wrong_types_become_missing() {
        let snapshot = TelemetrySnapshot::from_json(&json!({
            "position": null,
            "heading": "north",
            "current_waypoint_index": "N/A",
            "current_route": [[1.0, 2.0], [3.0]],
        }))
        .unwrap();

        assert_eq!(snapshot.position, None);
        assert_eq!(snapshot.heading, None);
        assert_eq!(snapshot.current_waypoint_index, None);
        assert_eq!(snapshot.current_route, None);
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(TelemetrySnapshot::from_json(&json!([1, 2, 3])).is_none());
        assert!(TelemetrySnapshot::from_json(&json!("oops")).is_none());
    }

    #[test]
    fn fallbacks_populate_every_field() {
        let payloads = [
            json!({}),
            json!({"position": null}),
            json!({"speed": 1.0, "vesc_data_rpm": 5.0}),
            json!({"state": "sailing", "current_route": [[1.0, 2.0]]}),
        ];

        for payload in payloads {
            let full = TelemetrySnapshot::from_json(&payload).unwrap().with_fallbacks();
            let encoded = serde_json::to_value(&full).unwrap();
            let obj = encoded.as_object().unwrap();
            for key in [
                "position",
                "state",
                "speed",
                "bearing",
                "heading",
                "true_wind_speed",
                "true_wind_angle",
                "apparent_wind_speed",
                "apparent_wind_angle",
                "sail_angle",
                "rudder_angle",
                "current_waypoint_index",
                "current_route",
                "vesc_data_rpm",
                "vesc_data_duty_cycle",
                "vesc_data_amp_hours",
                "vesc_data_current_to_vesc",
                "vesc_data_voltage_to_motor",
                "vesc_data_voltage_to_vesc",
                "vesc_data_wattage_to_motor",
                "vesc_data_time_since_vesc_startup_in_ms",
                "vesc_data_motor_temperature",
            ] {
                assert!(obj.contains_key(key), "missing {key} for {payload}");
            }
        }
    }

    #[test]
    fn reported_values_win_over_fallbacks() {
        let full = TelemetrySnapshot::from_json(&json!({"state": "sailing", "speed": 2.5}))
            .unwrap()
            .with_fallbacks();
        assert_eq!(full.state.as_deref(), Some("sailing"));
        assert_eq!(full.speed, Some(2.5));
        assert_eq!(full.heading, Some(0.0));
    }

    #[test]
    fn empty_object_is_empty() {
        assert!(TelemetrySnapshot::from_json(&json!({})).unwrap().is_empty());
        assert!(!TelemetrySnapshot::fallback().is_empty());
    }

    #[test]
    fn waypoints_use_pair_form() {
        let list: WaypointList = serde_json::from_value(json!([[1.0, 2.0], [3, 4]])).unwrap();
        assert_eq!(list, vec![Waypoint(1.0, 2.0), Waypoint(3.0, 4.0)]);
        assert_eq!(serde_json::to_value(&list).unwrap(), json!([[1.0, 2.0], [3.0, 4.0]]));
    }

    #[test]
    fn buoys_parse_by_name() {
        let buoys = parse_buoys(r#"{"start": {"lat": 36.5, "lon": -76.25}, "mark": {"lat": 1, "lon": 2}}"#).unwrap();
        assert_eq!(buoys["start"].position(), Waypoint(36.5, -76.25));
        assert_eq!(buoys["mark"], Buoy { lat: 1.0, lon: 2.0 });

        assert!(matches!(parse_buoys("{\"start\": [1, 2]}"), Err(GroundStationError::Json(_))));
        assert!(parse_buoys("not json").is_err());
    }

    #[test]
    fn data_limits_must_be_an_object() {
        let limits = parse_data_limits(r#"{"speed": {"lower": 0, "upper": 12}}"#).unwrap();
        assert_eq!(limits["speed"]["upper"], json!(12));

        assert!(matches!(
            parse_data_limits("[1, 2]"),
            Err(GroundStationError::InvalidInput { field: "boat_data_limits", .. })
        ));
    }
}
