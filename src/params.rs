//! ==============================================================================
//! params.rs - autopilot parameter editing
//! ==============================================================================
//!
//! purpose:
//!     the operator edits parameters as text (plus one checkbox). nothing is
//!     sent or saved unless the text parses; a bad field aborts the whole
//!     operation and leaves the synced parameters untouched.
//!
//! ==============================================================================

use crate::domain::AutopilotParameters;
use crate::error::{GroundStationError, GsResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopilotParameter {
    PerformForcedJibeInsteadOfTack,
    WaypointAccuracy,
    NoSailZoneSize,
    AutopilotRefreshRate,
    TackDistance,
}

impl AutopilotParameter {
    pub const ALL: [AutopilotParameter; 5] = [
        AutopilotParameter::PerformForcedJibeInsteadOfTack,
        AutopilotParameter::WaypointAccuracy,
        AutopilotParameter::NoSailZoneSize,
        AutopilotParameter::AutopilotRefreshRate,
        AutopilotParameter::TackDistance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => "perform_forced_jibe_instead_of_tack",
            AutopilotParameter::WaypointAccuracy => "waypoint_accuracy",
            AutopilotParameter::NoSailZoneSize => "no_sail_zone_size",
            AutopilotParameter::AutopilotRefreshRate => "autopilot_refresh_rate",
            AutopilotParameter::TackDistance => "tack_distance",
        }
    }

    /// current value of this parameter as it goes on the wire
    pub fn value_of(self, params: &AutopilotParameters) -> Value {
        match self {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => {
                json!(params.perform_forced_jibe_instead_of_tack)
            }
            AutopilotParameter::WaypointAccuracy => json!(params.waypoint_accuracy),
            AutopilotParameter::NoSailZoneSize => json!(params.no_sail_zone_size),
            AutopilotParameter::AutopilotRefreshRate => json!(params.autopilot_refresh_rate),
            AutopilotParameter::TackDistance => json!(params.tack_distance),
        }
    }

    /// copy just this parameter from `source` into `target`
    pub fn copy(self, source: &AutopilotParameters, target: &mut AutopilotParameters) {
        match self {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => {
                target.perform_forced_jibe_instead_of_tack = source.perform_forced_jibe_instead_of_tack
            }
            AutopilotParameter::WaypointAccuracy => target.waypoint_accuracy = source.waypoint_accuracy,
            AutopilotParameter::NoSailZoneSize => target.no_sail_zone_size = source.no_sail_zone_size,
            AutopilotParameter::AutopilotRefreshRate => {
                target.autopilot_refresh_rate = source.autopilot_refresh_rate
            }
            AutopilotParameter::TackDistance => target.tack_distance = source.tack_distance,
        }
    }
}

impl FromStr for AutopilotParameter {
    type Err = GroundStationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| GroundStationError::UnknownParameter(s.to_string()))
    }
}

/// the operator's unsent edits
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterForm {
    pub perform_forced_jibe_instead_of_tack: bool,
    pub waypoint_accuracy: String,
    pub no_sail_zone_size: String,
    pub autopilot_refresh_rate: String,
    pub tack_distance: String,
}

fn parse_number(field: &'static str, text: &str) -> GsResult<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GroundStationError::InvalidInput { field, text: text.to_string() })
}

fn parse_flag(field: &'static str, text: &str) -> GsResult<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(GroundStationError::InvalidInput { field, text: text.to_string() }),
    }
}

impl ParameterForm {
    pub fn from_parameters(params: &AutopilotParameters) -> Self {
        Self {
            perform_forced_jibe_instead_of_tack: params.perform_forced_jibe_instead_of_tack,
            waypoint_accuracy: params.waypoint_accuracy.to_string(),
            no_sail_zone_size: params.no_sail_zone_size.to_string(),
            autopilot_refresh_rate: params.autopilot_refresh_rate.to_string(),
            tack_distance: params.tack_distance.to_string(),
        }
    }

    /// replace one field with new operator text
    ///
    /// the checkbox accepts true/false style words; numbers are kept as typed
    /// and only validated when used.
    pub fn edit(&mut self, param: AutopilotParameter, text: &str) -> GsResult<()> {
        match param {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => {
                self.perform_forced_jibe_instead_of_tack = parse_flag(param.name(), text)?
            }
            AutopilotParameter::WaypointAccuracy => self.waypoint_accuracy = text.to_string(),
            AutopilotParameter::NoSailZoneSize => self.no_sail_zone_size = text.to_string(),
            AutopilotParameter::AutopilotRefreshRate => self.autopilot_refresh_rate = text.to_string(),
            AutopilotParameter::TackDistance => self.tack_distance = text.to_string(),
        }
        Ok(())
    }

    /// put one field back to its synced value, leaving other edits alone
    pub fn reset(&mut self, param: AutopilotParameter, params: &AutopilotParameters) {
        let synced = Self::from_parameters(params);
        match param {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => {
                self.perform_forced_jibe_instead_of_tack = synced.perform_forced_jibe_instead_of_tack
            }
            AutopilotParameter::WaypointAccuracy => self.waypoint_accuracy = synced.waypoint_accuracy,
            AutopilotParameter::NoSailZoneSize => self.no_sail_zone_size = synced.no_sail_zone_size,
            AutopilotParameter::AutopilotRefreshRate => {
                self.autopilot_refresh_rate = synced.autopilot_refresh_rate
            }
            AutopilotParameter::TackDistance => self.tack_distance = synced.tack_distance,
        }
    }

    pub fn parse(&self) -> GsResult<AutopilotParameters> {
        Ok(AutopilotParameters {
            perform_forced_jibe_instead_of_tack: self.perform_forced_jibe_instead_of_tack,
            waypoint_accuracy: parse_number("waypoint_accuracy", &self.waypoint_accuracy)?,
            no_sail_zone_size: parse_number("no_sail_zone_size", &self.no_sail_zone_size)?,
            autopilot_refresh_rate: parse_number("autopilot_refresh_rate", &self.autopilot_refresh_rate)?,
            tack_distance: parse_number("tack_distance", &self.tack_distance)?,
        })
    }

    /// validate one field, producing the `{name: value}` body for a partial update
    pub fn parse_one(&self, param: AutopilotParameter) -> GsResult<serde_json::Map<String, Value>> {
        let value = match param {
            AutopilotParameter::PerformForcedJibeInsteadOfTack => {
                json!(self.perform_forced_jibe_instead_of_tack)
            }
            AutopilotParameter::WaypointAccuracy => {
                json!(parse_number(param.name(), &self.waypoint_accuracy)?)
            }
            AutopilotParameter::NoSailZoneSize => {
                json!(parse_number(param.name(), &self.no_sail_zone_size)?)
            }
            AutopilotParameter::AutopilotRefreshRate => {
                json!(parse_number(param.name(), &self.autopilot_refresh_rate)?)
            }
            AutopilotParameter::TackDistance => json!(parse_number(param.name(), &self.tack_distance)?),
        };
        let mut update = serde_json::Map::new();
        update.insert(param.name().to_string(), value);
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AutopilotParameters {
        AutopilotParameters {
            perform_forced_jibe_instead_of_tack: false,
            waypoint_accuracy: 5.0,
            no_sail_zone_size: 45.0,
            autopilot_refresh_rate: 10.0,
            tack_distance: 15.5,
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for param in AutopilotParameter::ALL {
            assert_eq!(param.name().parse::<AutopilotParameter>().unwrap(), param);
        }
        assert!(matches!(
            "rudder_gain".parse::<AutopilotParameter>(),
            Err(GroundStationError::UnknownParameter(_))
        ));
    }

    #[test]
    fn form_parses_back_to_parameters() {
        let form = ParameterForm::from_parameters(&sample());
        assert_eq!(form.parse().unwrap(), sample());
    }

    #[test]
    fn non_numeric_text_aborts() {
        let mut form = ParameterForm::from_parameters(&sample());
        form.edit(AutopilotParameter::TackDistance, "far").unwrap();
        match form.parse() {
            Err(GroundStationError::InvalidInput { field, text }) => {
                assert_eq!(field, "tack_distance");
                assert_eq!(text, "far");
            }
            other => panic!("expected invalid input, got {:?}", other),
        }
        // other fields still validate on their own
        assert!(form.parse_one(AutopilotParameter::WaypointAccuracy).is_ok());
        assert!(form.parse_one(AutopilotParameter::TackDistance).is_err());
    }

    #[test]
    fn single_parameter_update_body() {
        let mut form = ParameterForm::from_parameters(&sample());
        form.edit(AutopilotParameter::NoSailZoneSize, " 40 ").unwrap();
        let update = form.parse_one(AutopilotParameter::NoSailZoneSize).unwrap();
        assert_eq!(Value::Object(update), json!({"no_sail_zone_size": 40.0}));
    }

    #[test]
    fn checkbox_edit_rejects_garbage() {
        let mut form = ParameterForm::default();
        form.edit(AutopilotParameter::PerformForcedJibeInsteadOfTack, "yes").unwrap();
        assert!(form.perform_forced_jibe_instead_of_tack);
        assert!(form.edit(AutopilotParameter::PerformForcedJibeInsteadOfTack, "maybe").is_err());
        assert!(form.perform_forced_jibe_instead_of_tack);
    }

    #[test]
    fn reset_restores_one_field() {
        let mut form = ParameterForm::from_parameters(&sample());
        form.edit(AutopilotParameter::TackDistance, "1").unwrap();
        form.edit(AutopilotParameter::WaypointAccuracy, "2").unwrap();
        form.reset(AutopilotParameter::TackDistance, &sample());
        assert_eq!(form.tack_distance, "15.5");
        assert_eq!(form.waypoint_accuracy, "2");
    }

    #[test]
    fn copy_moves_one_field() {
        let mut target = sample();
        let mut source = sample();
        source.tack_distance = 99.0;
        source.waypoint_accuracy = 1.0;
        AutopilotParameter::TackDistance.copy(&source, &mut target);
        assert_eq!(target.tack_distance, 99.0);
        assert_eq!(target.waypoint_accuracy, 5.0);
        assert_eq!(AutopilotParameter::TackDistance.value_of(&target), json!(99.0));
    }
}
