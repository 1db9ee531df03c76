//! ==============================================================================
//! reconcile.rs - derived display state from old state + new poll results
//! ==============================================================================
//!
//! purpose:
//!     pure functions the controller runs on every poll result:
//!     - did the waypoint list change enough to redraw? (length only)
//!     - smoothed motor readings (rolling averages)
//!     - distance from the boat to the waypoint it is heading for
//!     - the number formatting rules of the telemetry panel
//!
//! ==============================================================================

use crate::domain::{TelemetrySnapshot, VescData, Waypoint, MISSING_VALUE};
use geo::{GeodesicDistance, Point};

/// decide whether a freshly polled list warrants a redraw
///
/// only the length is compared. a same-length list with moved points
/// reports `changed == false`.
pub fn reconcile_waypoints(prev_count: usize, new_list: &[Waypoint]) -> (bool, usize) {
    let new_count = new_list.len();
    (new_count != prev_count, new_count)
}

/// motor readings that get smoothed before display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AveragedField {
    Rpm,
    AmpHours,
    AmpHoursCharged,
    CurrentToVesc,
    VoltageToMotor,
    VoltageToVesc,
    WattageToMotor,
    MotorTemperature,
}

impl AveragedField {
    pub const ALL: [AveragedField; 8] = [
        AveragedField::Rpm,
        AveragedField::AmpHours,
        AveragedField::AmpHoursCharged,
        AveragedField::CurrentToVesc,
        AveragedField::VoltageToMotor,
        AveragedField::VoltageToVesc,
        AveragedField::WattageToMotor,
        AveragedField::MotorTemperature,
    ];

    /// telemetry key on the wire
    pub fn key(self) -> &'static str {
        match self {
            AveragedField::Rpm => "vesc_data_rpm",
            AveragedField::AmpHours => "vesc_data_amp_hours",
            AveragedField::AmpHoursCharged => "vesc_data_amp_hours_charged",
            AveragedField::CurrentToVesc => "vesc_data_current_to_vesc",
            AveragedField::VoltageToMotor => "vesc_data_voltage_to_motor",
            AveragedField::VoltageToVesc => "vesc_data_voltage_to_vesc",
            AveragedField::WattageToMotor => "vesc_data_wattage_to_motor",
            AveragedField::MotorTemperature => "vesc_data_motor_temperature",
        }
    }

    fn read(self, vesc: &VescData) -> Option<f64> {
        match self {
            AveragedField::Rpm => vesc.rpm,
            AveragedField::AmpHours => vesc.amp_hours,
            AveragedField::AmpHoursCharged => vesc.amp_hours_charged,
            AveragedField::CurrentToVesc => vesc.current_to_vesc,
            AveragedField::VoltageToMotor => vesc.voltage_to_motor,
            AveragedField::VoltageToVesc => vesc.voltage_to_vesc,
            AveragedField::WattageToMotor => vesc.wattage_to_motor,
            AveragedField::MotorTemperature => vesc.motor_temperature,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// smoothed value per tracked field, all zero at startup
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RollingAverages {
    values: [f64; AveragedField::ALL.len()],
}

impl RollingAverages {
    pub fn get(&self, field: AveragedField) -> f64 {
        self.values[field.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        AveragedField::ALL.iter().map(|f| (f.key(), self.get(*f)))
    }
}

/// fold one snapshot into the averages: `avg' = (avg + v) / 2`
///
/// fields the snapshot does not carry keep their previous average.
pub fn reconcile_telemetry(prev: &RollingAverages, snapshot: &TelemetrySnapshot) -> RollingAverages {
    let mut next = *prev;
    for field in AveragedField::ALL {
        if let Some(value) = field.read(&snapshot.vesc).filter(|v| v.is_finite()) {
            let slot = &mut next.values[field.index()];
            *slot = (*slot + value) / 2.0;
        }
    }
    next
}

/// geodesic metres from `position` to `route[index]`, or 0
pub fn distance_to_next_waypoint(position: Option<Waypoint>, route: &[Waypoint], index: Option<i64>) -> f64 {
    let Some(position) = position else {
        return 0.0;
    };
    let Some(next) = index
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| route.get(i))
    else {
        return 0.0;
    };

    let here = Point::new(position.lon(), position.lat());
    let there = Point::new(next.lon(), next.lat());
    let meters = here.geodesic_distance(&there);
    if meters.is_finite() {
        meters
    } else {
        0.0
    }
}

// ==============================================================================
// display formatting
// ==============================================================================

/// 5 decimals, sentinel when missing
pub fn format_value(value: Option<f64>) -> String {
    format!("{:.5}", value.unwrap_or(MISSING_VALUE))
}

/// 5 decimals with the sign stripped; the sentinel keeps its sign
pub fn format_abs(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.5}", v.abs()),
        None => format!("{:.5}", MISSING_VALUE),
    }
}

/// boat position, 8 decimals
pub fn format_position(position: Option<Waypoint>) -> String {
    match position {
        Some(p) => format!("{:.8}, {:.8}", p.lat(), p.lon()),
        None => format!("{:.8}, {:.8}", MISSING_VALUE, MISSING_VALUE),
    }
}

/// waypoint table cell, 13 decimals
pub fn format_coordinate(value: f64) -> String {
    format!("{:.13}", value)
}
