//! ==============================================================================
//! waypoints.rs - waypoint table state and button enablement
//! ==============================================================================
//!
//! states:
//!
//!     EMPTY ──(count becomes nonzero)──> POPULATED
//!       ^                                    │
//!       └──────(count becomes zero)──────────┘
//!
//!     initial:            send=off clear=off pull=on
//!     EMPTY -> POPULATED: send=on  clear=on  pull=off
//!     POPULATED -> EMPTY: pull=on (others untouched)
//!     clear pressed:      clear=off pull=on
//!     pull completed:     pull=off
//!
//! relationships:
//!     - used by: controller.rs (applies every waypoint poll)
//!     - uses: reconcile.rs (length-only change detection)
//!
//! ==============================================================================

use crate::domain::{Waypoint, WaypointList};
use crate::reconcile::reconcile_waypoints;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    Empty,
    Populated,
}

/// which waypoint buttons are clickable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Affordances {
    pub can_send: bool,
    pub can_clear: bool,
    pub can_pull: bool,
}

#[derive(Debug, Clone)]
pub struct WaypointPanel {
    waypoints: WaypointList,
    count: usize,
    affordances: Affordances,
}

impl Default for WaypointPanel {
    fn default() -> Self {
        Self {
            waypoints: Vec::new(),
            count: 0,
            affordances: Affordances { can_send: false, can_clear: false, can_pull: true },
        }
    }
}

impl WaypointPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// apply a polled list; returns whether the table must be rebuilt
    pub fn apply(&mut self, list: WaypointList) -> bool {
        let (changed, count) = reconcile_waypoints(self.count, &list);
        self.waypoints = list;
        if changed {
            self.count = count;
            if count == 0 {
                self.affordances.can_pull = true;
            } else {
                self.affordances.can_send = true;
                self.affordances.can_clear = true;
                self.affordances.can_pull = false;
            }
        }
        changed
    }

    pub fn clear(&mut self) {
        self.affordances.can_clear = false;
        self.affordances.can_pull = true;
    }

    pub fn mark_pulled(&mut self) {
        self.affordances.can_pull = false;
    }

    pub fn state(&self) -> RouteState {
        if self.count == 0 {
            RouteState::Empty
        } else {
            RouteState::Populated
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn affordances(&self) -> Affordances {
        self.affordances
    }
}
