//! ==============================================================================
//! poller.rs - skip-if-busy polling of telemetry and waypoints
//! ==============================================================================
//!
//! purpose:
//!     two resources are polled on independent tickers. each tick may start
//!     one worker task; the worker runs a single request to completion and
//!     posts the result to the controller channel. it never touches
//!     controller state.
//!
//!     a tick that finds the previous request of the same kind still in
//!     flight is dropped. no queueing: a slow server just means stale data.
//!
//!     ┌──────────┐ tick  ┌──────────┐ spawn ┌────────┐  Event::Polled  ┌────────────┐
//!     │ interval │──────>│ PollSlot │──────>│ worker │────────────────>│ controller │
//!     └──────────┘       └──────────┘       └────────┘                 └─────┬──────┘
//!                             ^                                              │
//!                             └──────────────── finish() ────────────────────┘
//!
//! ==============================================================================

use crate::client::TelemetryClient;
use crate::controller::Event;
use crate::domain::{TelemetrySnapshot, WaypointList};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Telemetry,
    Waypoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    InFlight,
}

/// the busy flag for one resource, only touched by the controller
#[derive(Debug)]
pub struct PollSlot {
    resource: Resource,
    state: PollState,
}

impl PollSlot {
    pub fn new(resource: Resource) -> Self {
        Self { resource, state: PollState::Idle }
    }

    /// claim the slot; `false` means a poll is already running and this tick is skipped
    pub fn try_begin(&mut self) -> bool {
        match self.state {
            PollState::Idle => {
                self.state = PollState::InFlight;
                true
            }
            PollState::InFlight => {
                log::trace!("[POLL] {:?} still in flight, skipping tick", self.resource);
                false
            }
        }
    }

    pub fn finish(&mut self) {
        self.state = PollState::Idle;
    }

    #[cfg(test)]
    pub fn state(&self) -> PollState {
        self.state
    }
}

#[derive(Debug, Clone)]
pub enum PollResult {
    Telemetry(TelemetrySnapshot),
    Waypoints(WaypointList),
}

/// run one poll of `resource` in the background and post the result
pub fn spawn_poll(
    client: TelemetryClient,
    resource: Resource,
    events: UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = match resource {
            Resource::Telemetry => PollResult::Telemetry(client.fetch_boat_status().await),
            Resource::Waypoints => PollResult::Waypoints(client.fetch_waypoints().await),
        };
        if events.send(Event::Polled(result)).is_err() {
            log::debug!("[POLL] Controller gone, dropping {:?} result", resource);
        }
    })
}

/// fast cadence for waypoints, slow for telemetry
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub waypoints: Duration,
    pub telemetry: Duration,
}

impl Cadence {
    pub fn tickers(&self) -> (Interval, Interval) {
        (ticker(self.waypoints), ticker(self.telemetry))
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Endpoints;
    use crate::testing::unreachable_url;
    use tokio::sync::mpsc;

    #[test]
    fn slot_skips_while_in_flight() {
        let mut slot = PollSlot::new(Resource::Telemetry);
        assert_eq!(slot.state(), PollState::Idle);
        assert!(slot.try_begin());
        assert_eq!(slot.state(), PollState::InFlight);
        assert!(!slot.try_begin());
        slot.finish();
        assert!(slot.try_begin());
    }

    #[tokio::test]
    async fn worker_posts_fallback_results() {
        let base = unreachable_url().await;
        let client = TelemetryClient::new(
            Endpoints::new(&base, &format!("{}waypoints", base)),
            Duration::from_secs(1),
        )
        .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn_poll(client.clone(), Resource::Waypoints, tx.clone()).await.unwrap();
        spawn_poll(client, Resource::Telemetry, tx).await.unwrap();

        match rx.recv().await {
            Some(Event::Polled(PollResult::Waypoints(list))) => assert!(list.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        match rx.recv().await {
            Some(Event::Polled(PollResult::Telemetry(snapshot))) => {
                assert_eq!(snapshot, TelemetrySnapshot::fallback())
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
