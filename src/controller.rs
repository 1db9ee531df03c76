//! ==============================================================================
//! controller.rs - the ground station event loop
//! ==============================================================================
//!
//! purpose:
//!     `GroundStation` owns every piece of application state (averages,
//!     waypoint panel, parameters, last snapshot, poll slots). it is only
//!     mutated here, one event at a time, so nothing needs a lock.
//!
//!     everything that touches the network runs in a spawned task and reports
//!     back through the same event channel:
//!
//!         poll tickers ─┐
//!         web commands ─┼──> Event channel ──> GroundStation::handle ──> Presenter
//!         task results ─┘
//!
//!     failures never stop the loop. they are logged and the previous state
//!     stays on screen.
//!
//! ==============================================================================

use crate::client::{TelemetryClient, WaypointTarget};
use crate::domain::{parse_buoys, parse_data_limits, AutopilotParameters, BuoyMap, DataLimits, TelemetrySnapshot, WaypointList};
use crate::error::{GroundStationError, GsResult};
use crate::params::{AutopilotParameter, ParameterForm};
use crate::poller::{spawn_poll, Cadence, PollResult, PollSlot, Resource};
use crate::presenter::{MapCommand, Presenter};
use crate::reconcile::{distance_to_next_waypoint, reconcile_telemetry, RollingAverages};
use crate::server::WaypointRelay;
use crate::storage::PresetStores;
use crate::waypoints::WaypointPanel;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// operator actions
#[derive(Debug)]
pub enum Command {
    SendWaypoints(WaypointTarget),
    PullWaypoints,
    ClearWaypoints,
    ZoomToBoat,
    ResetParameters,
    ResetParameter(AutopilotParameter),
    EditParameter(AutopilotParameter, String),
    SendParameters,
    SendParameter(AutopilotParameter),
    SaveParameters,
    LoadParameters(Option<PathBuf>),
    SaveBoatData,
    /// replace the buoys with operator-edited json
    EditBuoys(String),
    SaveBuoys,
    LoadBuoys(Option<PathBuf>),
    EditDataLimits(String),
    SaveDataLimits,
    LoadDataLimits(Option<PathBuf>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterScope {
    All,
    One(AutopilotParameter),
}

#[derive(Debug)]
pub enum Event {
    Polled(PollResult),
    Command(Command),
    WaypointsSent(WaypointTarget, GsResult<()>),
    RoutePulled(GsResult<WaypointList>),
    ParametersFetched(ParameterScope, GsResult<AutopilotParameters>),
}

pub struct GroundStation<P: Presenter> {
    client: TelemetryClient,
    presenter: P,
    relay: WaypointRelay,
    stores: PresetStores,
    events: UnboundedSender<Event>,

    telemetry_slot: PollSlot,
    waypoint_slot: PollSlot,
    averages: RollingAverages,
    snapshot: Option<TelemetrySnapshot>,
    panel: WaypointPanel,
    parameters: Option<AutopilotParameters>,
    form: ParameterForm,
    buoys: BuoyMap,
    data_limits: DataLimits,
}

impl<P: Presenter> GroundStation<P> {
    pub fn new(
        client: TelemetryClient,
        presenter: P,
        relay: WaypointRelay,
        stores: PresetStores,
    ) -> (Self, UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        let station = Self {
            client,
            presenter,
            relay,
            stores,
            events,
            telemetry_slot: PollSlot::new(Resource::Telemetry),
            waypoint_slot: PollSlot::new(Resource::Waypoints),
            averages: RollingAverages::default(),
            snapshot: None,
            panel: WaypointPanel::new(),
            parameters: None,
            form: ParameterForm::default(),
            buoys: BuoyMap::new(),
            data_limits: DataLimits::new(),
        };
        (station, rx)
    }

    /// handle for anything that wants to feed the loop (the web server)
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.events.clone()
    }

    /// run until `shutdown` resolves
    pub async fn run(mut self, mut events: UnboundedReceiver<Event>, cadence: Cadence, shutdown: impl Future<Output = ()>) {
        let (mut fast, mut slow) = cadence.tickers();
        tokio::pin!(shutdown);

        self.handle(Event::Command(Command::ResetParameters));

        loop {
            tokio::select! {
                _ = fast.tick() => {
                    self.start_poll(Resource::Waypoints);
                }
                _ = slow.tick() => {
                    self.start_poll(Resource::Telemetry);
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event);
                    }
                    None => break,
                },
                _ = &mut shutdown => {
                    log::info!("[RUNTIME] Shutting down");
                    break;
                }
            }
        }
    }

    /// start a poll unless one for the same resource is still running
    pub fn start_poll(&mut self, resource: Resource) -> bool {
        let slot = match resource {
            Resource::Telemetry => &mut self.telemetry_slot,
            Resource::Waypoints => &mut self.waypoint_slot,
        };
        if !slot.try_begin() {
            return false;
        }
        spawn_poll(self.client.clone(), resource, self.events.clone());
        true
    }

    /// apply one event; returns the background task it started, if any
    pub fn handle(&mut self, event: Event) -> Option<JoinHandle<()>> {
        match event {
            Event::Polled(PollResult::Telemetry(snapshot)) => {
                self.telemetry_slot.finish();
                self.apply_telemetry(snapshot);
                None
            }
            Event::Polled(PollResult::Waypoints(list)) => {
                self.waypoint_slot.finish();
                self.apply_waypoints(list);
                None
            }
            Event::Command(command) => self.apply_command(command),
            Event::WaypointsSent(target, result) => {
                self.waypoints_sent(target, result);
                None
            }
            Event::RoutePulled(result) => {
                self.route_pulled(result);
                None
            }
            Event::ParametersFetched(scope, result) => {
                self.parameters_fetched(scope, result);
                None
            }
        }
    }

    // ==========================================================================
    // poll results
    // ==========================================================================

    fn apply_telemetry(&mut self, snapshot: TelemetrySnapshot) {
        if snapshot.is_empty() {
            log::info!("[TELEMETRY] Connection successful but no boat data found.");
            return;
        }

        self.averages = reconcile_telemetry(&self.averages, &snapshot);
        let route = snapshot.current_route.as_deref().unwrap_or_default();
        let distance = distance_to_next_waypoint(snapshot.position, route, snapshot.current_waypoint_index);
        self.presenter.on_telemetry(&snapshot, &self.averages, distance);
        self.snapshot = Some(snapshot);
    }

    fn apply_waypoints(&mut self, list: WaypointList) {
        let changed = self.panel.apply(list);
        if changed {
            log::debug!("[WAYPOINTS] Now showing {} waypoints", self.panel.count());
        }
        self.presenter.on_waypoints(&self.panel, changed);
    }

    // ==========================================================================
    // operator commands
    // ==========================================================================

    fn apply_command(&mut self, command: Command) -> Option<JoinHandle<()>> {
        match command {
            Command::SendWaypoints(target) => Some(self.send_waypoints(target)),
            Command::PullWaypoints => self.pull_waypoints(),
            Command::ClearWaypoints => {
                self.clear_waypoints();
                None
            }
            Command::ZoomToBoat => {
                if self.snapshot.as_ref().and_then(|s| s.position).is_some() {
                    self.presenter.on_map(MapCommand::FocusOnBoat);
                } else {
                    log::info!("[MAP] Boat position not available.");
                }
                None
            }
            Command::ResetParameters => Some(self.fetch_parameters(ParameterScope::All)),
            Command::ResetParameter(param) => Some(self.fetch_parameters(ParameterScope::One(param))),
            Command::EditParameter(param, text) => {
                match self.form.edit(param, &text) {
                    Ok(()) => self.presenter.on_parameters(&self.form),
                    Err(e) => log::warn!("[PARAMS] Error: {}", e),
                }
                None
            }
            Command::SendParameters => self.send_parameters(),
            Command::SendParameter(param) => self.send_parameter(param),
            Command::SaveParameters => {
                self.save_parameters();
                None
            }
            Command::LoadParameters(path) => {
                self.load_parameters(path);
                None
            }
            Command::SaveBoatData => {
                self.save_boat_data();
                None
            }
            Command::EditBuoys(text) => {
                self.edit_buoys(&text);
                None
            }
            Command::SaveBuoys => {
                self.save_buoys();
                None
            }
            Command::LoadBuoys(path) => {
                self.load_buoys(path);
                None
            }
            Command::EditDataLimits(text) => {
                self.edit_data_limits(&text);
                None
            }
            Command::SaveDataLimits => {
                self.save_data_limits();
                None
            }
            Command::LoadDataLimits(path) => {
                self.load_data_limits(path);
                None
            }
        }
    }

    /// post the displayed list; the local list is never touched
    fn send_waypoints(&mut self, target: WaypointTarget) -> JoinHandle<()> {
        let client = self.client.clone();
        let events = self.events.clone();
        let waypoints = self.panel.waypoints().to_vec();
        tokio::spawn(async move {
            let result = client.send_waypoints(&waypoints, target).await;
            if let Err(e) = &result {
                log::warn!("[WAYPOINTS] Connection error: {}", e);
                log::warn!("[WAYPOINTS] Waypoints: {:?}", waypoints);
            }
            let _ = events.send(Event::WaypointsSent(target, result));
        })
    }

    fn waypoints_sent(&mut self, target: WaypointTarget, result: GsResult<()>) {
        if result.is_ok() {
            log::info!("[WAYPOINTS] Sent {} waypoints ({:?})", self.panel.count(), target);
            if target == WaypointTarget::Live {
                self.presenter.on_map(MapCommand::ChangeWaypointColor("red"));
            }
        }
    }

    fn pull_waypoints(&mut self) -> Option<JoinHandle<()>> {
        if !self.panel.affordances().can_pull {
            log::warn!("[WAYPOINTS] Pull disabled until waypoints are cleared");
            return None;
        }
        // one pull per clear, even while the first is still in flight
        self.panel.mark_pulled();
        self.presenter.on_waypoints(&self.panel, false);

        let client = self.client.clone();
        let events = self.events.clone();
        Some(tokio::spawn(async move {
            let result = client.fetch_route().await;
            let _ = events.send(Event::RoutePulled(result));
        }))
    }

    /// draw the server's route first, then whatever was already local
    fn route_pulled(&mut self, result: GsResult<WaypointList>) {
        let remote = match result {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("[WAYPOINTS] Connection error: {}", e);
                return;
            }
        };

        if remote.is_empty() {
            log::info!("[WAYPOINTS] No waypoints found on the server.");
        } else {
            let local = self.relay.list();
            self.presenter.on_map(MapCommand::ClearWaypoints);
            for waypoint in &remote {
                self.presenter.on_map(MapCommand::AddWaypoint(*waypoint));
            }
            self.presenter.on_map(MapCommand::ChangeWaypointColor("red"));
            for waypoint in &local {
                self.presenter.on_map(MapCommand::AddWaypoint(*waypoint));
            }
            log::info!("[WAYPOINTS] Pulled {} waypoints from the server", remote.len());
            self.relay.replace(remote.into_iter().chain(local).collect());
        }
    }

    fn clear_waypoints(&mut self) {
        self.relay.clear();
        self.presenter.on_map(MapCommand::ClearWaypoints);
        self.panel.clear();
        self.presenter.on_waypoints(&self.panel, false);
    }

    fn fetch_parameters(&mut self, scope: ParameterScope) -> JoinHandle<()> {
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.fetch_autopilot_parameters().await;
            let _ = events.send(Event::ParametersFetched(scope, result));
        })
    }

    fn parameters_fetched(&mut self, scope: ParameterScope, result: GsResult<AutopilotParameters>) {
        let remote = match result {
            Ok(remote) => remote,
            Err(GroundStationError::NoData(_)) => {
                log::info!("[PARAMS] Connection successful but no parameters found.");
                return;
            }
            Err(e) => {
                log::warn!("[PARAMS] Error: {}", e);
                return;
            }
        };

        match scope {
            ParameterScope::All => {
                self.form = ParameterForm::from_parameters(&remote);
                self.parameters = Some(remote);
            }
            ParameterScope::One(param) => {
                let mut merged = self.parameters.clone().unwrap_or_else(|| remote.clone());
                param.copy(&remote, &mut merged);
                self.form.reset(param, &remote);
                log::debug!("[PARAMS] Reset {} to {}", param.name(), param.value_of(&remote));
                self.parameters = Some(merged);
            }
        }
        self.presenter.on_parameters(&self.form);
    }

    fn send_parameters(&mut self) -> Option<JoinHandle<()>> {
        let params = match self.form.parse() {
            Ok(params) => params,
            Err(e) => {
                log::warn!("[PARAMS] Error: {}", e);
                log::warn!("[PARAMS] Parameters: {:?}", self.parameters);
                return None;
            }
        };
        self.parameters = Some(params.clone());

        let client = self.client.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = client.send_autopilot_parameters(&params).await {
                log::warn!("[PARAMS] Error: {}", e);
                log::warn!("[PARAMS] Parameters: {:?}", params);
            }
        }))
    }

    fn send_parameter(&mut self, param: AutopilotParameter) -> Option<JoinHandle<()>> {
        let update = match self.form.parse_one(param) {
            Ok(update) => update,
            Err(e) => {
                log::warn!("[PARAMS] Error: {}", e);
                return None;
            }
        };

        let client = self.client.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = client.send_autopilot_parameter_update(&update).await {
                log::warn!("[PARAMS] Error: {}", e);
                log::warn!("[PARAMS] Inputted parameter: {}", param.name());
            }
        }))
    }

    fn save_parameters(&mut self) {
        let params = match self.form.parse() {
            Ok(params) => params,
            Err(e) => {
                log::warn!("[PARAMS] Error: {}", e);
                return;
            }
        };
        match self.stores.params.save(&params) {
            Ok(path) => log::info!("[STORAGE] Saved parameters to {}", path.display()),
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
        self.parameters = Some(params);
    }

    fn load_parameters(&mut self, path: Option<PathBuf>) {
        match self.stores.params.load::<AutopilotParameters>(path.as_deref()) {
            Ok((path, params)) => {
                log::info!("[STORAGE] Loaded parameters from {}", path.display());
                self.form = ParameterForm::from_parameters(&params);
                self.parameters = Some(params);
                self.presenter.on_parameters(&self.form);
            }
            Err(GroundStationError::NoSavedFiles(dir)) => {
                log::info!("[STORAGE] No parameter files found in {}.", dir.display());
            }
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
    }

    fn save_boat_data(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            log::info!("[STORAGE] No boat data received yet.");
            return;
        };
        match self.stores.boat_data.save(snapshot) {
            Ok(path) => log::info!("[STORAGE] Saved boat data to {}", path.display()),
            Err(e) => log::warn!("[STORAGE] Error saving to {}: {}", self.stores.boat_data.dir().display(), e),
        }
    }

    // ==========================================================================
    // buoys and data limits
    // ==========================================================================

    fn edit_buoys(&mut self, text: &str) {
        match parse_buoys(text) {
            Ok(buoys) if buoys != self.buoys => {
                self.buoys = buoys;
                self.redraw_buoys();
            }
            Ok(_) => {}
            Err(e) => log::warn!("[BUOYS] Error: {}", e),
        }
    }

    fn redraw_buoys(&mut self) {
        self.presenter.on_map(MapCommand::ClearBuoys);
        for buoy in self.buoys.values() {
            self.presenter.on_map(MapCommand::AddBuoy(buoy.position()));
        }
        self.presenter.on_buoys(&self.buoys);
    }

    fn save_buoys(&mut self) {
        match self.stores.buoys.save(&self.buoys) {
            Ok(path) => log::info!("[STORAGE] Saved buoys to {}", path.display()),
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
    }

    fn load_buoys(&mut self, path: Option<PathBuf>) {
        match self.stores.buoys.load_or_default_file::<BuoyMap>(path.as_deref()) {
            Ok((path, buoys)) => {
                log::info!("[STORAGE] Loaded buoys from {}", path.display());
                self.buoys = buoys;
                self.redraw_buoys();
            }
            Err(GroundStationError::MissingFile(path)) => {
                log::info!("[STORAGE] No buoy data file at {}.", path.display());
            }
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
    }

    fn edit_data_limits(&mut self, text: &str) {
        match parse_data_limits(text) {
            Ok(limits) => {
                self.data_limits = limits;
                self.presenter.on_data_limits(&self.data_limits);
            }
            Err(e) => log::warn!("[LIMITS] Error: {}", e),
        }
    }

    fn save_data_limits(&mut self) {
        match self.stores.data_limits.save(&self.data_limits) {
            Ok(path) => log::info!("[STORAGE] Saved boat data limits to {}", path.display()),
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
    }

    fn load_data_limits(&mut self, path: Option<PathBuf>) {
        match self.stores.data_limits.load_or_default_file::<DataLimits>(path.as_deref()) {
            Ok((path, limits)) => {
                log::info!("[STORAGE] Loaded boat data limits from {}", path.display());
                self.data_limits = limits;
                self.presenter.on_data_limits(&self.data_limits);
            }
            Err(GroundStationError::MissingFile(path)) => {
                log::info!("[STORAGE] No boat data limits file at {}.", path.display());
            }
            Err(e) => log::warn!("[STORAGE] Error: {}", e),
        }
    }

    // ==========================================================================
    // read access
    // ==========================================================================

    #[cfg(test)]
    pub fn averages(&self) -> &RollingAverages {
        &self.averages
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_ref()
    }

    #[cfg(test)]
    pub fn panel(&self) -> &WaypointPanel {
        &self.panel
    }

    #[cfg(test)]
    pub fn parameters(&self) -> Option<&AutopilotParameters> {
        self.parameters.as_ref()
    }

    #[cfg(test)]
    pub fn form(&self) -> &ParameterForm {
        &self.form
    }

    #[cfg(test)]
    pub fn buoys(&self) -> &BuoyMap {
        &self.buoys
    }

    #[cfg(test)]
    pub fn data_limits(&self) -> &DataLimits {
        &self.data_limits
    }
}
