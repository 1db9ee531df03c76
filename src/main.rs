//! ==============================================================================
//! main.rs - ground station entry point
//! ==============================================================================
//!
//! purpose:
//!     the shore-side companion of the sailboat. it polls the boat's
//!     telemetry server, keeps rolling averages of the motor readings,
//!     mirrors the operator's waypoint list and forwards waypoints and
//!     autopilot parameters back to the boat.
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - serve the operator dashboard and the local waypoint relay
//!     - run the controller loop until ctrl-c
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                   ground station (this crate)                 │
//!     │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//!     │  │ poll ticks  │  │  dashboard   │  │   waypoint relay    │  │
//!     │  │ 100 / 500ms │  │ (port 3000)  │  │    (port 3001)      │  │
//!     │  └──────┬──────┘  └──────┬───────┘  └──────────┬──────────┘  │
//!     │         │  Event         │ Event::Command      │             │
//!     │         └────────┬───────┘                     │             │
//!     │            ┌─────┴──────┐     map / table      │             │
//!     │            │ controller │ ───────────────> DashboardPresenter │
//!     │            └─────┬──────┘                     │             │
//!     └──────────────────┼────────────────────────────┼─────────────┘
//!                        │ http (reqwest)             │ GET /waypoints
//!                        ▼                            ▼
//!              ┌───────────────────┐         ┌────────────────┐
//!              │ telemetry server  │         │  browser map   │
//!              │ (on the boat)     │         │  (operator)    │
//!              └───────────────────┘         └────────────────┘
//!
//! ==============================================================================

mod client;
mod config;
mod controller;
mod domain;
mod error;
mod params;
mod poller;
mod presenter;
mod reconcile;
mod server;
mod storage;
mod waypoints;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// command line arguments
#[derive(Parser, Debug)]
#[command(name = "groundstation", about = "Sailboat ground station")]
struct Args {
    /// path to groundstation.toml (searched in ./config and ../config otherwise)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // startup banner
    println!("===========================================================");
    println!("  Sailbot Ground Station");
    println!("  \"Poll, Reconcile, Relay\"");
    println!("===========================================================");

    // step 1: load configuration, then logging at the configured level
    let config = config::GroundStationConfig::load_or_default(args.config.as_deref())?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.logging.level.as_str()))
        .init();
    config.print_summary();

    // step 2: preset directories
    let stores = storage::PresetStores::from_config(&config.storage);
    for store in stores.all() {
        if let Err(e) = store.ensure_dir() {
            log::warn!("[STARTUP] Could not create {}: {}", store.dir().display(), e);
        }
    }

    // step 3: controller and shared state
    let endpoints = client::Endpoints::from_config(&config.telemetry, &config.waypoints);
    let telemetry = client::TelemetryClient::new(endpoints, config.telemetry.timeout())?;
    let relay = server::WaypointRelay::default();
    let dashboard = presenter::DashboardPresenter::new();
    let (station, events) = controller::GroundStation::new(telemetry, dashboard.clone(), relay.clone(), stores);

    // step 4: web servers in background
    let dashboard_app = server::dashboard_router(dashboard, station.sender());
    let dashboard_bind = config.server.dashboard_bind.clone();
    tokio::spawn(async move {
        log::info!("[STARTUP] ✓ Dashboard live at http://{}", dashboard_bind);
        if let Err(e) = server::serve(&dashboard_bind, dashboard_app).await {
            log::error!("[ERROR] Dashboard server error: {}", e);
        }
    });

    if config.server.relay_enabled {
        let relay_bind = config.server.relay_bind.clone();
        tokio::spawn(async move {
            log::info!("[STARTUP] ✓ Waypoint relay live at http://{}/waypoints", relay_bind);
            if let Err(e) = server::serve(&relay_bind, server::relay_router(relay)).await {
                log::error!("[ERROR] Waypoint relay error: {}", e);
            }
        });
    }

    // step 5: controller loop
    let cadence = poller::Cadence {
        waypoints: config.polling.waypoints_interval(),
        telemetry: config.polling.telemetry_interval(),
    };
    log::info!(
        "[RUNTIME] Polling waypoints every {:?}, telemetry every {:?}",
        cadence.waypoints,
        cadence.telemetry
    );
    println!("────────────────────────────────────────────────────────────");

    station
        .run(events, cadence, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("[ERROR] Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
