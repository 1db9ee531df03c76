//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `groundstation.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - TelemetryConfig: Where the boat's telemetry server lives.
//!     - WaypointsConfig: Where the local waypoint relay is polled.
//!     - PollingConfig: Fast (waypoints) and slow (telemetry) cadence.
//!     - ServerConfig: Dashboard and relay listen addresses.
//!     - StorageConfig: Preset and boat data directories.
//!     - LoggingConfig: Default log filter.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GroundStationConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub waypoints: WaypointsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// base url, endpoints are appended (`boat_status/get`, ...)
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WaypointsConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub telemetry_interval_ms: u64,
    pub waypoints_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub dashboard_bind: String,
    pub relay_enabled: bool,
    pub relay_bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub autopilot_params_dir: PathBuf,
    pub boat_data_dir: PathBuf,
    pub buoy_data_dir: PathBuf,
    pub boat_data_limits_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://18.191.164.84:8080/".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl Default for WaypointsConfig {
    fn default() -> Self {
        Self { url: "http://localhost:3001/waypoints".to_string() }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { telemetry_interval_ms: 500, waypoints_interval_ms: 100 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dashboard_bind: "0.0.0.0:3000".to_string(),
            relay_enabled: true,
            relay_bind: "0.0.0.0:3001".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            autopilot_params_dir: PathBuf::from("autopilot_params"),
            boat_data_dir: PathBuf::from("boat_data"),
            buoy_data_dir: PathBuf::from("buoy_data"),
            boat_data_limits_dir: PathBuf::from("boat_data_bounds"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl PollingConfig {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms.max(1))
    }

    pub fn waypoints_interval(&self) -> Duration {
        Duration::from_millis(self.waypoints_interval_ms.max(1))
    }
}

impl GroundStationConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    ///
    /// An explicit path must load; the search path is best effort.
    /// Runs before the logger exists, so it reports with println!.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            println!("[CONFIG] Loaded from {}", path.display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("groundstation.toml"),
            PathBuf::from("..").join("config").join("groundstation.toml"),
        ];
        Ok(Self::load_first(&paths))
    }

    /// first candidate that exists and parses, else defaults
    fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        eprintln!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("┌─────────────────────────────────────────┐");
        println!("│      GROUND STATION CONFIGURATION       │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Telemetry: {}", self.telemetry.base_url);
        println!("│ Waypoints: {}", self.waypoints.url);
        println!("│ Telemetry Poll: {}ms", self.polling.telemetry_interval_ms);
        println!("│ Waypoint Poll: {}ms", self.polling.waypoints_interval_ms);
        println!("│ Dashboard: {}", self.server.dashboard_bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
