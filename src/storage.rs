//! ==============================================================================
//! storage.rs - timestamped json presets
//! ==============================================================================
//!
//! layout:
//!     <dir>/<prefix>_<unix_nanos>.json
//!
//!     "latest" is the lexicographically greatest file name. nanosecond
//!     timestamps have the same digit count until 2286, so string order is
//!     time order.
//!
//!     buoys and data limits load from `<dir>/default.json` instead of the
//!     latest file when no path is given.
//!
//! ==============================================================================

use crate::config::StorageConfig;
use crate::error::{GroundStationError, GsResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// loaded when no buoy or limits file is chosen
pub const DEFAULT_FILE: &str = "default.json";

#[derive(Debug, Clone)]
pub struct PresetStore {
    dir: PathBuf,
    prefix: &'static str,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self { dir: dir.into(), prefix }
    }

    /// autopilot parameter presets
    pub fn params(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "params")
    }

    /// boat telemetry snapshots
    pub fn boat_data(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "boat_data")
    }

    pub fn buoy_data(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "buoy_data")
    }

    /// telemetry upper/lower bounds
    pub fn data_limits(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "boat_data_bounds")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> GsResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// write `value` as a new timestamped file, returning its path
    pub fn save<T: Serialize>(&self, value: &T) -> GsResult<PathBuf> {
        self.ensure_dir()?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = self.dir.join(format!("{}_{}.json", self.prefix, nanos));

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        std::fs::write(&path, buf)?;
        Ok(path)
    }

    /// most recent file by name
    pub fn latest(&self) -> GsResult<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GroundStationError::NoSavedFiles(self.dir.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut newest: Option<String> = None;
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".json") {
                continue;
            }
            if newest.as_ref().map_or(true, |n| name > *n) {
                newest = Some(name);
            }
        }

        newest
            .map(|name| self.dir.join(name))
            .ok_or_else(|| GroundStationError::NoSavedFiles(self.dir.clone()))
    }

    /// read an explicit file, or the latest one when `path` is `None`
    pub fn load<T: DeserializeOwned>(&self, path: Option<&Path>) -> GsResult<(PathBuf, T)> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.latest()?,
        };
        let content = std::fs::read_to_string(&path)?;
        let value = serde_json::from_str(&content)?;
        Ok((path, value))
    }

    /// read an explicit file, or `default.json` when `path` is `None`
    pub fn load_or_default_file<T: DeserializeOwned>(&self, path: Option<&Path>) -> GsResult<(PathBuf, T)> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.dir.join(DEFAULT_FILE),
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GroundStationError::MissingFile(path))
            }
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_str(&content)?;
        Ok((path, value))
    }
}

/// one store per kind of preset
#[derive(Debug, Clone)]
pub struct PresetStores {
    pub params: PresetStore,
    pub boat_data: PresetStore,
    pub buoys: PresetStore,
    pub data_limits: PresetStore,
}

impl PresetStores {
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::in_dirs(
            &storage.autopilot_params_dir,
            &storage.boat_data_dir,
            &storage.buoy_data_dir,
            &storage.boat_data_limits_dir,
        )
    }

    pub fn in_dirs(params: &Path, boat_data: &Path, buoys: &Path, data_limits: &Path) -> Self {
        Self {
            params: PresetStore::params(params),
            boat_data: PresetStore::boat_data(boat_data),
            buoys: PresetStore::buoy_data(buoys),
            data_limits: PresetStore::data_limits(data_limits),
        }
    }

    /// every store under one root, named like the default config
    #[cfg(test)]
    pub fn under(root: &Path) -> Self {
        Self::in_dirs(
            &root.join("autopilot_params"),
            &root.join("boat_data"),
            &root.join("buoy_data"),
            &root.join("boat_data_bounds"),
        )
    }

    pub fn all(&self) -> [&PresetStore; 4] {
        [&self.params, &self.boat_data, &self.buoys, &self.data_limits]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AutopilotParameters;

    fn params(tack_distance: f64) -> AutopilotParameters {
        AutopilotParameters {
            perform_forced_jibe_instead_of_tack: true,
            waypoint_accuracy: 5.0,
            no_sail_zone_size: 45.0,
            autopilot_refresh_rate: 10.0,
            tack_distance,
        }
    }

    #[test]
    fn save_names_file_with_prefix_and_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::params(dir.path());
        let path = store.save(&params(1.0)).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("params_"));
        assert!(name.ends_with(".json"));
        assert!(name["params_".len()..name.len() - 5].chars().all(|c| c.is_ascii_digit()));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    \"tack_distance\""));
    }

    #[test]
    fn latest_is_greatest_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, tack) in [
            ("params_1700000000000000000.json", 1.0),
            ("params_1700000000000000002.json", 3.0),
            ("params_1700000000000000001.json", 2.0),
        ] {
            std::fs::write(dir.path().join(name), serde_json::to_string(&params(tack)).unwrap())
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = PresetStore::params(dir.path());
        let (path, loaded): (_, AutopilotParameters) = store.load(None).unwrap();
        assert!(path.ends_with("params_1700000000000000002.json"));
        assert_eq!(loaded.tack_distance, 3.0);
    }

    #[test]
    fn explicit_path_wins_over_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::params(dir.path());
        let first = store.save(&params(1.0)).unwrap();
        std::fs::write(
            dir.path().join("params_9999999999999999999.json"),
            serde_json::to_string(&params(9.0)).unwrap(),
        )
        .unwrap();

        let (_, loaded): (_, AutopilotParameters) = store.load(Some(&first)).unwrap();
        assert_eq!(loaded.tack_distance, 1.0);
    }

    #[test]
    fn empty_or_missing_dir_has_no_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::params(dir.path());
        assert!(matches!(store.latest(), Err(GroundStationError::NoSavedFiles(_))));

        let missing = PresetStore::params(dir.path().join("nope"));
        assert!(matches!(
            missing.load::<AutopilotParameters>(None),
            Err(GroundStationError::NoSavedFiles(_))
        ));
    }

    #[test]
    fn default_file_when_no_path_given() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::buoy_data(dir.path());
        assert!(matches!(
            store.load_or_default_file::<serde_json::Value>(None),
            Err(GroundStationError::MissingFile(_))
        ));

        // a newer saved file does not shadow default.json
        store.save(&serde_json::json!({"mark": {"lat": 9.0, "lon": 9.0}})).unwrap();
        std::fs::write(dir.path().join(DEFAULT_FILE), r#"{"start": {"lat": 1.0, "lon": 2.0}}"#).unwrap();
        let (path, loaded): (_, serde_json::Value) = store.load_or_default_file(None).unwrap();
        assert!(path.ends_with(DEFAULT_FILE));
        assert_eq!(loaded["start"]["lon"], serde_json::json!(2.0));
    }

    #[test]
    fn stores_use_their_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let stores = PresetStores::under(dir.path());
        let limits = stores.data_limits.save(&serde_json::json!({})).unwrap();
        let buoys = stores.buoys.save(&serde_json::json!({})).unwrap();
        assert!(limits.file_name().unwrap().to_string_lossy().starts_with("boat_data_bounds_"));
        assert!(buoys.file_name().unwrap().to_string_lossy().starts_with("buoy_data_"));
        assert_eq!(stores.all().len(), 4);
    }
}
