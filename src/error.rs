//! ==============================================================================
//! error.rs - ground station error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     names every way an operation can fail. none of these are fatal: the
//!     controller logs them and keeps displaying its previous state.
//!
//! categories:
//!     - Transport: connection refused, timeout, dns, bad status, bad body
//!     - NoData: the server answered with an empty object
//!     - InvalidInput: operator typed something that is not a number
//!     - NoSavedFiles: "load" with nothing saved yet
//!     - MissingFile: the chosen file (or default.json) is not there
//!
//! ==============================================================================

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroundStationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned no {0}")]
    NoData(&'static str),

    #[error("invalid value {text:?} for {field}")]
    InvalidInput { field: &'static str, text: String },

    #[error("unknown autopilot parameter: {0}")]
    UnknownParameter(String),

    #[error("no saved files in {}", .0.display())]
    NoSavedFiles(PathBuf),

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GsResult<T> = Result<T, GroundStationError>;
