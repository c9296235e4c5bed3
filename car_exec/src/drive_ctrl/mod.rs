//! # Drive control module
//!
//! Runs the whole perception and control chain once per camera frame and
//! produces the drive command for that tick.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod compose;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Could not load the DriveCtrl parameters: {0}")]
    ParamLoadError(LoadError),

    #[error("Invalid DriveCtrl parameters: {0}")]
    InvalidParams(String),

    #[error("Could not create the DriveCtrl archive: {0}")]
    ArchiveError(ArchiveError),
}
