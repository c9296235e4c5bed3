//! # Car library.
//!
//! This library allows other crates in the workspace (and the benches) to access items defined
//! inside the car crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Generic control blocks - PID controller and signal filters
pub mod ctrl;

/// Drive control module - runs perception and control once per frame to produce drive commands
pub mod drive_ctrl;

/// Parameters for the car executable
pub mod params;

/// Perception - pixel classification, blob detection, target and bearing estimation
pub mod per;

/// Turn tracking - turn labelling, history and prediction of the next turns
pub mod turn;
