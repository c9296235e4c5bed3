//! # Car interface crate.
//!
//! Provides the data exchanged between the control core and its external
//! collaborators: frames coming in from the camera and drive commands going
//! out to the motor driver.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive command sent to the actuators
pub mod cmd;

/// Data produced by equipment (like the camera)
pub mod eqpt;
