//! # Perception module
//!
//! Turns a raw camera frame into a classified frame, the blobs found in it,
//! a target point and a steering error.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod bearing;
pub mod blob;
pub mod classify;
pub mod overlay;
mod params;
pub mod target;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
