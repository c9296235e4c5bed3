//! # Turn module
//!
//! Tracks which way the car is turning, keeps a history of completed turn
//! segments and predicts upcoming ones from it.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod history;
mod params;
pub mod predictor;
pub mod tracker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use history::{TurnHistory, TurnHistoryEntry, TurnLabel};
pub use params::*;
pub use predictor::predict;
pub use tracker::TurnTracker;
