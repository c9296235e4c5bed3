//! # Control module
//!
//! Signal filters and the steering PID controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod filters;
pub mod pid;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use filters::{LowPass, MovingAverage, RateLimiter};
pub use pid::{PidController, PidTerms};
