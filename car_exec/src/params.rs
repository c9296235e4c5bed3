//! # Car Executable Parameters
//!
//! This module provides parameters for the car executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Sleep out the remainder of each cycle. If false frames are replayed as fast as possible,
    /// with timestamps spaced by `cycle_period_s`.
    pub real_time: bool,

    /// Directory of PNG frames to replay, relative to the software root unless absolute.
    pub frames_dir: String,

    /// Save the debug overlay every this many cycles, 0 to never save it.
    pub overlay_every_n_cycles: u64,

    /// Stop after this many cycles.
    pub max_cycles: Option<u64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CarExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.05,
            real_time: true,
            frames_dir: "frames".into(),
            overlay_every_n_cycles: 0,
            max_cycles: None,
        }
    }
}

impl CarExecParams {
    /// Timestamp of the given replay cycle when not running in real time.
    ///
    /// Cycle `n` is stamped one period after cycle `n - 1`, starting one period after `start`.
    pub fn replay_timestamp(&self, start: Instant, cycle: u64) -> Instant {
        start + Duration::from_secs_f64(self.cycle_period_s).mul_f64((cycle + 1) as f64)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
