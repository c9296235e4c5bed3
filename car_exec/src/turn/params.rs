//! Turn tracking and prediction parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the turn tracker and predictor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnParams {
    /// Number of steering samples averaged before thresholding.
    pub smoothing_window: usize,

    /// Smoothed steering magnitude above which the car is turning. Positive
    /// steering is left.
    pub steer_threshold: f64,

    /// A newly detected turn must persist for longer than this before it is
    /// accepted.
    ///
    /// Units: seconds
    pub hysteresis_s: f64,

    /// Maximum number of entries kept in the history.
    pub history_len: usize,

    /// Minimum number of history entries before a prediction is attempted.
    pub min_history: usize,

    /// Number of trailing entries matched against earlier history.
    pub pattern_len: usize,

    /// Number of extra entries skipped back from the trailing window before
    /// the search starts.
    pub search_gap: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TurnParams {
    fn default() -> Self {
        Self {
            smoothing_window: 6,
            steer_threshold: 0.275,
            hysteresis_s: 0.25,
            history_len: 35,
            min_history: 12,
            pattern_len: 5,
            search_gap: 2,
        }
    }
}
