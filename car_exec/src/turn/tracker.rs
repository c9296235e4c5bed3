//! # Turn tracker
//!
//! Labels the car's recent steering as left, right or straight. A change of
//! label is only accepted once it has persisted for the hysteresis time, at
//! which point the segment just finished is appended to the history.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use serde::Serialize;

use super::{
    history::{TurnHistory, TurnHistoryEntry, TurnLabel},
    params::TurnParams,
};
use crate::ctrl::MovingAverage;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TurnTracker {
    #[serde(skip)]
    params: TurnParams,

    #[serde(skip)]
    smoother: MovingAverage,

    /// The accepted turn label.
    current: TurnLabel,

    /// The label of the latest smoothed steering sample.
    detected: TurnLabel,

    /// Units: seconds
    time_in_current: f64,

    /// Units: seconds
    time_in_detected: f64,

    history: TurnHistory,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TurnTracker {
    pub fn new(params: TurnParams) -> Self {
        Self {
            smoother: MovingAverage::new(params.smoothing_window),
            history: TurnHistory::new(params.history_len),
            current: TurnLabel::Straight,
            detected: TurnLabel::Straight,
            time_in_current: 0.0,
            time_in_detected: 0.0,
            params,
        }
    }

    /// Feed in this tick's steering demand and the time since the last tick.
    ///
    /// Returns the current accepted turn. Non-finite or negative `dt` counts
    /// as zero elapsed time.
    pub fn update(&mut self, steering: f64, dt: f64) -> TurnLabel {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        let smoothed = self.smoother.filter(steering);
        let label = self.label_for(smoothed);

        if label == self.detected {
            self.time_in_detected += dt;
        } else {
            self.time_in_detected = 0.0;
        }
        self.detected = label;

        self.time_in_current += dt;

        if self.time_in_detected > self.params.hysteresis_s && self.current != self.detected {
            let finished = TurnHistoryEntry::new(self.current, self.time_in_current);
            info!(
                "Turn change {} -> {} after {:.2} s",
                self.current, self.detected, self.time_in_current
            );

            self.history.push(finished);
            self.time_in_current = 0.0;
            self.current = self.detected;
        }

        self.current
    }

    /// Instantaneous label for a smoothed steering value.
    pub fn label_for(&self, smoothed: f64) -> TurnLabel {
        if smoothed > self.params.steer_threshold {
            TurnLabel::Left
        } else if smoothed < -self.params.steer_threshold {
            TurnLabel::Right
        } else {
            TurnLabel::Straight
        }
    }

    pub fn current(&self) -> TurnLabel {
        self.current
    }

    pub fn detected(&self) -> TurnLabel {
        self.detected
    }

    pub fn time_in_current(&self) -> f64 {
        self.time_in_current
    }

    pub fn history(&self) -> &TurnHistory {
        &self.history
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
