//! # Signal filters
//!
//! Small stateful filters used to smooth the target, the steering error, the
//! turn signal and the throttle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;

use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mean of the last `window` samples.
///
/// The mean is rebuilt from the window on every sample, taken relative to the
/// newest sample, so a constant input averages to exactly that input.
#[derive(Debug, Clone, Serialize)]
pub struct MovingAverage {
    window: usize,
    samples: VecDeque<f64>,
}

/// First order low pass.
///
/// Each sample moves the output `1 / (tau + 1)` of the way towards the
/// input, so `tau = 0` passes the input straight through.
#[derive(Debug, Clone, Serialize)]
pub struct LowPass {
    alpha: f64,
    output: f64,
}

/// Bounds how quickly a signal may rise or fall.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiter {
    /// Units: signal per second
    max_increase: Option<f64>,

    /// Units: signal per second
    max_decrease: Option<f64>,

    output: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MovingAverage {
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            samples: VecDeque::with_capacity(window + 1),
        }
    }

    /// Add a sample and return the new average.
    pub fn filter(&mut self, value: f64) -> f64 {
        self.samples.push_back(value);

        if self.samples.len() > self.window {
            self.samples.pop_front();
        }

        self.average().unwrap_or(value)
    }

    /// The current average, `None` before the first sample.
    pub fn average(&self) -> Option<f64> {
        let anchor = *self.samples.back()?;
        let offsets: f64 = self.samples.iter().map(|v| v - anchor).sum();

        Some(anchor + offsets / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl LowPass {
    /// Negative time constants are treated as zero.
    pub fn new(tau: f64, initial: f64) -> Self {
        Self {
            alpha: 1.0 / (tau.max(0.0) + 1.0),
            output: initial,
        }
    }

    pub fn filter(&mut self, value: f64) -> f64 {
        self.output = self.alpha * value + (1.0 - self.alpha) * self.output;
        self.output
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f64) {
        self.output = value;
    }
}

impl RateLimiter {
    /// `None` leaves that direction unbounded.
    pub fn new(max_increase: Option<f64>, max_decrease: Option<f64>) -> Self {
        Self {
            max_increase,
            max_decrease,
            output: None,
        }
    }

    /// Start from `value` rather than taking the first sample as is.
    pub fn starting_at(mut self, value: f64) -> Self {
        self.output = Some(value);
        self
    }

    /// Move the output towards `value` by no more than the rate allows over
    /// `dt` seconds.
    ///
    /// The first sample passes through unless a start value was given. A
    /// non-positive or non-finite `dt` holds the previous output.
    pub fn filter(&mut self, value: f64, dt: f64) -> f64 {
        let prev = match self.output {
            Some(p) => p,
            None => {
                self.output = Some(value);
                return value;
            }
        };

        if !(dt.is_finite() && dt > 0.0) {
            return prev;
        }

        let mut out = value;
        if let Some(up) = self.max_increase {
            out = out.min(prev + up.abs() * dt);
        }
        if let Some(down) = self.max_decrease {
            out = out.max(prev - down.abs() * dt);
        }

        self.output = Some(out);
        out
    }

    pub fn output(&self) -> Option<f64> {
        self.output
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
