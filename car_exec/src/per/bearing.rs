//! # Steering error measurement
//!
//! Two ways of turning what the camera sees into a signed steering error:
//!
//! - [`ColorRatio`] compares the amount of each track marking colour near the
//!   top of the usable frame. More of the left marking means the track bends
//!   left.
//! - [`bearing_deg`] measures the angle from the car to the guidance target,
//!   0 straight ahead, positive to the right.
//!
//! In both cases a positive error means steer left.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::Point2;

use util::maths::wrap_angle_deg;

use super::{
    classify::{ClassifiedFrame, Color},
    params::BearingParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Track colour ratio measurer.
///
/// Keeps the last measured value so a frame without any track markings
/// repeats it.
#[derive(Debug, Clone, Default)]
pub struct ColorRatio {
    last: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ColorRatio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure the ratio error for this frame.
    ///
    /// The band is scanned top down for the first row with more than
    /// `min_row_pixels` track pixels. That row and the ones below it, up to
    /// `rows_to_sample` rows in total, are sampled. The error is the left
    /// colour's share of the sampled track pixels minus the right colour's
    /// share, so lies in [-1, 1].
    pub fn measure(&mut self, frame: &ClassifiedFrame, params: &BearingParams) -> f64 {
        let is_left = |c: Color| c == params.track_left_color;
        let is_right = |c: Color| c == params.track_right_color;

        let band_end = params
            .band_end
            .unwrap_or_else(|| frame.height())
            .min(frame.height());

        let start_row = (params.band_start..band_end).find(|y| {
            frame.row(*y).filter(|c| is_left(*c) || is_right(*c)).count() > params.min_row_pixels
        });

        let start_row = match start_row {
            Some(y) => y,
            None => {
                trace!("No track row found, holding ratio error {}", self.last);
                return self.last;
            }
        };

        let (mut left, mut right) = (0usize, 0usize);
        let sample_end = (start_row + params.rows_to_sample.max(1)).min(band_end);

        for y in start_row..sample_end {
            for c in frame.row(y) {
                if is_left(c) {
                    left += 1;
                } else if is_right(c) {
                    right += 1;
                }
            }
        }

        let total = left + right;
        if total > 0 {
            self.last = (left as f64 - right as f64) / total as f64;
        }

        trace!(
            "Ratio error {} from rows {}..{} ({} left, {} right)",
            self.last,
            start_row,
            sample_end,
            left,
            right
        );

        self.last
    }

    /// The last measured error.
    pub fn last(&self) -> f64 {
        self.last
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The point bearings are measured from.
///
/// Uses the configured origin if there is one, otherwise the horizontal centre
/// of the bottom row.
pub fn origin_for(width: usize, height: usize, params: &BearingParams) -> Point2<f64> {
    match params.origin {
        Some([x, y]) => Point2::new(x, y),
        None => Point2::new(
            width.saturating_sub(1) as f64 / 2.0,
            height.saturating_sub(1) as f64,
        ),
    }
}

/// Bearing from `origin` to `target` in degrees, in (-180, 180].
///
/// Straight up the frame is 0 and the angle increases clockwise, so a target
/// to the right is positive. A target on the origin has bearing 0.
pub fn bearing_deg(origin: Point2<f64>, target: Point2<f64>) -> f64 {
    let d = target - origin;

    if d.x == 0.0 && d.y == 0.0 {
        return 0.0;
    }

    wrap_angle_deg(d.x.atan2(-d.y).to_degrees())
}

/// Steering error for a bearing, positive to steer left.
pub fn bearing_error(bearing_deg: f64, gain: f64) -> f64 {
    -bearing_deg * gain
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
