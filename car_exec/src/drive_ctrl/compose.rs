//! # Command composition
//!
//! Turns the PID steering demand into the final drive command. Throttle
//! falls off as steering increases, predicted straights can boost it and
//! predicted turn changes pre-bias the steering error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use car_if::cmd::DriveCmd;
use util::maths::{clamp, interp_piecewise};

use super::params::{ComposeParams, FeedForwardParams};
use crate::{
    ctrl::{MovingAverage, RateLimiter},
    turn::{TurnHistoryEntry, TurnLabel},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Feed forward adjustments derived from the turn prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeedForward {
    /// Increase the throttle for an upcoming straight.
    pub boost: bool,

    /// Added to the steering error ahead of a predicted turn change.
    pub offset: f64,
}

/// Builds drive commands from steering demands.
#[derive(Debug, Clone)]
pub struct CommandComposer {
    params: ComposeParams,

    /// Units: normalised steering
    max_steering: f64,

    throttle_limiter: Option<RateLimiter>,

    /// Throttle before boost, used for the speed estimate
    throttle_avg: MovingAverage,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How the base throttle depends on the steering magnitude.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum ThrottleCurve {
    /// `base + increment` at zero steering, falling linearly to `base` once
    /// the steering magnitude reaches `dropoff` of full steering.
    Linear {
        base: f64,
        increment: f64,
        dropoff: f64,
    },

    /// Piecewise linear `(|steering|, throttle)` points, sorted by steering.
    Lookup(Vec<(f64, f64)>),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ThrottleCurve {
    fn default() -> Self {
        ThrottleCurve::Linear {
            base: 0.095,
            increment: 0.14,
            dropoff: 0.36,
        }
    }
}

impl ThrottleCurve {
    /// Base throttle for a steering demand.
    pub fn throttle(&self, steering: f64, max_steering: f64) -> f64 {
        let mag = steering.abs();

        match self {
            ThrottleCurve::Linear {
                base,
                increment,
                dropoff,
            } => {
                let range = dropoff * max_steering;
                let frac = if range > 0.0 {
                    (mag / range).min(1.0)
                } else {
                    1.0
                };
                base + increment * (1.0 - frac)
            }
            ThrottleCurve::Lookup(points) => interp_piecewise(points, mag).unwrap_or(0.0),
        }
    }
}

impl CommandComposer {
    pub fn new(params: ComposeParams, max_steering: f64) -> Self {
        let throttle_limiter = match (
            params.max_throttle_increase_per_s,
            params.max_throttle_decrease_per_s,
        ) {
            (None, None) => None,
            (up, down) => Some(RateLimiter::new(up, down).starting_at(0.0)),
        };

        Self {
            throttle_avg: MovingAverage::new(params.speed_window),
            throttle_limiter,
            max_steering,
            params,
        }
    }

    /// Build the command for this tick.
    ///
    /// Also returns the estimated speed, which is based on the throttle of
    /// previous ticks only.
    ///
    /// A non-finite steering demand is treated as straight ahead, and a
    /// non-finite throttle as stopped.
    pub fn compose(&mut self, steering: f64, boost: bool, dt: f64) -> (DriveCmd, f64) {
        let steering = finite_or_zero(clamp(steering, -self.max_steering, self.max_steering));
        let mut throttle = self.params.throttle_curve.throttle(steering, self.max_steering);

        let est_speed = self.estimated_speed();
        self.throttle_avg.filter(throttle);

        if boost {
            throttle = (throttle + self.params.boost_bump).max(self.params.boost_floor);
        }

        if let Some(ref mut limiter) = self.throttle_limiter {
            throttle = limiter.filter(throttle, dt);
        }

        let throttle = finite_or_zero(clamp(throttle, 0.0, self.params.max_throttle));

        (DriveCmd { throttle, steering }, est_speed)
    }

    /// Speed estimate from the average throttle, 0 before any throttle has
    /// been commanded.
    ///
    /// Units: encoder counts per second
    pub fn estimated_speed(&self) -> f64 {
        match self.throttle_avg.average() {
            Some(t) => t * self.params.speed_gain + self.params.speed_offset,
            None => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Work out the feed forward terms for a prediction.
///
/// `t` is the time spent in the current turn segment. Later offset rules
/// override earlier ones, and positive offsets steer left.
pub fn feed_forward(
    prediction: Option<&[TurnHistoryEntry; 2]>,
    t: f64,
    params: &FeedForwardParams,
) -> FeedForward {
    let mut ff = FeedForward::default();

    let [p0, p1] = match prediction {
        Some(p) if params.enabled => *p,
        _ => return ff,
    };

    // Boost through the first part of a long straight
    if p0.label == TurnLabel::Straight
        && t < p0.duration_s * params.boost_elapsed_frac
        && p0.duration_s > params.boost_min_straight_s
    {
        ff.boost = true;
    }

    // Boost into a straight that follows the current segment
    if p1.label == TurnLabel::Straight
        && t > p0.duration_s * params.boost_next_elapsed_frac
        && p0.duration_s + p1.duration_s > params.boost_next_min_total_s
    {
        ff.boost = true;
    }

    // Drift towards the outside on a straight before the next turn
    if p0.label == TurnLabel::Straight
        && p0.duration_s > params.offset_min_straight_s
        && t > params.offset_min_elapsed_s
        && p0.duration_s - t > params.offset_min_remaining_s
    {
        ff.offset = if p1.label == TurnLabel::Right {
            params.straight_offset
        } else {
            -params.straight_offset
        };
    }

    // Ease out of a turn that leads onto a straight
    if p0.label != TurnLabel::Straight
        && p1.label == TurnLabel::Straight
        && t > p0.duration_s * params.exit_elapsed_frac
    {
        ff.offset = if p0.label == TurnLabel::Right {
            params.exit_offset
        } else {
            -params.exit_offset
        };
    }

    ff
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::turn::TurnLabel::*;

    fn entry(label: TurnLabel, duration_s: f64) -> TurnHistoryEntry {
        TurnHistoryEntry::new(label, duration_s)
    }

    #[test]
    fn test_linear_curve() {
        let curve = ThrottleCurve::default();

        assert!((curve.throttle(0.0, 1.0) - 0.235).abs() < 1e-12);
        assert!((curve.throttle(0.18, 1.0) - 0.165).abs() < 1e-12);
        assert!((curve.throttle(-0.18, 1.0) - 0.165).abs() < 1e-12);

        // Floor once past the dropoff range
        assert!((curve.throttle(0.36, 1.0) - 0.095).abs() < 1e-12);
        assert!((curve.throttle(1.0, 1.0) - 0.095).abs() < 1e-12);
    }

    #[test]
    fn test_lookup_curve() {
        let curve = ThrottleCurve::Lookup(vec![(0.0, 0.235), (0.2, 0.15), (0.4, 0.095)]);

        assert!((curve.throttle(0.1, 1.0) - 0.1925).abs() < 1e-12);
        assert!((curve.throttle(-0.3, 1.0) - 0.1225).abs() < 1e-12);
        assert!((curve.throttle(0.9, 1.0) - 0.095).abs() < 1e-12);
        assert_eq!(ThrottleCurve::Lookup(vec![]).throttle(0.5, 1.0), 0.0);
    }

    #[test]
    fn test_compose_clamps() {
        let params = ComposeParams {
            max_throttle: 0.2,
            ..Default::default()
        };
        let mut composer = CommandComposer::new(params, 0.8);

        let (cmd, est_speed) = composer.compose(5.0, false, 0.1);
        assert_eq!(cmd.steering, 0.8);
        assert!(cmd.throttle >= 0.0 && cmd.throttle <= 0.2);
        assert_eq!(est_speed, 0.0);

        // Straight ahead would be 0.235 without the ceiling
        let (cmd, _) = composer.compose(0.0, true, 0.1);
        assert_eq!(cmd.throttle, 0.2);
        assert!(cmd.is_valid());
    }

    #[test]
    fn test_compose_never_emits_nan() {
        let params = ComposeParams {
            throttle_curve: ThrottleCurve::Lookup(vec![(0.0, f64::NAN)]),
            ..Default::default()
        };
        let mut composer = CommandComposer::new(params, 1.0);

        let (cmd, _) = composer.compose(0.0, false, 0.1);
        assert_eq!(cmd.throttle, 0.0);
        assert!(cmd.is_valid());

        let mut composer = CommandComposer::new(ComposeParams::default(), 1.0);
        let (cmd, _) = composer.compose(f64::NAN, true, 0.1);
        assert_eq!(cmd.steering, 0.0);
        assert!(cmd.is_valid());
    }

    #[test]
    fn test_boost_and_speed_estimate() {
        let mut composer = CommandComposer::new(ComposeParams::default(), 1.0);

        // Full lock gives the 0.095 floor, boost lifts it to 0.18
        let (cmd, _) = composer.compose(1.0, true, 0.1);
        assert!((cmd.throttle - 0.18).abs() < 1e-12);

        // Estimate uses the unboosted throttle of the previous tick
        let (_, est_speed) = composer.compose(0.0, false, 0.1);
        assert!((est_speed - (0.095 * 1010.0 + 64.0)).abs() < 1e-9);
    }

    #[test]
    fn test_throttle_rate_limit() {
        let params = ComposeParams {
            max_throttle_increase_per_s: Some(0.5),
            ..Default::default()
        };
        let mut composer = CommandComposer::new(params, 1.0);

        let (cmd, _) = composer.compose(0.0, false, 0.1);
        assert!((cmd.throttle - 0.05).abs() < 1e-12);
        let (cmd, _) = composer.compose(0.0, false, 0.1);
        assert!((cmd.throttle - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_feed_forward_boost() {
        let params = FeedForwardParams::default();

        // Early in a long predicted straight
        let p = [entry(Straight, 2.0), entry(Left, 1.0)];
        assert!(feed_forward(Some(&p), 0.5, &params).boost);
        assert!(!feed_forward(Some(&p), 1.0, &params).boost);

        // Short straight doesn't boost
        let p = [entry(Straight, 1.0), entry(Left, 1.0)];
        assert!(!feed_forward(Some(&p), 0.1, &params).boost);

        // Late in a turn leading onto a straight
        let p = [entry(Left, 1.0), entry(Straight, 1.5)];
        assert!(feed_forward(Some(&p), 0.5, &params).boost);
        assert!(!feed_forward(Some(&p), 0.2, &params).boost);

        assert_eq!(feed_forward(None, 0.5, &params), FeedForward::default());
    }

    #[test]
    fn test_feed_forward_offset() {
        let params = FeedForwardParams::default();

        // On a straight before a right turn
        let p = [entry(Straight, 1.0), entry(Right, 1.0)];
        assert_eq!(feed_forward(Some(&p), 0.3, &params).offset, 0.1);

        // Before a left turn, and too close to the end of the straight
        let p = [entry(Straight, 1.0), entry(Left, 1.0)];
        assert_eq!(feed_forward(Some(&p), 0.3, &params).offset, -0.1);
        assert_eq!(feed_forward(Some(&p), 0.7, &params).offset, 0.0);

        // Leaving a right turn onto a straight
        let p = [entry(Right, 1.0), entry(Straight, 1.0)];
        assert_eq!(feed_forward(Some(&p), 0.3, &params).offset, 0.06);
        let p = [entry(Left, 1.0), entry(Straight, 1.0)];
        assert_eq!(feed_forward(Some(&p), 0.3, &params).offset, -0.06);
        assert_eq!(feed_forward(Some(&p), 0.2, &params).offset, 0.0);

        // Disabled
        let disabled = FeedForwardParams {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(feed_forward(Some(&p), 0.3, &disabled), FeedForward::default());
    }
}
