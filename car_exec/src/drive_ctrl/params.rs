//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{compose::ThrottleCurve, DriveCtrlError};
use crate::{
    per::{
        target::{BlobSelection, TargetMode},
        ErrorStrategy, PerParams,
    },
    turn::TurnParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drive control.
///
/// Every section may be left out of the parameter file, in which case its
/// defaults are used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    // ---- PERCEPTION ----
    pub per: PerParams,

    // ---- CONTROL ----
    pub pid: PidParams,

    // ---- TURNS ----
    pub turn: TurnParams,

    // ---- OUTPUT ----
    pub compose: ComposeParams,
}

/// Steering PID parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PidParams {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Time constant of the derivative low pass.
    pub deriv_lowpass_tau: f64,

    /// Largest steering demand in either direction, at most 1.
    pub max_steering: f64,

    /// Integrator limits as a fraction of `max_steering`.
    pub integrator_max_factor: f64,
}

/// Command composition parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposeParams {
    pub throttle_curve: ThrottleCurve,

    /// Throttle ceiling, at most 1.
    pub max_throttle: f64,

    /// Amount added to the throttle when boosting.
    pub boost_bump: f64,

    /// Minimum throttle while boosting.
    pub boost_floor: f64,

    /// Units: throttle per second, `None` for no limit
    pub max_throttle_increase_per_s: Option<f64>,

    /// Units: throttle per second, `None` for no limit
    pub max_throttle_decrease_per_s: Option<f64>,

    /// Number of ticks of throttle averaged for the speed estimate.
    pub speed_window: usize,

    /// Units: encoder counts per second per unit throttle
    pub speed_gain: f64,

    /// Units: encoder counts per second
    pub speed_offset: f64,

    pub feed_forward: FeedForwardParams,
}

/// Thresholds for the predicted turn feed forward.
///
/// Times are in seconds, fractions are of the first predicted segment's
/// duration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedForwardParams {
    pub enabled: bool,

    /// Boost while less than this fraction of a predicted straight has passed.
    pub boost_elapsed_frac: f64,

    /// Predicted straights must be longer than this to boost.
    pub boost_min_straight_s: f64,

    /// Boost once more than this fraction of a segment leading onto a
    /// straight has passed.
    pub boost_next_elapsed_frac: f64,

    /// The segment and the straight after it must together last longer than
    /// this.
    pub boost_next_min_total_s: f64,

    /// Predicted straights must be longer than this to offset.
    pub offset_min_straight_s: f64,

    /// Time in the straight before the offset starts.
    pub offset_min_elapsed_s: f64,

    /// The offset stops when less than this time of the straight remains.
    pub offset_min_remaining_s: f64,

    /// Offset on a straight, towards the outside of the next turn.
    pub straight_offset: f64,

    /// Fraction of a turn passed before the exit offset applies.
    pub exit_elapsed_frac: f64,

    /// Offset while leaving a turn onto a straight.
    pub exit_offset: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PidParams {
    fn default() -> Self {
        Self {
            k_p: 0.75,
            k_i: 0.0,
            k_d: 1.0 / 35.0,
            deriv_lowpass_tau: 0.5,
            max_steering: 1.0,
            integrator_max_factor: 0.25,
        }
    }
}

impl Default for ComposeParams {
    fn default() -> Self {
        Self {
            throttle_curve: ThrottleCurve::default(),
            max_throttle: 0.275,
            boost_bump: 0.02,
            boost_floor: 0.18,
            max_throttle_increase_per_s: None,
            max_throttle_decrease_per_s: None,
            speed_window: 8,
            speed_gain: 1010.0,
            speed_offset: 64.0,
            feed_forward: FeedForwardParams::default(),
        }
    }
}

impl Default for FeedForwardParams {
    fn default() -> Self {
        Self {
            enabled: true,
            boost_elapsed_frac: 0.45,
            boost_min_straight_s: 1.2,
            boost_next_elapsed_frac: 0.35,
            boost_next_min_total_s: 2.0,
            offset_min_straight_s: 0.65,
            offset_min_elapsed_s: 0.25,
            offset_min_remaining_s: 0.35,
            straight_offset: 0.1,
            exit_elapsed_frac: 0.25,
            exit_offset: 0.06,
        }
    }
}

impl Params {
    /// Check the parameters are usable, returning the first problem found.
    pub fn validate(&self) -> Result<(), DriveCtrlError> {
        let per = &self.per;

        check(per.blob.min_blob_size >= 1, "per.blob.min_blob_size must be at least 1")?;
        check(
            per.target.hold_decay_px.is_finite() && per.target.hold_decay_px >= 0.0,
            "per.target.hold_decay_px must be non-negative",
        )?;
        check_tau(per.target.target_lowpass_tau, "per.target.target_lowpass_tau")?;
        check_tau(per.bearing.error_lowpass_tau, "per.bearing.error_lowpass_tau")?;

        if let BlobSelection::Percentile(p) = per.target.selection {
            check((0.0..=1.0).contains(&p), "per.target.selection percentile must be in [0, 1]")?;
        }
        if let TargetMode::Blend { tip_weight, .. } = per.target.mode {
            check(
                (0.0..=1.0).contains(&tip_weight),
                "per.target.mode tip_weight must be in [0, 1]",
            )?;
        }

        if per.bearing.strategy == ErrorStrategy::ColorRatio {
            check(
                per.bearing.track_left_color != per.bearing.track_right_color,
                "per.bearing track colours must differ",
            )?;
            if let Some(end) = per.bearing.band_end {
                check(
                    end > per.bearing.band_start,
                    "per.bearing.band_end must be after band_start",
                )?;
            }
            check(per.bearing.rows_to_sample >= 1, "per.bearing.rows_to_sample must be at least 1")?;
        }
        check(per.bearing.bearing_gain.is_finite(), "per.bearing.bearing_gain must be finite")?;
        if let Some(origin) = per.bearing.origin {
            check_finite(&origin, "per.bearing.origin")?;
        }
        check(
            per.overlay.line_length_px.is_finite() && per.overlay.line_length_px >= 0.0,
            "per.overlay.line_length_px must be non-negative",
        )?;

        let pid = &self.pid;
        check(
            pid.max_steering > 0.0 && pid.max_steering <= 1.0,
            "pid.max_steering must be in (0, 1]",
        )?;
        check(
            pid.integrator_max_factor.is_finite() && pid.integrator_max_factor >= 0.0,
            "pid.integrator_max_factor must be non-negative",
        )?;
        check_tau(pid.deriv_lowpass_tau, "pid.deriv_lowpass_tau")?;
        check(
            pid.k_p.is_finite() && pid.k_i.is_finite() && pid.k_d.is_finite(),
            "pid gains must be finite",
        )?;

        let turn = &self.turn;
        check(turn.smoothing_window >= 1, "turn.smoothing_window must be at least 1")?;
        check(turn.history_len >= 1, "turn.history_len must be at least 1")?;
        check(turn.pattern_len >= 1, "turn.pattern_len must be at least 1")?;
        check(turn.hysteresis_s >= 0.0, "turn.hysteresis_s must be non-negative")?;
        check(turn.steer_threshold >= 0.0, "turn.steer_threshold must be non-negative")?;

        let compose = &self.compose;
        check(
            compose.max_throttle >= 0.0 && compose.max_throttle <= 1.0,
            "compose.max_throttle must be in [0, 1]",
        )?;
        check(compose.speed_window >= 1, "compose.speed_window must be at least 1")?;
        check_finite(&[compose.boost_bump, compose.boost_floor], "compose boost values")?;
        check_finite(&[compose.speed_gain, compose.speed_offset], "compose speed values")?;

        let ff = &compose.feed_forward;
        check_finite(
            &[
                ff.boost_elapsed_frac,
                ff.boost_min_straight_s,
                ff.boost_next_elapsed_frac,
                ff.boost_next_min_total_s,
                ff.offset_min_straight_s,
                ff.offset_min_elapsed_s,
                ff.offset_min_remaining_s,
                ff.straight_offset,
                ff.exit_elapsed_frac,
                ff.exit_offset,
            ],
            "compose.feed_forward values",
        )?;
        for (rate, name) in [
            (compose.max_throttle_increase_per_s, "increase"),
            (compose.max_throttle_decrease_per_s, "decrease"),
        ]
        .iter()
        {
            if let Some(r) = rate {
                check(
                    *r > 0.0,
                    &format!("compose.max_throttle_{}_per_s must be positive", name),
                )?;
            }
        }

        match compose.throttle_curve {
            ThrottleCurve::Linear {
                base,
                increment,
                dropoff,
            } => {
                check_finite(&[base, increment, dropoff], "compose.throttle_curve values")?;
                check(dropoff > 0.0, "compose.throttle_curve dropoff must be positive")?
            }
            ThrottleCurve::Lookup(ref points) => {
                check(!points.is_empty(), "compose.throttle_curve needs at least one point")?;
                check(
                    points.iter().all(|(x, y)| x.is_finite() && y.is_finite()),
                    "compose.throttle_curve points must be finite",
                )?;
                check(
                    points.windows(2).all(|w| w[0].0 <= w[1].0),
                    "compose.throttle_curve points must be sorted by steering",
                )?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check(ok: bool, msg: &str) -> Result<(), DriveCtrlError> {
    if ok {
        Ok(())
    } else {
        Err(DriveCtrlError::InvalidParams(msg.to_string()))
    }
}

fn check_finite(values: &[f64], name: &str) -> Result<(), DriveCtrlError> {
    check(
        values.iter().all(|v| v.is_finite()),
        &format!("{} must be finite", name),
    )
}

fn check_tau(tau: f64, name: &str) -> Result<(), DriveCtrlError> {
    check(
        tau.is_finite() && tau >= 0.0,
        &format!("{} must be non-negative", name),
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let params: Params = util::params::from_str(
            r#"
            [pid]
            k_p = 0.5
            max_steering = 0.8

            [per.bearing]
            strategy = "ColorRatio"

            [per.target]
            mode = { Tip = "Leftmost" }

            [compose]
            throttle_curve = { Lookup = [[0.0, 0.235], [0.2, 0.15], [0.4, 0.095]] }
            "#,
        )
        .unwrap();

        assert_eq!(params.pid.k_p, 0.5);
        assert_eq!(params.pid.max_steering, 0.8);
        assert!((params.pid.k_d - 1.0 / 35.0).abs() < 1e-12);
        assert_eq!(params.per.bearing.strategy, ErrorStrategy::ColorRatio);
        assert_eq!(
            params.per.target.mode,
            TargetMode::Tip(crate::per::target::TipMode::Leftmost)
        );
        assert_eq!(params.turn.history_len, 35);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid() {
        let mut params = Params::default();
        params.pid.max_steering = 1.5;
        assert!(matches!(params.validate(), Err(DriveCtrlError::InvalidParams(_))));

        let mut params = Params::default();
        params.compose.throttle_curve = ThrottleCurve::Lookup(vec![(0.4, 0.1), (0.0, 0.2)]);
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.turn.smoothing_window = 0;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.per.bearing.error_lowpass_tau = -1.0;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.compose.max_throttle_decrease_per_s = Some(0.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let invalid: [fn(&mut Params); 13] = [
            |p| p.compose.throttle_curve = ThrottleCurve::Lookup(vec![(0.0, f64::NAN)]),
            |p| p.compose.throttle_curve = ThrottleCurve::Lookup(vec![(f64::NAN, 0.2)]),
            |p| {
                p.compose.throttle_curve = ThrottleCurve::Linear {
                    base: f64::INFINITY,
                    increment: 0.1,
                    dropoff: 0.3,
                }
            },
            |p| p.compose.boost_bump = f64::NAN,
            |p| p.compose.boost_floor = f64::INFINITY,
            |p| p.compose.speed_gain = f64::NAN,
            |p| p.compose.speed_offset = f64::NEG_INFINITY,
            |p| p.compose.feed_forward.straight_offset = f64::NAN,
            |p| p.compose.feed_forward.boost_min_straight_s = f64::NAN,
            |p| p.compose.feed_forward.exit_elapsed_frac = f64::INFINITY,
            |p| p.per.bearing.origin = Some([f64::NAN, 47.0]),
            |p| p.per.overlay.line_length_px = f64::INFINITY,
            |p| p.per.overlay.line_length_px = -1.0,
        ];

        for (i, set) in invalid.iter().enumerate() {
            let mut params = Params::default();
            set(&mut params);
            assert!(
                matches!(params.validate(), Err(DriveCtrlError::InvalidParams(_))),
                "case {} accepted",
                i
            );
        }

        let mut params = Params::default();
        params.per.bearing.origin = Some([31.5, 47.0]);
        assert!(params.validate().is_ok());
    }
}
