//! # PID controller
//!
//! PID controller with a low passed derivative, a bounded integrator and
//! conditional integration anti-windup.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Serialize;

use util::maths::clamp;

use super::filters::LowPass;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Derivative gain
    k_d: f64,

    /// Output limits, `(min, max)`
    output_limits: (f64, f64),

    /// Integrator limits, `(min, max)`
    integrator_limits: (f64, f64),

    /// Low pass applied to the raw derivative
    deriv_filter: LowPass,

    /// Last output of the derivative filter
    deriv_filtered: f64,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation, already scaled by `k_i`
    integral: f64,

    /// Terms from the last update
    terms: PidTerms,
}

/// The individual contributions to the last output.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct PidTerms {
    pub p: f64,

    /// The integrator candidate, which is reported even if anti-windup
    /// discarded it.
    pub i: f64,

    pub d: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    ///
    /// Output and integrator are unbounded and the derivative unfiltered
    /// until set otherwise.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            output_limits: (f64::NEG_INFINITY, f64::INFINITY),
            integrator_limits: (f64::NEG_INFINITY, f64::INFINITY),
            deriv_filter: LowPass::new(0.0, 0.0),
            deriv_filtered: 0.0,
            prev_error: 0.0,
            integral: 0.0,
            terms: PidTerms::default(),
        }
    }

    pub fn with_output_limits(mut self, min: f64, max: f64) -> Self {
        self.output_limits = (min, max);
        self
    }

    pub fn with_integrator_limits(mut self, min: f64, max: f64) -> Self {
        self.integrator_limits = (min, max);
        self
    }

    /// Set the time constant of the derivative low pass.
    pub fn with_derivative_tau(mut self, tau: f64) -> Self {
        self.deriv_filter = LowPass::new(tau, 0.0);
        self
    }

    /// Get the value of the controller for the given error, `dt` seconds
    /// after the previous update.
    ///
    /// If the output saturates in the direction of the error the integrator
    /// candidate is discarded. A non-positive or non-finite `dt` skips the
    /// derivative and integral updates and reuses their last values.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        let dt_valid = dt.is_finite() && dt > 0.0;

        let candidate = if dt_valid {
            self.deriv_filtered = self.deriv_filter.filter((error - self.prev_error) / dt);

            clamp(
                self.integral + error * dt * self.k_i,
                self.integrator_limits.0,
                self.integrator_limits.1,
            )
        } else {
            warn!("PID update with invalid dt ({}), holding I and D terms", dt);
            self.integral
        };

        self.prev_error = error;

        self.terms = PidTerms {
            p: self.k_p * error,
            i: candidate,
            d: self.k_d * self.deriv_filtered,
        };

        let raw = self.terms.p + self.terms.i + self.terms.d;
        let (min, max) = self.output_limits;

        // Anti-windup
        let saturated = (raw > max && error > 0.0) || (raw < min && error < 0.0);
        if !saturated {
            self.integral = candidate;
        }

        clamp(raw, min, max)
    }

    /// Terms from the last update.
    pub fn terms(&self) -> PidTerms {
        self.terms
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);
        assert_eq!(pid.update(0.25, 0.1), 0.5);
        assert_eq!(pid.update(-1.0, 0.1), -2.0);
        assert_eq!(pid.terms().p, -2.0);
    }

    #[test]
    fn test_update_rule() {
        // D filter tau 1 gives alpha 0.5
        let mut pid = PidController::new(1.0, 2.0, 0.5).with_derivative_tau(1.0);

        // deriv = 0.4 / 0.1 = 4, filtered 2, d = 1
        // integral = 0.4 * 0.1 * 2 = 0.08
        let out = pid.update(0.4, 0.1);
        let terms = pid.terms();
        assert!((terms.p - 0.4).abs() < 1e-12);
        assert!((terms.i - 0.08).abs() < 1e-12);
        assert!((terms.d - 1.0).abs() < 1e-12);
        assert!((out - 1.48).abs() < 1e-12);
        assert!((pid.integral() - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_integrator_limits() {
        let mut pid = PidController::new(0.0, 1.0, 0.0).with_integrator_limits(-0.25, 0.25);

        for _ in 0..100 {
            pid.update(1.0, 0.1);
            assert!(pid.integral() <= 0.25);
        }
        assert!((pid.integral() - 0.25).abs() < 1e-12);

        for _ in 0..100 {
            pid.update(-1.0, 0.1);
            assert!(pid.integral() >= -0.25);
        }
        assert!((pid.integral() + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_anti_windup() {
        let mut pid = PidController::new(0.5, 1.0, 0.0)
            .with_output_limits(-1.0, 1.0)
            .with_integrator_limits(-10.0, 10.0);

        // Positive error, the output saturates once the integral passes 0.5
        let mut saturated_ticks = 0;
        for _ in 0..50 {
            let before = pid.integral();
            let out = pid.update(1.0, 0.1);
            assert!(out <= 1.0);

            let t = pid.terms();
            if t.p + t.i + t.d > 1.0 {
                // Integral doesn't move while saturated with a matching error
                saturated_ticks += 1;
                assert_eq!(pid.integral(), before);
            } else {
                assert_eq!(pid.integral(), t.i);
            }
        }
        assert!(saturated_ticks > 40);
        assert!(pid.integral() <= 0.5 + 1e-9);

        // An error of the opposite sign unwinds it straight away
        let before = pid.integral();
        pid.update(-0.1, 0.1);
        assert!(pid.integral() < before);
    }

    #[test]
    fn test_degenerate_dt() {
        let mut pid = PidController::new(1.0, 1.0, 1.0).with_output_limits(-1.0, 1.0);
        pid.update(0.2, 0.1);

        let integral = pid.integral();
        let d = pid.terms().d;

        for dt in [0.0, -0.5, f64::NAN, f64::INFINITY].iter() {
            let out = pid.update(0.3, *dt);
            assert!(out.is_finite());
            assert!(out >= -1.0 && out <= 1.0);
            assert_eq!(pid.integral(), integral);
            assert_eq!(pid.terms().d, d);
        }

        // Previous error still tracks the latest input
        assert_eq!(pid.prev_error(), 0.3);
    }
}
