//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Linearly interpolate `value` over a piecewise-linear curve.
///
/// `points` must be sorted by ascending `x`. Outside the curve's domain the
/// first or last `y` is returned. An empty curve gives `None`.
pub fn interp_piecewise<T>(points: &[(T, T)], value: T) -> Option<T>
where
    T: Float,
{
    let first = points.first()?;
    let last = points.last()?;

    if value <= first.0 {
        return Some(first.1);
    }
    if value >= last.0 {
        return Some(last.1);
    }

    for pair in points.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if value <= hi.0 {
            // Repeated x values form a step, take the upper side
            if hi.0 == lo.0 {
                return Some(hi.1);
            }
            return Some(lin_map((lo.0, hi.0), (lo.1, hi.1), value));
        }
    }

    Some(last.1)
}

/// Clamp a value into `[min, max]`.
///
/// Unlike `f64::clamp` this never panics, if `min > max` the result is `min`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Normalise an angle in degrees into the range (-180, 180].
pub fn wrap_angle_deg<T>(angle: T) -> T
where
    T: Float,
{
    let full = T::from(360.0).unwrap_or_else(T::nan);
    let half = T::from(180.0).unwrap_or_else(T::nan);

    let wrapped = rem_euclid(angle + half, full) - half;

    // rem_euclid maps +180 onto -180, flip it back onto the closed end
    if wrapped <= -half {
        wrapped + full
    } else {
        wrapped
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}
