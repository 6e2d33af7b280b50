//! Layout epsilon helpers and DPI rounding.

/// Absolute tolerance used by track comparisons.
pub(crate) const EPSILON: f64 = 1e-5;

/// Star weights are clipped to this value before summation.
pub(crate) const STAR_CLIP: f64 = 1e38;

/// Upper bound on rounds of the auto/star cross-axis loop.
pub(crate) const LAYOUT_LOOP_MAX: usize = 5;

#[inline]
pub(crate) fn are_close(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

#[inline]
pub(crate) fn is_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// Relative comparison used for child desired-size change detection.
pub(crate) fn double_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let eps = (a.abs() + b.abs() + 10.0) * f64::EPSILON;
    let delta = a - b;
    -eps < delta && eps > delta
}

/// Round a length to the nearest device pixel for the given DPI scale.
///
/// Falls back to the unrounded value when scaling produces a non-finite result.
pub(crate) fn round_layout_value(value: f64, dpi_scale: f64) -> f64 {
    if !double_close(dpi_scale, 1.0) {
        let rounded = (value * dpi_scale).round_ties_even() / dpi_scale;
        if rounded.is_finite() && rounded != f64::MAX {
            rounded
        } else {
            value
        }
    } else {
        value.round_ties_even()
    }
}
