//! Smooth replacements for `min`/`max` used wherever a hard kink would break gradient-based
//! optimisation of the wider model.
use crate::error::ConfigurationError;
use crate::scalar::{Scalar, maximum, minimum, real_part};
use std::str::FromStr;

/// Largest exponent fed to `exp` by the smooth maximum
const MAX_EXP: f64 = 650.0;

/// Smallest exponent fed to `exp` by the smooth maximum (avoids underflow to zero)
const MIN_EXP: f64 = -300.0;

/// Sharpness of the `smooth_max` and `soft_max` kernels
pub const DEFAULT_ALPHA: f64 = 3.0;

/// Sharpness of the `cons_smooth_max` kernel
pub const CONSERVATIVE_ALPHA: f64 = 1e16;

/// The kernel used to compute a smoothed minimum of several ratios
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display, strum::AsRefStr,
)]
pub enum SmoothingKernel {
    /// Exponentially weighted average of the values
    #[default]
    #[strum(serialize = "smooth_max")]
    SmoothMax,
    /// Log-sum-exp
    #[strum(serialize = "soft_max")]
    SoftMax,
    /// Weighted average with a very sharp weighting, close to a hard maximum
    #[strum(serialize = "cons_smooth_max")]
    ConservativeSmoothMax,
}

impl SmoothingKernel {
    /// Parse a kernel name, failing with a configuration error for unknown names
    pub fn parse(name: &str) -> Result<Self, ConfigurationError> {
        Self::from_str(name).map_err(|_| ConfigurationError::UnknownSmoothingKernel(name.into()))
    }

    /// Smoothed maximum of `values`
    pub fn maximum<T: Scalar>(self, values: &[T]) -> T {
        match self {
            Self::SmoothMax => smooth_maximum(values, DEFAULT_ALPHA),
            Self::SoftMax => soft_maximum(values, DEFAULT_ALPHA),
            Self::ConservativeSmoothMax => smooth_maximum(values, CONSERVATIVE_ALPHA),
        }
    }

    /// Smoothed minimum of `values`, computed as the negated smoothed maximum of the negatives
    pub fn minimum<T: Scalar>(self, values: &[T]) -> T {
        let negated: Vec<T> = values.iter().map(|value| -*value).collect();
        -self.maximum(&negated)
    }
}

/// Largest real part of `alpha * value`
fn max_scaled_real<T: Scalar>(values: &[T], alpha: f64) -> f64 {
    values
        .iter()
        .map(|value| alpha * real_part(*value))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Exponentially weighted average of `values`, tending to the maximum as `alpha` grows.
///
/// The exponents are shifted so the largest is `MAX_EXP` and floored at `MIN_EXP`. If the weights
/// still vanish, the hard maximum is returned.
pub fn smooth_maximum<T: Scalar>(values: &[T], alpha: f64) -> T {
    assert!(!values.is_empty(), "Cannot take the maximum of no values");

    let shift = T::from_real(max_scaled_real(values, alpha) - MAX_EXP);
    let alpha = T::from_real(alpha);
    let weights: Vec<T> = values
        .iter()
        .map(|value| maximum(T::from_real(MIN_EXP), alpha * *value - shift).exp())
        .collect();

    let denominator: T = weights.iter().copied().sum();
    if denominator == T::zero() {
        return hard_maximum(values);
    }
    let numerator: T = values.iter().zip(&weights).map(|(v, w)| *v * *w).sum();

    numerator / denominator
}

/// Log-sum-exp maximum, shifted by the largest exponent to avoid overflow
pub fn soft_maximum<T: Scalar>(values: &[T], alpha: f64) -> T {
    assert!(!values.is_empty(), "Cannot take the maximum of no values");

    let shift = T::from_real(max_scaled_real(values, alpha));
    let alpha = T::from_real(alpha);
    let total: T = values
        .iter()
        .map(|value| (alpha * *value - shift).exp())
        .sum();

    (shift + total.ln()) / alpha
}

/// Maximum by real part
fn hard_maximum<T: Scalar>(values: &[T]) -> T {
    values
        .iter()
        .copied()
        .reduce(maximum)
        .expect("values is not empty")
}

/// Floor `value` smoothly at `min_value`.
///
/// Values at or above `min_value` pass through. Below it the value is replaced by
/// `min_value/10 * (9 + exp(value/min_value - 1))`, which lies in `(0.9, 1] * min_value` and joins
/// the identity continuously at `min_value`.
pub fn exp_min_floor<T: Scalar>(value: T, min_value: f64) -> T {
    maximum(exp_branch(value, min_value), value)
}

/// The smoothed replacement used below `min_value`
fn exp_branch<T: Scalar>(value: T, min_value: f64) -> T {
    let floor = T::from_real(min_value);
    floor / T::from_real(10.0)
        * (T::from_real(9.0)
            + (minimum(value, floor) / floor).exp() * T::from_real((-1.0f64).exp()))
}

/// Derivative of [`exp_min_floor`] with respect to `value`
pub fn d_exp_min_floor<T: Scalar>(value: T, min_value: f64) -> T {
    if real_part(exp_branch(value, min_value)) < real_part(value) {
        return T::one();
    }

    // The branch only depends on `value` while `value` is below the floor
    if real_part(value) < min_value {
        (value / T::from_real(min_value)).exp() * T::from_real((-1.0f64).exp() / 10.0)
    } else {
        T::zero()
    }
}
