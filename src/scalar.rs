//! A numeric abstraction letting the same model code run on real and complex numbers.
//!
//! The host platform verifies gradients by complex-step differentiation: an input is perturbed by
//! a tiny imaginary step and the derivative is read back from the imaginary part of the output.
//! For that to work every arithmetic operation must carry the imaginary part along, while every
//! branch decision (comparisons, `min`, `max`) must be taken on the real part only. All model code
//! is therefore generic over [`Scalar`] and routes its decisions through [`real_part`],
//! [`maximum`] and [`minimum`].
use num_complex::Complex64;
use num_traits::{Num, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;
use std::ops::Neg;

/// A number the models can compute with: either `f64` or `Complex64`.
pub trait Scalar:
    Copy + Debug + Default + PartialEq + Num + NumAssign + Neg<Output = Self> + Sum + 'static
{
    /// Lift a real constant into this numeric type
    fn from_real(value: f64) -> Self;
    /// The real part of the value
    fn re(self) -> f64;
    /// Exponential function
    fn exp(self) -> Self;
    /// Natural logarithm
    fn ln(self) -> Self;
    /// Raise to a real power
    fn powf(self, exponent: f64) -> Self;
    /// Raise to an integer power
    fn powi(self, exponent: i32) -> Self;
    /// Whether all components are finite
    fn is_finite(self) -> bool;
}

impl Scalar for f64 {
    fn from_real(value: f64) -> Self {
        value
    }

    fn re(self) -> f64 {
        self
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn powf(self, exponent: f64) -> Self {
        f64::powf(self, exponent)
    }

    fn powi(self, exponent: i32) -> Self {
        f64::powi(self, exponent)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

impl Scalar for Complex64 {
    fn from_real(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    fn re(self) -> f64 {
        self.re
    }

    fn exp(self) -> Self {
        Complex64::exp(self)
    }

    fn ln(self) -> Self {
        Complex64::ln(self)
    }

    fn powf(self, exponent: f64) -> Self {
        Complex64::powf(self, exponent)
    }

    fn powi(self, exponent: i32) -> Self {
        Complex64::powi(&self, exponent)
    }

    fn is_finite(self) -> bool {
        Complex64::is_finite(self)
    }
}

/// The real part of `value`, used for every branch decision
pub fn real_part<T: Scalar>(value: T) -> f64 {
    value.re()
}

/// The larger of two values, compared on their real parts.
///
/// The selected operand is returned unchanged, imaginary part included.
pub fn maximum<T: Scalar>(a: T, b: T) -> T {
    if real_part(a) >= real_part(b) { a } else { b }
}

/// The smaller of two values, compared on their real parts
pub fn minimum<T: Scalar>(a: T, b: T) -> T {
    if real_part(a) <= real_part(b) { a } else { b }
}

/// Replace non-finite values with zero.
///
/// This is the numeric-degeneracy policy for ratios whose denominator may vanish.
pub fn finite_or_zero<T: Scalar>(value: T) -> T {
    if value.is_finite() { value } else { T::zero() }
}

/// Divide, returning zero when the result is not finite
pub fn safe_div<T: Scalar>(numerator: T, denominator: T) -> T {
    if denominator == T::zero() {
        return T::zero();
    }
    finite_or_zero(numerator / denominator)
}
