//! Capping technologies whose output is limited by an external supply.
//!
//! Some technologies can only produce as much as an external source allows: flue-gas capture
//! cannot capture more CO2 than the flue gas contains. When the technologies of such a group
//! request more than is available, all of them are scaled down by the same factor.
use super::mix::MIN_PROD;
use crate::id::TechnoID;
use crate::scalar::{Scalar, maximum, safe_div};
use crate::smooth::{d_exp_min_floor, exp_min_floor};
use crate::year::YearlySeries;
use ::log::warn;

/// How a stream's technologies are limited by external supply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaturationPolicy {
    /// Technologies are never limited
    #[default]
    None,
    /// The production of the group is capped by the available supply
    ExponentialCap {
        /// Technologies sharing the supply
        group: Vec<TechnoID>,
    },
}

impl SaturationPolicy {
    /// Technologies limited by this policy
    pub fn group(&self) -> &[TechnoID] {
        match self {
            Self::None => &[],
            Self::ExponentialCap { group } => group,
        }
    }
}

/// Smallest value of `1 - ratio` fed to the floor
fn lower_bound() -> f64 {
    1e-30_f64.ln() * MIN_PROD
}

/// The fraction of requested production that can go ahead, for a supply/demand ratio.
///
/// Below a ratio of about `1 - MIN_PROD` this is the ratio itself; above it the shortfall is
/// smoothly floored at about `MIN_PROD`. A ratio of 1 or more means supply meets demand.
pub fn effective_percentage<T: Scalar>(ratio: T) -> T {
    if ratio.re() >= 1.0 {
        return T::one();
    }

    let shortfall = maximum(T::one() - ratio, T::from_real(lower_bound()));
    T::one() - exp_min_floor(shortfall, MIN_PROD)
}

/// Derivative of [`effective_percentage`] with respect to `ratio`
pub fn d_effective_percentage<T: Scalar>(ratio: T) -> T {
    if ratio.re() >= 1.0 {
        return T::zero();
    }

    let shortfall = T::one() - ratio;
    if shortfall.re() < lower_bound() {
        return T::zero();
    }

    // d(1 - floor(1 - r))/dr = floor'(1 - r)
    d_exp_min_floor(shortfall, MIN_PROD)
}

/// The factor applied to a group's production in each year
pub fn saturation_factor<T: Scalar>(
    requested: &YearlySeries<T>,
    available: &YearlySeries<T>,
) -> YearlySeries<T> {
    requested.zip_map(available, |requested, available| {
        if available.re() >= requested.re() {
            T::one()
        } else {
            effective_percentage(safe_div(available, requested))
        }
    })
}

/// Log the years in which a group is limited
pub(super) fn log_limited_years<T: Scalar>(stream: &str, factor: &YearlySeries<T>) {
    let limited: Vec<_> = factor
        .iter()
        .filter(|(_, value)| value.re() < 1.0)
        .map(|(year, _)| year.to_string())
        .collect();
    if !limited.is_empty() {
        warn!(
            "Production of stream {stream} is limited by available supply in {}",
            limited.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use num_complex::Complex64;
    use rstest::rstest;

    #[test]
    fn test_ratio_passes_through_when_well_below_one() {
        assert_approx_eq!(
            f64,
            effective_percentage(100.0 / 150.0),
            100.0 / 150.0,
            epsilon = 1e-12
        );
        assert_eq!(effective_percentage(0.0), 0.0);
    }

    #[rstest]
    #[case(1.0)]
    #[case(1.5)]
    fn test_no_limit_when_supply_meets_demand(#[case] ratio: f64) {
        assert_eq!(effective_percentage(ratio), 1.0);
        assert_eq!(d_effective_percentage(ratio), 0.0);
    }

    #[test]
    fn test_monotonic() {
        let values: Vec<f64> = (0..=10_000)
            .map(|i| effective_percentage(f64::from(i) / 10_000.0))
            .collect();
        for pair in values.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(values.iter().all(|value| (0.0..=1.0).contains(value)));
    }

    #[test]
    fn test_shortfall_is_floored_near_one() {
        let effective = effective_percentage(0.9999);
        assert!(effective < 1.0 - 0.9 * MIN_PROD);
        assert!(effective > 1.0 - MIN_PROD);
    }

    #[rstest]
    #[case(0.2)]
    #[case(0.667)]
    #[case(0.9985)]
    #[case(0.9995)]
    #[case(0.99999)]
    fn test_derivative_matches_complex_step(#[case] ratio: f64) {
        let h = 1e-20;
        let complex_step = effective_percentage(Complex64::new(ratio, h)).im / h;
        assert_approx_eq!(
            f64,
            d_effective_percentage(ratio),
            complex_step,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_saturation_factor() {
        let requested = YearlySeries::new(2020, vec![150.0, 80.0, 0.0]);
        let available = YearlySeries::new(2020, vec![100.0, 100.0, 0.0]);
        let factor = saturation_factor(&requested, &available);
        assert_approx_eq!(f64, factor.values()[0], 100.0 / 150.0, epsilon = 1e-12);
        assert_eq!(factor.values()[1], 1.0);
        assert_eq!(factor.values()[2], 1.0);
    }

    #[test]
    fn test_policy_group() {
        assert!(SaturationPolicy::None.group().is_empty());
        let policy = SaturationPolicy::ExponentialCap {
            group: vec!["FlueGasCapture".into()],
        };
        assert_eq!(policy.group(), [TechnoID::new("FlueGasCapture")]);
    }
}
