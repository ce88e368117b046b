//! General functions related to finance.
use crate::scalar::Scalar;
use crate::year::YearlySeries;

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualize capital costs over the lifetime of an asset.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: f64) -> f64 {
    if lifetime == 0 {
        return 0.0;
    }
    if discount_rate == 0.0 {
        return 1.0 / lifetime as f64;
    }
    let factor = (1.0 + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - 1.0)
}

/// Spread each year's cost evenly over `nb_years` years.
///
/// This is the product of the series with a lower-triangular banded matrix whose band has width
/// `nb_years` and entries `1/nb_years`. Years before the start of the series are taken to have
/// the same cost as the first year.
pub fn amortise<T: Scalar>(costs: &YearlySeries<T>, nb_years: u32) -> YearlySeries<T> {
    if nb_years <= 1 {
        return costs.clone();
    }

    let values = costs.values();
    let weight = T::from_real(1.0 / nb_years as f64);
    YearlySeries::new(
        costs.start(),
        (0..values.len())
            .map(|i| {
                (0..nb_years as usize)
                    .map(|lag| values[i.saturating_sub(lag)] * weight)
                    .sum()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10, 0.0, 0.1)] // Other edge case: discount_rate==0
    #[case(10, 0.05, 0.1295045749654567)]
    #[case(5, 0.03, 0.2183545714005762)]
    fn test_capital_recovery_factor(
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, discount_rate);
        assert_approx_eq!(f64, result, expected, epsilon = 1e-10);
    }

    #[test]
    fn test_amortise() {
        let costs = YearlySeries::new(2020, vec![3.0, 6.0, 9.0, 0.0]);
        let amortised = amortise(&costs, 3);
        let expected = [3.0, 4.0, 6.0, 5.0];
        for (result, expected) in amortised.values().iter().zip(expected) {
            assert_approx_eq!(f64, *result, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_amortise_single_year_is_identity() {
        let costs = YearlySeries::new(2020, vec![3.0, 6.0]);
        assert_eq!(amortise(&costs, 1), costs);
    }
}
