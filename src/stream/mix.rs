//! Mixing the outputs of the technologies supplying a stream.
//!
//! Each technology's share of the stream is its production over the stream's total production.
//! Production is first floored, either smoothly (so shares stay differentiable) or with a hard
//! cutoff which can leave a year with no active technology at all.
use crate::id::TechnoID;
use crate::scalar::{Scalar, safe_div};
use crate::smooth::exp_min_floor;
use crate::year::YearlySeries;
use ::log::warn;
use indexmap::IndexMap;
use std::ops::RangeInclusive;

/// Production below which a technology is considered inactive (TWh or Mt)
pub const MIN_PROD: f64 = 1e-3;

/// Shares below this fraction of the stream are dropped
pub const WEIGHT_TOLERANCE: f64 = 1e-3;

/// Yearly series for each technology of a stream
pub type TechnoSeries<T> = IndexMap<TechnoID, YearlySeries<T>>;

/// How low production is floored before computing shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoffPolicy {
    /// Smoothly floor production at [`MIN_PROD`]
    #[default]
    ExpMin,
    /// Zero production at or below [`MIN_PROD`]
    HardCutoff,
}

impl CutoffPolicy {
    /// The policy for a stream configured with or without the exponential floor
    pub fn from_exp_min(exp_min: bool) -> Self {
        if exp_min {
            Self::ExpMin
        } else {
            Self::HardCutoff
        }
    }

    /// Floor a technology's production according to this policy
    pub fn apply<T: Scalar>(self, production: &YearlySeries<T>) -> YearlySeries<T> {
        match self {
            Self::ExpMin => production.map(|value| exp_min_floor(value, MIN_PROD)),
            Self::HardCutoff => production.map(|value| {
                if value.re() <= MIN_PROD {
                    T::zero()
                } else {
                    value
                }
            }),
        }
    }
}

/// The share of each technology in a stream, in percent
#[derive(Debug, Clone, PartialEq)]
pub struct MixWeights<T>(pub TechnoSeries<T>);

impl<T: Scalar> MixWeights<T> {
    /// The weights of one technology
    pub fn get(&self, id: &TechnoID) -> Option<&YearlySeries<T>> {
        self.0.get(id)
    }

    /// Iterate over the weights of every technology
    pub fn iter(&self) -> impl Iterator<Item = (&TechnoID, &YearlySeries<T>)> {
        self.0.iter()
    }

    /// Sum of the weights over technologies
    pub fn total(&self, years: &RangeInclusive<u32>) -> YearlySeries<T> {
        YearlySeries::sum_over(years, self.0.values())
    }

    /// Average `values` over technologies, weighted by the mix
    pub fn weighted_average(
        &self,
        values: &TechnoSeries<T>,
        years: &RangeInclusive<u32>,
    ) -> YearlySeries<T> {
        let hundred = T::from_real(100.0);
        let weighted: Vec<_> = self
            .0
            .iter()
            .filter_map(|(id, weight)| {
                let value = values.get(id)?;
                Some(weight.zip_map(value, |weight, value| weight / hundred * value))
            })
            .collect();
        YearlySeries::sum_over(years, &weighted)
    }
}

/// Compute the share of each technology in a stream.
///
/// # Arguments
///
/// * `production` - Floored production of each technology
/// * `total` - Total production the shares are relative to
/// * `prices` - Price of each technology, used when no technology is active
/// * `years` - The model years
pub fn compute_mix_weights<T: Scalar>(
    production: &TechnoSeries<T>,
    total: &YearlySeries<T>,
    prices: &TechnoSeries<T>,
    years: &RangeInclusive<u32>,
) -> MixWeights<T> {
    let hundred = T::from_real(100.0);
    let mut weights: TechnoSeries<T> = production
        .iter()
        .map(|(id, production)| {
            let share = production.zip_map(total, |production, total| {
                let share = safe_div(production, total);
                if share.re() < WEIGHT_TOLERANCE {
                    T::zero()
                } else {
                    share * hundred
                }
            });
            (id.clone(), share)
        })
        .collect();

    for (idx, year) in years.clone().enumerate() {
        if total.values()[idx].re() > 0.0 {
            continue;
        }

        let winner = cheapest_techno(prices, year);
        match &winner {
            Some(id) => warn!("No technology is active in {year}: {id} takes the whole mix"),
            None => warn!("No technology is active in {year} and none has a positive price"),
        }
        for (id, series) in &mut weights {
            let weight = if Some(id) == winner.as_ref() {
                hundred
            } else {
                T::zero()
            };
            *series = series.map_with_year(|y, value| if y == year { weight } else { value });
        }
    }

    MixWeights(weights)
}

/// The technology with the lowest strictly positive price in `year`, first one on ties
fn cheapest_techno<T: Scalar>(prices: &TechnoSeries<T>, year: u32) -> Option<TechnoID> {
    prices
        .iter()
        .filter_map(|(id, price)| Some((id, price.get(year)?.re())))
        .filter(|(_, price)| *price > 0.0)
        .fold(None, |best: Option<(&TechnoID, f64)>, (id, price)| match best {
            Some((_, lowest)) if lowest <= price => best,
            _ => Some((id, price)),
        })
        .map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    const YEARS: RangeInclusive<u32> = 2020..=2021;

    fn series(values: [f64; 2]) -> YearlySeries<f64> {
        YearlySeries::new(2020, values.to_vec())
    }

    #[rstest]
    #[case(CutoffPolicy::ExpMin, [MIN_PROD * (0.9 + (-1.0f64).exp() / 10.0), 5.0])]
    #[case(CutoffPolicy::HardCutoff, [0.0, 5.0])]
    fn test_cutoff_policy(#[case] policy: CutoffPolicy, #[case] expected: [f64; 2]) {
        let floored = policy.apply(&series([0.0, 5.0]));
        for (value, expected) in floored.values().iter().zip(expected) {
            assert_approx_eq!(f64, *value, expected, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_hard_cutoff_at_min_prod() {
        let floored = CutoffPolicy::HardCutoff.apply(&series([MIN_PROD, 2.0 * MIN_PROD]));
        assert_eq!(floored, series([0.0, 2.0 * MIN_PROD]));
    }

    #[test]
    fn test_mix_weights() {
        let production = indexmap! {
            "PV".into() => series([60.0, 99.95]),
            "Wind".into() => series([40.0, 0.05]),
        };
        let total = series([100.0, 100.0]);
        let weights = compute_mix_weights(&production, &total, &TechnoSeries::new(), &YEARS);

        // Shares below 0.1% are dropped
        let pv = weights.get(&"PV".into()).unwrap();
        assert_approx_eq!(f64, pv.values()[0], 60.0, epsilon = 1e-9);
        assert_approx_eq!(f64, pv.values()[1], 99.95, epsilon = 1e-9);
        let wind = weights.get(&"Wind".into()).unwrap();
        assert_approx_eq!(f64, wind.values()[0], 40.0, epsilon = 1e-9);
        assert_eq!(wind.values()[1], 0.0);
        for value in weights.total(&YEARS).values() {
            assert!(*value >= 0.0 && *value <= 100.0 + 1e-9);
        }
    }

    #[test]
    fn test_winner_takes_all() {
        let production = indexmap! {
            "A".into() => series([0.0, 3.0]),
            "B".into() => series([0.0, 1.0]),
            "C".into() => series([0.0, 0.0]),
        };
        let total = series([0.0, 4.0]);
        let prices = indexmap! {
            "A".into() => series([12.0, 12.0]),
            "B".into() => series([10.0, 10.0]),
            "C".into() => series([0.0, 0.0]),
        };
        let weights = compute_mix_weights(&production, &total, &prices, &YEARS);
        assert_eq!(weights.get(&"A".into()), Some(&series([0.0, 75.0])));
        assert_eq!(weights.get(&"B".into()), Some(&series([100.0, 25.0])));
        assert_eq!(weights.get(&"C".into()), Some(&series([0.0, 0.0])));
    }

    #[test]
    fn test_winner_ties_go_to_first() {
        let prices = indexmap! {
            "A".into() => series([10.0, 10.0]),
            "B".into() => series([10.0, 10.0]),
        };
        assert_eq!(cheapest_techno(&prices, 2020), Some("A".into()));
    }

    #[test]
    fn test_no_positive_price() {
        let production = indexmap! {"A".into() => series([0.0, 0.0])};
        let prices = indexmap! {"A".into() => series([0.0, -1.0])};
        let weights = compute_mix_weights(&production, &series([0.0, 0.0]), &prices, &YEARS);
        assert_eq!(weights.get(&"A".into()), Some(&series([0.0, 0.0])));
    }

    #[test]
    fn test_weighted_average() {
        let weights = MixWeights(indexmap! {
            "A".into() => series([50.0, 100.0]),
            "B".into() => series([50.0, 0.0]),
        });
        let prices = indexmap! {
            "A".into() => series([10.0, 10.0]),
            "B".into() => series([30.0, 30.0]),
        };
        assert_eq!(weights.weighted_average(&prices, &YEARS), series([20.0, 10.0]));
    }
}
