//! Cohort aging: from yearly investments to the production of every vintage of a technology.
//!
//! The installed fleet is made of cohorts. The legacy fleet, present before the first model year,
//! is spread over ages according to an [`AgeDistribution`]. Every model year adds a new cohort
//! whose size is the investment divided by the capex of that year; it starts producing after the
//! construction delay. A cohort produces its full size until it reaches the technology's lifetime.
use crate::scalar::{Scalar, safe_div};
use crate::techno::config::TechnoConfig;
use crate::year::YearlySeries;
use anyhow::{Result, ensure};

/// The share of the legacy fleet at each age, in percent
#[derive(Debug, Clone, PartialEq)]
pub struct AgeDistribution(Vec<f64>);

impl AgeDistribution {
    /// Distribution over ages `1..lifetime` with weights decaying as `exp(-decay * (age - 1))`
    pub fn from_decay(lifetime: u32, decay: f64) -> Self {
        Self::normalised((1..lifetime).map(|age| (-decay * f64::from(age - 1)).exp()))
    }

    /// Distribution over ages `1..lifetime` from explicit weights, renormalised to 100%
    pub fn from_weights(lifetime: u32, weights: &[f64]) -> Result<Self> {
        ensure!(
            weights.len() + 1 == lifetime as usize,
            "Expected {} entries (one per age below the lifetime), found {}",
            lifetime.saturating_sub(1),
            weights.len()
        );
        ensure!(
            weights.iter().all(|&w| w.is_finite() && w >= 0.0),
            "Weights must be finite and non-negative"
        );
        ensure!(
            weights.iter().sum::<f64>() > 0.0,
            "At least one weight must be positive"
        );

        Ok(Self::normalised(weights.iter().copied()))
    }

    fn normalised<I>(weights: I) -> Self
    where
        I: Iterator<Item = f64>,
    {
        let weights: Vec<f64> = weights.collect();
        let total: f64 = weights.iter().sum();
        Self(weights.into_iter().map(|w| 100.0 * w / total).collect())
    }

    /// Number of ages covered
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the distribution covers no ages
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(age, percentage)` pairs, starting at age 1
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        (1..).zip(self.0.iter().copied())
    }
}

/// Production of one cohort at one age
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortRecord<T> {
    /// The year of production
    pub year: u32,
    /// The age of the cohort in that year
    pub age: u32,
    /// The production of the cohort
    pub production: T,
}

/// The results of aging a technology's fleet
#[derive(Debug, Clone, PartialEq)]
pub struct AgingOutcome<T> {
    /// Total production per year
    pub production: YearlySeries<T>,
    /// Production-weighted mean age per year
    pub mean_age: YearlySeries<T>,
    /// Size of the cohort entering service each year
    pub new_capacity: YearlySeries<T>,
    /// Every active cohort record
    pub records: Vec<CohortRecord<T>>,
}

/// The size of the cohort entering service in each model year.
///
/// Investment made in year `y` comes online in `y + construction_delay`. The first years of
/// production come from investment committed before the model starts, priced at the first
/// year's capex.
pub fn new_capacity<T: Scalar>(
    investment: &YearlySeries<T>,
    capex: &YearlySeries<T>,
    config: &TechnoConfig,
) -> YearlySeries<T> {
    let start = investment.start();
    let delay = config.construction_delay as usize;
    let invest = investment.values();
    let capex = capex.values();
    YearlySeries::from_fn(&investment.years(), |year| {
        let elapsed = (year - start) as usize;
        if elapsed >= delay {
            safe_div(invest[elapsed - delay], capex[elapsed - delay])
        } else {
            let before = config
                .invest_before_year_start
                .get(elapsed)
                .copied()
                .unwrap_or(0.0);
            safe_div(T::from_real(before), capex[0])
        }
    })
}

/// Compute the production and mean age of a technology's fleet.
///
/// Negative investments are not clipped: they give cohorts of negative size.
pub fn compute_production<T: Scalar>(
    investment: &YearlySeries<T>,
    capex: &YearlySeries<T>,
    config: &TechnoConfig,
) -> AgingOutcome<T> {
    assert_eq!(
        investment.years(),
        capex.years(),
        "Investment and capex must cover the same years"
    );

    let years = investment.years();
    let (start, end) = (*years.start(), *years.end());
    let lifetime = config.lifetime;
    let new_capacity = new_capacity(investment, capex, config);

    let mut records = Vec::new();
    for (initial_age, percentage) in config.age_distribution.iter() {
        let size = T::from_real(config.initial_production * percentage / 100.0);
        records.extend(
            years
                .clone()
                .map(|year| (year, initial_age + year - start))
                .take_while(|&(_, age)| age < lifetime)
                .map(|(year, age)| CohortRecord {
                    year,
                    age,
                    production: size,
                }),
        );
    }
    for (online, size) in new_capacity.iter() {
        records.extend(
            (online..=end)
                .map(|year| (year, year - online))
                .take_while(|&(_, age)| age < lifetime)
                .map(|(year, age)| CohortRecord {
                    year,
                    age,
                    production: size,
                }),
        );
    }
    records.retain(|record| !record.production.is_zero());

    let mut production = vec![T::zero(); years.clone().count()];
    let mut weighted_age = production.clone();
    for record in &records {
        let idx = (record.year - start) as usize;
        production[idx] += record.production;
        weighted_age[idx] += record.production * T::from_real(f64::from(record.age));
    }
    let mean_age = weighted_age
        .iter()
        .zip(&production)
        .map(|(&weighted, &total)| safe_div(weighted, total))
        .collect();

    AgingOutcome {
        production: YearlySeries::new(start, production),
        mean_age: YearlySeries::new(start, mean_age),
        new_capacity,
        records,
    }
}
