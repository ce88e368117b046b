//! The capex learning curve.
//!
//! Capex falls by `learning_rate` every time the cumulative investment in a technology doubles.
//! The recursion is damped so a single year can never cut the capex by more than about 8%, and
//! the result is bounded below by a fraction of the initial capex.
use crate::scalar::Scalar;
use crate::techno::config::TechnoConfig;
use crate::year::YearlySeries;
use ::log::debug;

/// Below this cumulative investment (M$) the learning step is skipped
pub const MIN_INVEST_SUM: f64 = 10.0;
/// Learning ratios below this threshold are damped
const DAMPING_THRESHOLD: f64 = 0.95;

/// A linear ramp of the capacity factor between the first and last model years
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityFactorRamp {
    /// Capacity factor in the first model year
    pub initial: f64,
    /// Capacity factor in the last model year
    pub at_year_end: f64,
}

impl CapacityFactorRamp {
    /// The capacity factor of year `index` of `len`, relative to the initial one
    pub fn relative(&self, index: usize, len: usize) -> f64 {
        if len <= 1 {
            return 1.0;
        }
        let progress = index as f64 / (len - 1) as f64;
        (self.initial + (self.at_year_end - self.initial) * progress) / self.initial
    }
}

/// Parameters of the learning-curve recursion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningCurve {
    /// Initial capex ($/MWh)
    pub capex_init: f64,
    /// Fractional cost reduction per doubling of cumulative investment
    pub learning_rate: f64,
    /// Production of the legacy fleet, which sets the initial cumulative investment
    pub initial_production: f64,
    /// Lower bound as a fraction of `capex_init`
    pub floor: f64,
    /// Optional capacity factor ramp
    pub capacity_factor: Option<CapacityFactorRamp>,
}

impl LearningCurve {
    /// The learning curve of a configured technology
    pub fn from_config(config: &TechnoConfig) -> Self {
        Self {
            capex_init: config.capex_init.value(),
            learning_rate: config.learning_rate,
            initial_production: config.initial_production,
            floor: config.maximum_learning_capex_ratio,
            capacity_factor: config.capacity_factor,
        }
    }

    /// Exponent of the power law equivalent to the learning rate
    pub fn expo_factor(&self) -> f64 {
        -(1.0 - self.learning_rate).ln() / 2.0_f64.ln()
    }

    /// Compute the capex trajectory for a series of yearly investments (M$).
    ///
    /// The first two years always have the initial capex, as the investment of a year only
    /// affects the capex of the year after.
    pub fn compute<T: Scalar>(&self, invest: &YearlySeries<T>) -> YearlySeries<T> {
        let capex_init = T::from_real(self.capex_init);
        if self.learning_rate == 0.0 {
            return YearlySeries::constant(&invest.years(), capex_init);
        }

        let expo_factor = self.expo_factor();
        let start = invest.start();
        let invest = invest.values();
        let mut invest_sum = capex_init * T::from_real(self.initial_production);
        let mut capex = Vec::with_capacity(invest.len());
        capex.push(capex_init);
        for i in 1..invest.len() {
            let step = invest[i - 1];
            let next = if i == 1 || invest_sum.re() < MIN_INVEST_SUM {
                capex_init
            } else {
                capex[i - 1] * self.step_ratio(invest_sum, step, expo_factor, i, invest.len())
            };
            capex.push(next);
            invest_sum += step;
        }

        // Bound below by `floor * capex_init`
        let keep = T::from_real(1.0 - self.floor);
        let capex = capex
            .into_iter()
            .map(|value| capex_init + keep * (value - capex_init))
            .collect();

        YearlySeries::new(start, capex)
    }

    fn step_ratio<T: Scalar>(
        &self,
        invest_sum: T,
        step: T,
        expo_factor: f64,
        index: usize,
        len: usize,
    ) -> T {
        let growth = (invest_sum + step) / invest_sum;
        if growth.re() <= 0.0 {
            debug!("Cumulative investment would become non-positive: no learning this year");
            return T::one();
        }

        let cf_factor = self
            .capacity_factor
            .map_or(1.0, |ramp| ramp.relative(index, len));
        let ratio = (growth * T::from_real(cf_factor)).powf(-expo_factor);
        if ratio.re() < DAMPING_THRESHOLD {
            T::from_real(0.9) + T::from_real(0.05) * (ratio - T::from_real(0.9)).exp()
        } else {
            ratio
        }
    }
}

/// Compute the capex trajectory of a technology for yearly investments in M$
pub fn compute_capex<T: Scalar>(
    invest: &YearlySeries<T>,
    config: &TechnoConfig,
) -> YearlySeries<T> {
    LearningCurve::from_config(config).compute(invest)
}
