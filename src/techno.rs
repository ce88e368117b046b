//! Technologies: from yearly investment to prices, flows and capital.
//!
//! A [`Techno`] runs a fixed pipeline over the model years:
//!
//! 1. scale the investment to M$;
//! 2. compute the capex learning curve;
//! 3. age the installed cohorts to get production;
//! 4. compute the needs per unit of output, the carbon intensity and the price breakdown;
//! 5. derive the flows, then limit them by the availability of scarce inputs;
//! 6. compute the capital tied up in the fleet.
//!
//! Each stage produces a new value; nothing computed by an earlier stage is modified later.
//! What a technology consumes and emits per unit of output is supplied by strategy functions,
//! which read the configuration by default and can be replaced for technologies whose
//! stoichiometry is computed elsewhere.
use crate::error::ConfigurationError;
use crate::flow::{FlowKey, FlowTable, GhgSpecies, accumulate, scale_table};
use crate::id::{CommodityID, TechnoID};
use crate::scalar::Scalar;
use crate::year::YearlySeries;
use ::log::debug;
use anyhow::{Context, Result};
use indexmap::IndexMap;

pub mod aging;
use aging::{AgingOutcome, compute_production};
pub mod config;
use config::TechnoConfig;
pub mod learning;
use learning::compute_capex;
pub mod pricing;
use pricing::{
    CarbonIntensity, InputSeries, PriceBreakdown, carbon_intensity, compute_capital,
    compute_non_use_capital, compute_price, effective_needs,
};
pub mod ratio;
use ratio::{AppliedRatio, RatioSettings, apply_resources_ratios};

/// Inputs consumed per unit of output, before efficiency
pub type NeedsFn = fn(&TechnoConfig) -> IndexMap<CommodityID, f64>;
/// Byproducts per unit of output
pub type ByproductsFn = fn(&TechnoConfig) -> IndexMap<FlowKey, f64>;
/// Direct CO2 emissions per unit of output (kgCO2/kWh)
pub type Co2Fn = fn(&TechnoConfig) -> f64;

fn needs_from_config(config: &TechnoConfig) -> IndexMap<CommodityID, f64> {
    config.needs.clone()
}

fn byproducts_from_config(config: &TechnoConfig) -> IndexMap<FlowKey, f64> {
    config.byproducts.clone()
}

fn co2_from_config(config: &TechnoConfig) -> f64 {
    config.co2_from_production
}

/// A configured technology
#[derive(Debug, Clone)]
pub struct Techno {
    /// Static parameters
    pub config: TechnoConfig,
    needs_fn: NeedsFn,
    byproducts_fn: ByproductsFn,
    co2_fn: Co2Fn,
}

/// Yearly time series a technology is computed from
#[derive(Debug, Clone, Copy)]
pub struct TechnoInputs<'a, T> {
    /// Investment (G$), which also sets the model years
    pub investment: &'a YearlySeries<T>,
    /// Price of every commodity that may be consumed
    pub input_prices: &'a InputSeries<T>,
    /// CO2 tax ($/tCO2)
    pub co2_tax: &'a YearlySeries<T>,
    /// Carbon intensity of commodities that may be consumed
    pub input_co2_intensities: &'a InputSeries<T>,
    /// Availability of scarce commodities, in percent of demand
    pub resource_ratios: &'a InputSeries<T>,
    /// Utilisation of the installed capacity in percent (100 if not given)
    pub utilisation: Option<&'a YearlySeries<T>>,
}

/// Yearly flows of a technology
#[derive(Debug, Clone, PartialEq)]
pub struct TechnoFlows<T> {
    /// The main product, byproducts and emitted gases
    pub production: FlowTable<T>,
    /// Inputs consumed while operating
    pub consumption: FlowTable<T>,
    /// Resources consumed to build new capacity
    pub construction: FlowTable<T>,
    /// Land occupied
    pub land_use: YearlySeries<T>,
}

impl<T: Scalar> TechnoFlows<T> {
    /// Scale operating flows by a yearly factor. Construction flows are left untouched.
    pub fn scale_operating(&self, factor: &YearlySeries<T>) -> Self {
        Self {
            production: scale_table(&self.production, factor),
            consumption: scale_table(&self.consumption, factor),
            construction: self.construction.clone(),
            land_use: &self.land_use * factor,
        }
    }
}

/// Everything computed for a technology
#[derive(Debug, Clone, PartialEq)]
pub struct TechnoOutputs<T> {
    /// The technology's ID
    pub id: TechnoID,
    /// Capex trajectory ($/MWh)
    pub capex: YearlySeries<T>,
    /// Production and age of the fleet, before utilisation and resource limitation
    pub aging: AgingOutcome<T>,
    /// Inputs per unit of output, efficiency included
    pub needs: InputSeries<f64>,
    /// Carbon intensity of the output
    pub carbon_intensity: CarbonIntensity<T>,
    /// Price and its components
    pub price: PriceBreakdown<T>,
    /// Flows after resource limitation
    pub flows: TechnoFlows<T>,
    /// The resource limitation applied to the flows
    pub applied_ratio: AppliedRatio<T>,
    /// Capital of the fleet (G$)
    pub capital: YearlySeries<T>,
    /// Capital left idle by resource limitation and under-utilisation (G$)
    pub non_use_capital: YearlySeries<T>,
}

impl<T> TechnoOutputs<T> {
    /// Production of the main product, after resource limitation
    pub fn main_production(&self, product: &CommodityID) -> Option<&YearlySeries<T>> {
        self.flows.production.get(&FlowKey::Commodity(product.clone()))
    }
}

impl Techno {
    /// Create a technology whose flows per unit of output are read from its configuration
    pub fn new(config: TechnoConfig) -> Self {
        Self {
            config,
            needs_fn: needs_from_config,
            byproducts_fn: byproducts_from_config,
            co2_fn: co2_from_config,
        }
    }

    /// Replace the strategy computing needs per unit of output
    pub fn with_needs(mut self, needs_fn: NeedsFn) -> Self {
        self.needs_fn = needs_fn;
        self
    }

    /// Replace the strategy computing byproducts per unit of output
    pub fn with_byproducts(mut self, byproducts_fn: ByproductsFn) -> Self {
        self.byproducts_fn = byproducts_fn;
        self
    }

    /// Replace the strategy computing direct CO2 emissions per unit of output
    pub fn with_co2(mut self, co2_fn: Co2Fn) -> Self {
        self.co2_fn = co2_fn;
        self
    }

    /// The technology's ID
    pub fn id(&self) -> &TechnoID {
        &self.config.id
    }

    /// The commodity the technology produces
    pub fn product(&self) -> &CommodityID {
        &self.config.product
    }

    /// Run the whole pipeline for the years covered by the investment series
    pub fn compute<T: Scalar>(
        &self,
        inputs: &TechnoInputs<'_, T>,
        settings: &RatioSettings,
    ) -> Result<TechnoOutputs<T>> {
        let id = self.id();
        let years = inputs.investment.years();
        self.check_inputs(inputs)
            .with_context(|| format!("Invalid inputs for techno {id}"))?;

        debug!("Computing capex and production of techno {id}");
        let investment = inputs
            .investment
            .scale_real(self.config.scaling_factor_invest_level);
        let capex = compute_capex(&investment, &self.config);
        let aging = compute_production(&investment, &capex, &self.config);

        debug!("Computing price of techno {id}");
        let needs = effective_needs(&self.config, &(self.needs_fn)(&self.config), &years);
        let co2 = (self.co2_fn)(&self.config);
        let carbon_intensity =
            carbon_intensity(co2, &needs, inputs.input_co2_intensities, &years);
        let price = compute_price(
            &self.config,
            &capex,
            &needs,
            inputs.input_prices,
            inputs.co2_tax,
            &carbon_intensity,
        )
        .with_context(|| format!("Could not price techno {id}"))?;

        let utilisation = inputs
            .utilisation
            .cloned()
            .unwrap_or_else(|| YearlySeries::constant(&years, T::from_real(100.0)));
        let flows = self.flows_without_ratio(&aging, &needs, &utilisation, co2);
        let (flows, applied_ratio) =
            apply_resources_ratios(&flows, inputs.resource_ratios, settings);

        let capital = compute_capital(&self.config, &capex, &aging.production);
        let non_use_capital =
            compute_non_use_capital(&capital, &applied_ratio.ratio, &utilisation);

        Ok(TechnoOutputs {
            id: id.clone(),
            capex,
            aging,
            needs,
            carbon_intensity,
            price,
            flows,
            applied_ratio,
            capital,
            non_use_capital,
        })
    }

    fn check_inputs<T: Scalar>(&self, inputs: &TechnoInputs<'_, T>) -> Result<()> {
        let years = inputs.investment.years();
        inputs.co2_tax.check_covers(&years, "co2_tax")?;
        if let Some(utilisation) = inputs.utilisation {
            utilisation.check_covers(&years, "utilisation")?;
            check_range(utilisation, "utilisation", self.id().as_str(), 0.0..=100.0)?;
        }
        for (id, ratio) in inputs.resource_ratios {
            check_range(ratio, "resource_ratios", id.as_str(), 0.0..=f64::INFINITY)?;
        }
        for (name, table) in [
            ("price", inputs.input_prices),
            ("co2_intensity", inputs.input_co2_intensities),
            ("resource_ratio", inputs.resource_ratios),
        ] {
            for (id, series) in table {
                series.check_covers(&years, &format!("{name} of {id}"))?;
            }
        }

        Ok(())
    }

    /// Flows of the fleet at its utilisation, before any resource limitation
    fn flows_without_ratio<T: Scalar>(
        &self,
        aging: &AgingOutcome<T>,
        needs: &InputSeries<f64>,
        utilisation: &YearlySeries<T>,
        co2: f64,
    ) -> TechnoFlows<T> {
        let load = utilisation.map(|percent| percent / T::from_real(100.0));
        let production = &aging.production * &load;
        let co2_key = FlowKey::Ghg(GhgSpecies::CO2);

        let mut production_table = FlowTable::new();
        production_table.insert(FlowKey::Commodity(self.product().clone()), production.clone());
        for (key, factor) in (self.byproducts_fn)(&self.config) {
            if key == co2_key && co2 != 0.0 {
                continue;
            }
            accumulate(&mut production_table, &key, &production.scale_real(factor));
        }
        if co2 != 0.0 {
            accumulate(&mut production_table, &co2_key, &production.scale_real(co2));
        }

        let consumption = needs
            .iter()
            .map(|(id, need)| (FlowKey::Commodity(id.clone()), &production * &need.lift()))
            .collect();
        let construction = self
            .config
            .construction_resources
            .iter()
            .map(|(id, &factor)| {
                (
                    FlowKey::Commodity(id.clone()),
                    aging.new_capacity.scale_real(factor),
                )
            })
            .collect();
        let land_use = production.scale_real(self.config.land_use_per_unit);

        TechnoFlows {
            production: production_table,
            consumption,
            construction,
            land_use,
        }
    }
}

/// Check that the real part of every value of `series` is within `range`
fn check_range<T: Scalar>(
    series: &YearlySeries<T>,
    name: &'static str,
    id: &str,
    range: std::ops::RangeInclusive<f64>,
) -> Result<(), ConfigurationError> {
    let out_of_range = series
        .values()
        .iter()
        .map(|value| value.re())
        .find(|value| !range.contains(value));
    match out_of_range {
        None => Ok(()),
        Some(value) => Err(ConfigurationError::InvalidSeriesValue {
            series: name,
            id: id.to_string(),
            value,
            reason: "is out of range",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, techno_config};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use num_complex::Complex64;
    use rstest::{fixture, rstest};
    use std::ops::RangeInclusive;

    const YEARS: RangeInclusive<u32> = 2020..=2025;

    struct Series {
        investment: YearlySeries<f64>,
        prices: InputSeries<f64>,
        co2_tax: YearlySeries<f64>,
        intensities: InputSeries<f64>,
        ratios: InputSeries<f64>,
    }

    impl Series {
        fn inputs(&self) -> TechnoInputs<'_, f64> {
            TechnoInputs {
                investment: &self.investment,
                input_prices: &self.prices,
                co2_tax: &self.co2_tax,
                input_co2_intensities: &self.intensities,
                resource_ratios: &self.ratios,
                utilisation: None,
            }
        }
    }

    #[fixture]
    fn series() -> Series {
        Series {
            investment: YearlySeries::constant(&YEARS, 0.1),
            prices: indexmap! {
                "electricity".into() => YearlySeries::constant(&YEARS, 60.0),
                "water".into() => YearlySeries::constant(&YEARS, 1.0),
            },
            co2_tax: YearlySeries::constant(&YEARS, 50.0),
            intensities: indexmap! {"electricity".into() => YearlySeries::constant(&YEARS, 0.1)},
            ratios: InputSeries::new(),
        }
    }

    #[rstest]
    fn test_compute(techno_config: TechnoConfig, series: Series) {
        let techno = Techno::new(techno_config);
        let outputs = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();

        let production = outputs.main_production(techno.product()).unwrap();
        assert_eq!(production, &outputs.aging.production);
        assert_eq!(outputs.applied_ratio.ratio, YearlySeries::constant(&YEARS, 1.0));
        assert!(outputs.price.price.all_finite());

        // Needs are divided by efficiency
        let electricity = &outputs.flows.consumption[&FlowKey::commodity("electricity")];
        for (consumed, produced) in electricity.values().iter().zip(production.values()) {
            assert_approx_eq!(f64, *consumed, produced / 0.7, epsilon = 1e-9);
        }

        // Construction resources follow new capacity
        assert_eq!(
            outputs.flows.construction[&FlowKey::commodity("copper")],
            outputs.aging.new_capacity.scale_real(0.01)
        );
        assert_eq!(
            outputs.non_use_capital,
            YearlySeries::constant(&YEARS, 0.0)
        );
    }

    #[rstest]
    fn test_co2_strategy(techno_config: TechnoConfig, series: Series) {
        fn fixed_co2(_: &TechnoConfig) -> f64 {
            0.2
        }

        let techno = Techno::new(techno_config).with_co2(fixed_co2);
        let outputs = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();
        let production = outputs.main_production(techno.product()).unwrap();
        let co2 = &outputs.flows.production[&FlowKey::Ghg(GhgSpecies::CO2)];
        assert_eq!(co2, &production.scale_real(0.2));
    }

    #[rstest]
    fn test_utilisation(techno_config: TechnoConfig, series: Series) {
        let techno = Techno::new(techno_config);
        let utilisation = YearlySeries::constant(&YEARS, 50.0);
        let inputs = TechnoInputs {
            utilisation: Some(&utilisation),
            ..series.inputs()
        };
        let full = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();
        let half = techno.compute(&inputs, &RatioSettings::default()).unwrap();

        assert_eq!(full.price.price, half.price.price);
        assert_eq!(
            half.main_production(techno.product()).unwrap(),
            &full.aging.production.scale_real(0.5)
        );
        assert_eq!(half.non_use_capital, half.capital.scale_real(0.5));
    }

    #[rstest]
    fn test_ratio_above_demand(techno_config: TechnoConfig, mut series: Series) {
        let techno = Techno::new(techno_config);
        let full = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();
        series.ratios = indexmap! {"water".into() => YearlySeries::constant(&YEARS, 150.0)};
        let outputs = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();

        assert_eq!(outputs.applied_ratio.ratio, YearlySeries::constant(&YEARS, 1.0));
        assert_eq!(
            outputs.main_production(techno.product()),
            full.main_production(techno.product())
        );
        assert_eq!(outputs.non_use_capital, full.non_use_capital);
    }

    #[rstest]
    fn test_utilisation_above_full(techno_config: TechnoConfig, series: Series) {
        let techno = Techno::new(techno_config);
        let utilisation = YearlySeries::constant(&YEARS, 150.0);
        let inputs = TechnoInputs {
            utilisation: Some(&utilisation),
            ..series.inputs()
        };
        let err = techno.compute(&inputs, &RatioSettings::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::InvalidSeriesValue { series: "utilisation", .. })
        ));
    }

    #[rstest]
    fn test_negative_investment_does_not_produce_nan(
        techno_config: TechnoConfig,
        mut series: Series,
    ) {
        let years = 2020..=2021;
        series.investment = YearlySeries::new(2020, vec![100.0, -50.0]);
        series.co2_tax = YearlySeries::constant(&years, 50.0);
        for table in [&mut series.prices, &mut series.intensities] {
            for value in table.values_mut() {
                *value = YearlySeries::constant(&years, value.first());
            }
        }

        let techno = Techno::new(techno_config);
        let outputs = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();
        assert!(outputs.capex.all_finite());
        assert!(outputs.price.price.all_finite());
        assert!(outputs.price.price_wotax.all_finite());
        assert!(outputs.capital.all_finite());
    }

    #[rstest]
    fn test_misaligned_inputs(techno_config: TechnoConfig, mut series: Series) {
        series.co2_tax = YearlySeries::constant(&(2020..=2021), 50.0);
        let techno = Techno::new(techno_config);
        assert_error!(
            techno.compute(&series.inputs(), &RatioSettings::default()),
            "Invalid inputs for techno Electrolysis"
        );
    }

    #[rstest]
    fn test_complex_dtype_is_preserved(techno_config: TechnoConfig, series: Series) {
        let lift = |table: &InputSeries<f64>| -> InputSeries<Complex64> {
            table
                .iter()
                .map(|(id, series)| (id.clone(), series.lift()))
                .collect()
        };
        let h = 1e-20;
        let investment = series
            .investment
            .map_with_year(|year, value| Complex64::new(value, if year == 2020 { h } else { 0.0 }));
        let prices = lift(&series.prices);
        let intensities = lift(&series.intensities);
        let ratios = lift(&series.ratios);
        let co2_tax = series.co2_tax.lift();
        let inputs = TechnoInputs {
            investment: &investment,
            input_prices: &prices,
            co2_tax: &co2_tax,
            input_co2_intensities: &intensities,
            resource_ratios: &ratios,
            utilisation: None,
        };

        let techno = Techno::new(techno_config);
        let outputs = techno.compute(&inputs, &RatioSettings::default()).unwrap();
        let real = techno.compute(&series.inputs(), &RatioSettings::default()).unwrap();

        for (complex, real) in outputs.price.price.values().iter().zip(real.price.price.values()) {
            assert_approx_eq!(f64, complex.re, *real, epsilon = 1e-9 * real.abs());
        }
        assert!(outputs.price.price.values().iter().any(|value| value.im != 0.0));
        assert!(outputs.aging.production.values().iter().any(|value| value.im != 0.0));
    }
}
