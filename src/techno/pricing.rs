//! Prices, carbon intensity and capital of a technology.
//!
//! The price of one unit of output is built up from the factory cost (annualised capex plus
//! operating and decommissioning costs), the transport cost and the cost of the inputs, then
//! marked up by the margin. The CO2 tax is added on top of the margin.
use crate::finance::{amortise, capital_recovery_factor};
use crate::id::CommodityID;
use crate::scalar::{Scalar, maximum};
use crate::techno::config::TechnoConfig;
use crate::year::YearlySeries;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::ops::RangeInclusive;

/// Yearly series for each input commodity
pub type InputSeries<T> = IndexMap<CommodityID, YearlySeries<T>>;

/// Inputs consumed per unit of output, with the efficiency of each year applied
pub fn effective_needs(
    config: &TechnoConfig,
    needs: &IndexMap<CommodityID, f64>,
    years: &RangeInclusive<u32>,
) -> InputSeries<f64> {
    let efficiency =
        YearlySeries::from_fn(years, |year| config.efficiency.at(year, *years.start()));
    needs
        .iter()
        .map(|(id, &need)| (id.clone(), efficiency.map(|e| need / e)))
        .collect()
}

/// Carbon intensity of a technology's output (kgCO2/kWh)
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonIntensity<T> {
    /// Direct emissions of the technology
    pub production: YearlySeries<T>,
    /// Emissions embedded in each input
    pub inputs: InputSeries<T>,
    /// Sum of direct and embedded emissions
    pub total: YearlySeries<T>,
}

/// Compute the carbon intensity of the output.
///
/// Inputs without a known intensity are taken to be carbon free.
pub fn carbon_intensity<T: Scalar>(
    co2_from_production: f64,
    needs: &InputSeries<f64>,
    input_intensities: &InputSeries<T>,
    years: &RangeInclusive<u32>,
) -> CarbonIntensity<T> {
    let production = YearlySeries::constant(years, T::from_real(co2_from_production));
    let inputs: InputSeries<T> = needs
        .iter()
        .filter_map(|(id, need)| {
            let intensity = input_intensities.get(id)?;
            Some((id.clone(), &need.lift() * intensity))
        })
        .collect();
    let total = &production + &YearlySeries::sum_over(years, inputs.values());

    CarbonIntensity {
        production,
        inputs,
        total,
    }
}

/// The components of a technology's price ($/MWh)
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBreakdown<T> {
    /// Capex per unit of yearly output
    pub capex: YearlySeries<T>,
    /// Capital recovery factor
    pub crf: f64,
    /// Annualised capex plus operating and decommissioning costs
    pub factory: YearlySeries<T>,
    /// Transport cost
    pub transport: YearlySeries<T>,
    /// Cost of each input
    pub usage: InputSeries<T>,
    /// Cost of all inputs
    pub usage_total: YearlySeries<T>,
    /// Margin in percent
    pub margin: f64,
    /// CO2 tax per unit of output
    pub co2_tax: YearlySeries<T>,
    /// Price before the CO2 tax
    pub price_wotax: YearlySeries<T>,
    /// Price including the CO2 tax
    pub price: YearlySeries<T>,
    /// Share of the price paying back capex
    pub capex_part: YearlySeries<T>,
    /// Share of the price paying for operation, transport and inputs
    pub opex_part: YearlySeries<T>,
    /// Share of the price paying the CO2 tax
    pub co2_tax_part: YearlySeries<T>,
    /// Price with capex spread over several years, if configured
    pub amortized_price: Option<YearlySeries<T>>,
}

/// Transport cost per unit of output
fn transport_cost(config: &TechnoConfig) -> f64 {
    match config.fuel.calorific_value {
        Some(calorific_value) if config.transport_cost != 0.0 => {
            config.transport_cost * config.transport_margin / 100.0 / calorific_value.value()
        }
        _ => 0.0,
    }
}

/// Compute the price of a technology's output.
///
/// # Arguments
///
/// * `config` - The technology
/// * `capex` - Capex trajectory ($/MWh)
/// * `needs` - Inputs per unit of output, efficiency included
/// * `input_prices` - Price of every input
/// * `co2_tax` - CO2 tax ($/tCO2)
/// * `intensity` - Carbon intensity of the output
pub fn compute_price<T: Scalar>(
    config: &TechnoConfig,
    capex: &YearlySeries<T>,
    needs: &InputSeries<f64>,
    input_prices: &InputSeries<T>,
    co2_tax: &YearlySeries<T>,
    intensity: &CarbonIntensity<T>,
) -> Result<PriceBreakdown<T>> {
    let years = capex.years();
    let crf = capital_recovery_factor(config.lifetime, config.wacc);
    let annualised = capex.scale_real(crf * (1.0 + config.decommissioning_percentage));
    let factory = &annualised + &capex.scale_real(config.opex_percentage);
    let transport = YearlySeries::constant(&years, T::from_real(transport_cost(config)));

    let usage = needs
        .iter()
        .map(|(id, need)| {
            let price = input_prices.get(id).with_context(|| {
                format!("No price given for {id}, which is needed by techno {}", config.id)
            })?;
            Ok((id.clone(), &need.lift() * price))
        })
        .collect::<Result<InputSeries<T>>>()?;
    let usage_total = YearlySeries::sum_over(&years, usage.values());

    let margin = config.margin / 100.0;
    let marked_up = |factory: &YearlySeries<T>| {
        (&(factory + &transport) + &usage_total).scale_real(margin)
    };
    let price_wotax = marked_up(&factory);
    let tax = co2_tax.zip_map(&intensity.total, |tax, intensity| {
        tax * maximum(T::zero(), intensity)
    });
    let price = &price_wotax + &tax;

    let capex_part = annualised.scale_real(margin);
    let opex_part = &price_wotax - &capex_part;
    let amortized_price = config.nb_years_amort_capex.map(|nb_years| {
        let amortized_factory =
            &amortise(&annualised, nb_years) + &capex.scale_real(config.opex_percentage);
        &marked_up(&amortized_factory) + &tax
    });

    Ok(PriceBreakdown {
        capex: capex.clone(),
        crf,
        factory,
        transport,
        usage,
        usage_total,
        margin: config.margin,
        co2_tax: tax.clone(),
        price_wotax,
        price,
        capex_part,
        opex_part,
        co2_tax_part: tax,
        amortized_price,
    })
}

/// Capital tied up in the installed fleet (G$), before any resource limitation
pub fn compute_capital<T: Scalar>(
    config: &TechnoConfig,
    capex: &YearlySeries<T>,
    production_wo_ratio: &YearlySeries<T>,
) -> YearlySeries<T> {
    (capex * production_wo_ratio).scale_real(1.0 / config.scaling_factor_techno_production)
}

/// Capital that is not used because of resource limitation or under-utilisation
pub fn compute_non_use_capital<T: Scalar>(
    capital: &YearlySeries<T>,
    applied_ratio: &YearlySeries<T>,
    utilisation: &YearlySeries<T>,
) -> YearlySeries<T> {
    let one = T::one();
    let used = applied_ratio.zip_map(utilisation, |ratio, utilisation| {
        one - ratio * utilisation / T::from_real(100.0)
    });
    capital * &used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, techno_config};
    use crate::units::{EnergyPerMass, MoneyPerEnergy};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    const YEARS: RangeInclusive<u32> = 2020..=2022;

    fn constant(value: f64) -> YearlySeries<f64> {
        YearlySeries::constant(&YEARS, value)
    }

    fn assert_series_eq(series: &YearlySeries<f64>, expected: f64) {
        for &value in series.values() {
            assert_approx_eq!(f64, value, expected, epsilon = 1e-9);
        }
    }

    #[rstest]
    fn test_effective_needs(techno_config: TechnoConfig) {
        let needs = indexmap! {"electricity".into() => 1.4};
        let effective = effective_needs(&techno_config, &needs, &YEARS);
        assert_series_eq(&effective["electricity"], 2.0);
    }

    #[test]
    fn test_carbon_intensity() {
        let needs = indexmap! {
            CommodityID::new("electricity") => constant(2.0),
            CommodityID::new("water") => constant(1.0),
        };
        let intensities = indexmap! {CommodityID::new("electricity") => constant(0.25)};
        let intensity = carbon_intensity(0.1, &needs, &intensities, &YEARS);
        assert_eq!(intensity.inputs.len(), 1);
        assert_series_eq(&intensity.total, 0.6);
    }

    #[rstest]
    fn test_compute_price(mut techno_config: TechnoConfig) {
        techno_config.lifetime = 10;
        techno_config.wacc = 0.0;
        techno_config.opex_percentage = 0.05;
        techno_config.decommissioning_percentage = 0.1;
        techno_config.margin = 110.0;
        techno_config.transport_cost = 20.0;
        techno_config.transport_margin = 150.0;
        techno_config.fuel.calorific_value = Some(EnergyPerMass(30.0));
        techno_config.capex_init = MoneyPerEnergy(100.0);

        let needs = indexmap! {CommodityID::new("electricity") => constant(2.0)};
        let prices = indexmap! {CommodityID::new("electricity") => constant(50.0)};
        let intensity = carbon_intensity(0.5, &needs, &InputSeries::new(), &YEARS);
        let breakdown = compute_price(
            &techno_config,
            &constant(100.0),
            &needs,
            &prices,
            &constant(40.0),
            &intensity,
        )
        .unwrap();

        // crf = 0.1, factory = 100 * (0.1 + 0.05) + 100 * 0.1 * 0.1
        assert_approx_eq!(f64, breakdown.crf, 0.1, epsilon = 1e-12);
        assert_series_eq(&breakdown.factory, 16.0);
        assert_series_eq(&breakdown.transport, 1.0);
        assert_series_eq(&breakdown.usage_total, 100.0);
        assert_series_eq(&breakdown.price_wotax, 117.0 * 1.1);
        assert_series_eq(&breakdown.co2_tax, 20.0);
        assert_series_eq(&breakdown.price, 117.0 * 1.1 + 20.0);
        assert_series_eq(&breakdown.capex_part, 11.0 * 1.1);
        let parts = &(&breakdown.capex_part + &breakdown.opex_part) + &breakdown.co2_tax_part;
        for (part, price) in parts.values().iter().zip(breakdown.price.values()) {
            assert_approx_eq!(f64, *part, *price, epsilon = 1e-9);
        }
        assert!(breakdown.amortized_price.is_none());
    }

    #[rstest]
    fn test_negative_intensity_is_not_taxed(techno_config: TechnoConfig) {
        let intensity = carbon_intensity(-0.5, &InputSeries::new(), &InputSeries::new(), &YEARS);
        let breakdown = compute_price(
            &techno_config,
            &constant(100.0),
            &InputSeries::new(),
            &InputSeries::new(),
            &constant(40.0),
            &intensity,
        )
        .unwrap();
        assert_series_eq(&breakdown.co2_tax, 0.0);
        assert_eq!(breakdown.price, breakdown.price_wotax);
    }

    #[rstest]
    fn test_amortized_price(mut techno_config: TechnoConfig) {
        techno_config.nb_years_amort_capex = Some(2);
        let capex = YearlySeries::new(2020, vec![100.0, 50.0, 50.0]);
        let intensity = carbon_intensity(0.0, &InputSeries::new(), &InputSeries::new(), &YEARS);
        let breakdown = compute_price(
            &techno_config,
            &capex,
            &InputSeries::new(),
            &InputSeries::new(),
            &constant(0.0),
            &intensity,
        )
        .unwrap();
        let amortized = breakdown.amortized_price.unwrap();

        // First year is padded, so nothing changes; the drop in capex is then spread over 2 years
        assert_approx_eq!(f64, amortized.values()[0], breakdown.price.values()[0], epsilon = 1e-9);
        assert!(amortized.values()[1] > breakdown.price.values()[1]);
        assert_approx_eq!(f64, amortized.values()[2], breakdown.price.values()[2], epsilon = 1e-9);
    }

    #[rstest]
    fn test_missing_input_price(techno_config: TechnoConfig) {
        let needs = indexmap! {CommodityID::new("electricity") => constant(1.0)};
        let intensity = carbon_intensity(0.0, &needs, &InputSeries::new(), &YEARS);
        assert_error!(
            compute_price(
                &techno_config,
                &constant(100.0),
                &needs,
                &InputSeries::new(),
                &constant(0.0),
                &intensity,
            ),
            "No price given for electricity, which is needed by techno Electrolysis"
        );
    }

    #[rstest]
    fn test_capital(mut techno_config: TechnoConfig) {
        techno_config.scaling_factor_techno_production = 1000.0;
        let capital = compute_capital(&techno_config, &constant(200.0), &constant(50.0));
        assert_series_eq(&capital, 10.0);

        let non_use = compute_non_use_capital(&capital, &constant(0.5), &constant(80.0));
        assert_series_eq(&non_use, 6.0);
    }
}
