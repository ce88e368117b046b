//! The greenhouse gas balance of the energy system.
//!
//! Emissions are gathered from the flows of the energy streams, by gas. CO2 released when energy
//! is used is added on top of what the technologies emit, and CO2 that is captured and stored or
//! consumed is removed. Stream flows are in Mt; every balance is in Gt.
use crate::flow::{CARBON_CAPTURE, FlowKey, GhgSpecies, flow_or_zeros};
use crate::scalar::{Scalar, maximum};
use crate::stream::{StreamAggregate, StreamConfig};
use crate::year::YearlySeries;
use indexmap::IndexMap;
use std::ops::RangeInclusive;
use strum::IntoEnumIterator;

/// Conversion from Mt to Gt
const MT_TO_GT: f64 = 1e-3;

/// Emissions and removals from outside the energy system
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalEmissions<T> {
    /// CO2 captured and stored by CCUS (Mt)
    pub ccus_captured: Option<YearlySeries<T>>,
    /// Other CO2 sources (Gt)
    pub sources: IndexMap<String, YearlySeries<T>>,
    /// Other CO2 sinks (Gt)
    pub sinks: IndexMap<String, YearlySeries<T>>,
}

/// Sources, sinks and net emissions of one gas (Gt)
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesBalance<T> {
    /// Emissions
    pub sources: YearlySeries<T>,
    /// Removals
    pub sinks: YearlySeries<T>,
    /// Sources minus sinks
    pub net: YearlySeries<T>,
}

/// The greenhouse gas balance (Gt)
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionsBalance<T> {
    /// CO2 emitted by the energy technologies
    pub from_energy_mix: YearlySeries<T>,
    /// CO2 captured by the energy technologies
    pub carbon_capture_from_energy_mix: YearlySeries<T>,
    /// CO2 consumed by the energy technologies
    pub removed_by_energy_mix: YearlySeries<T>,
    /// Captured CO2 consumed by the energy technologies
    pub needed_by_energy_mix: YearlySeries<T>,
    /// CO2 released when energy is used
    pub co2_by_use: YearlySeries<T>,
    /// Net CO2 emissions
    pub total_co2: YearlySeries<T>,
    /// Balance of each gas
    pub species: IndexMap<GhgSpecies, SpeciesBalance<T>>,
    /// Net emissions weighted by 20-year global warming potential (GtCO2eq)
    pub gwp_20: YearlySeries<T>,
    /// Net emissions weighted by 100-year global warming potential (GtCO2eq)
    pub gwp_100: YearlySeries<T>,
}

/// Sum a flow over every stream and convert it to Gt
fn sum_flow<'a, T, I>(tables: I, key: &FlowKey, years: &RangeInclusive<u32>) -> YearlySeries<T>
where
    T: Scalar,
    I: Iterator<Item = &'a crate::flow::FlowTable<T>>,
{
    let flows: Vec<_> = tables.map(|table| flow_or_zeros(table, key, years)).collect();
    YearlySeries::sum_over(years, &flows).scale_real(MT_TO_GT)
}

/// CO2 released when the stream's commodity is used (Mt).
///
/// Only positive net production is counted.
pub fn co2_by_use<T: Scalar>(
    config: &StreamConfig,
    aggregate: &StreamAggregate<T>,
) -> YearlySeries<T> {
    let co2_per_use = T::from_real(config.co2_per_use);
    aggregate
        .net_production(&config.id)
        .map(|net| co2_per_use * maximum(T::zero(), net))
}

/// Compute the greenhouse gas balance of a set of energy streams
pub fn compute_emissions<T: Scalar>(
    streams: &[(&StreamConfig, &StreamAggregate<T>)],
    external: &ExternalEmissions<T>,
    years: &RangeInclusive<u32>,
) -> EmissionsBalance<T> {
    let productions = || streams.iter().map(|(_, aggregate)| &aggregate.production);
    let consumptions = || streams.iter().map(|(_, aggregate)| &aggregate.consumption);
    let co2_key = FlowKey::Ghg(GhgSpecies::CO2);
    let capture_key = FlowKey::commodity(CARBON_CAPTURE);

    let from_energy_mix = sum_flow(productions(), &co2_key, years);
    let carbon_capture_from_energy_mix = sum_flow(productions(), &capture_key, years);
    let removed_by_energy_mix = sum_flow(consumptions(), &co2_key, years);
    let needed_by_energy_mix = sum_flow(consumptions(), &capture_key, years);
    let by_use: Vec<_> = streams
        .iter()
        .map(|(config, aggregate)| co2_by_use(config, aggregate))
        .collect();
    let co2_by_use = YearlySeries::sum_over(years, &by_use).scale_real(MT_TO_GT);

    let ccus = external
        .ccus_captured
        .as_ref()
        .map_or_else(|| YearlySeries::zeros(years), |ccus| ccus.scale_real(MT_TO_GT));
    let sources = &(&from_energy_mix + &YearlySeries::sum_over(years, external.sources.values()))
        + &co2_by_use;
    let sinks = &(&(&removed_by_energy_mix + &ccus) + &needed_by_energy_mix)
        + &YearlySeries::sum_over(years, external.sinks.values());
    let total_co2 = &sources - &sinks;

    let mut species = IndexMap::new();
    for gas in GhgSpecies::iter() {
        let balance = if gas == GhgSpecies::CO2 {
            SpeciesBalance {
                sources: sources.clone(),
                sinks: sinks.clone(),
                net: total_co2.clone(),
            }
        } else {
            let key = FlowKey::Ghg(gas);
            let sources = sum_flow(productions(), &key, years);
            let sinks = sum_flow(consumptions(), &key, years);
            let net = &sources - &sinks;
            SpeciesBalance {
                sources,
                sinks,
                net,
            }
        };
        species.insert(gas, balance);
    }

    let weighted = |gwp: fn(GhgSpecies) -> f64| {
        let terms: Vec<_> = species
            .iter()
            .map(|(gas, balance)| balance.net.scale_real(gwp(*gas)))
            .collect();
        YearlySeries::sum_over(years, &terms)
    };
    let gwp_20 = weighted(GhgSpecies::gwp_20);
    let gwp_100 = weighted(GhgSpecies::gwp_100);

    EmissionsBalance {
        from_energy_mix,
        carbon_capture_from_energy_mix,
        removed_by_energy_mix,
        needed_by_energy_mix,
        co2_by_use,
        total_co2,
        species,
        gwp_20,
        gwp_100,
    }
}
