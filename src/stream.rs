//! Streams: the mix of technologies supplying one commodity.
//!
//! A stream gathers the flows of its technologies, caps the ones limited by an external supply
//! and works out each technology's share of the mix, from which the stream's price follows.
use crate::flow::{FlowKey, FlowTable, StreamUnit, accumulate};
use crate::id::{CommodityID, TechnoID};
use crate::scalar::Scalar;
use crate::techno::{TechnoFlows, TechnoOutputs};
use crate::year::YearlySeries;
use ::log::debug;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;

pub mod mix;
use mix::{CutoffPolicy, MixWeights, TechnoSeries, compute_mix_weights};
pub mod saturation;
use saturation::{SaturationPolicy, log_limited_years, saturation_factor};

/// Static description of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// The commodity supplied, which is also the stream's ID
    pub id: CommodityID,
    /// The unit the commodity is measured in
    pub unit: StreamUnit,
    /// Technologies supplying the stream, in order
    pub technos: Vec<TechnoID>,
    /// How low production is floored when computing shares
    pub cutoff: CutoffPolicy,
    /// CO2 emitted when the commodity is used (kgCO2/kWh or t/t)
    pub co2_per_use: f64,
    /// Limitation by external supply
    pub saturation: SaturationPolicy,
}

/// The aggregated flows and mix of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAggregate<T> {
    /// Everything produced by the stream's technologies
    pub production: FlowTable<T>,
    /// Everything consumed by the stream's technologies, construction included
    pub consumption: FlowTable<T>,
    /// Land used by the stream's technologies
    pub land_use: YearlySeries<T>,
    /// Floored production of the main commodity by each technology
    pub production_by_techno: TechnoSeries<T>,
    /// Total production of the main commodity
    pub total_production: YearlySeries<T>,
    /// Share of each technology
    pub mix_weights: MixWeights<T>,
    /// The factor applied to the limited group, if the stream has one
    pub saturation: Option<YearlySeries<T>>,
}

impl<T: Scalar> StreamAggregate<T> {
    /// Production of the main commodity net of its consumption by the stream itself
    pub fn net_production(&self, id: &CommodityID) -> YearlySeries<T> {
        let key = FlowKey::Commodity(id.clone());
        match self.consumption.get(&key) {
            Some(consumed) => &self.total_production - consumed,
            None => self.total_production.clone(),
        }
    }
}

/// The price of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPrice<T> {
    /// Mix-weighted price including CO2 tax
    pub price: YearlySeries<T>,
    /// Mix-weighted price before CO2 tax
    pub price_wotax: YearlySeries<T>,
}

/// A stream and the technologies it mixes
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Static description
    pub config: StreamConfig,
}

impl Stream {
    /// Create a stream
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// The stream's ID
    pub fn id(&self) -> &CommodityID {
        &self.config.id
    }

    fn techno_outputs<'a, T>(
        &self,
        outputs: &'a IndexMap<TechnoID, TechnoOutputs<T>>,
    ) -> Result<Vec<&'a TechnoOutputs<T>>> {
        self.config
            .technos
            .iter()
            .map(|id| {
                outputs
                    .get(id)
                    .with_context(|| format!("Techno {id} has not been computed"))
            })
            .collect()
    }

    /// Aggregate the flows of the stream's technologies and compute the mix.
    ///
    /// # Arguments
    ///
    /// * `outputs` - The computed technologies, which must include all of the stream's
    /// * `available` - External supply capping the saturation group, if the stream has one
    pub fn compute_production<T: Scalar>(
        &self,
        outputs: &IndexMap<TechnoID, TechnoOutputs<T>>,
        available: Option<&YearlySeries<T>>,
    ) -> Result<StreamAggregate<T>> {
        let id = self.id();
        debug!("Aggregating stream {id}");
        ensure!(
            !self.config.technos.is_empty(),
            "Stream {id} has no technologies"
        );
        let technos = self
            .techno_outputs(outputs)
            .with_context(|| format!("Cannot aggregate stream {id}"))?;
        let years = technos[0].capex.years();
        let main_key = FlowKey::Commodity(id.clone());

        let mut raw_production = TechnoSeries::new();
        for techno in &technos {
            let production = techno.flows.production.get(&main_key).with_context(|| {
                format!("Techno {} does not produce {id}", techno.id)
            })?;
            raw_production.insert(techno.id.clone(), production.clone());
        }

        let saturation = self.saturation(&raw_production, available, &years)?;
        let mut production = FlowTable::new();
        let mut consumption = FlowTable::new();
        let mut land_use = YearlySeries::zeros(&years);
        let mut production_by_techno = TechnoSeries::new();
        let mut unsaturated_total = YearlySeries::zeros(&years);
        for techno in &technos {
            let limited = saturation
                .as_ref()
                .filter(|_| self.config.saturation.group().contains(&techno.id));
            let flows: TechnoFlows<T> = match limited {
                Some(factor) => techno.flows.scale_operating(factor),
                None => techno.flows.clone(),
            };

            let floored = self.config.cutoff.apply(&flows.production[&main_key]);
            unsaturated_total = &unsaturated_total
                + &self.config.cutoff.apply(&raw_production[&techno.id]);
            for (key, series) in &flows.production {
                if *key == main_key {
                    accumulate(&mut production, key, &floored);
                } else {
                    accumulate(&mut production, key, series);
                }
            }
            for (key, series) in flows.consumption.iter().chain(&flows.construction) {
                accumulate(&mut consumption, key, series);
            }
            land_use = &land_use + &flows.land_use;
            production_by_techno.insert(techno.id.clone(), floored);
        }

        let prices: TechnoSeries<T> = technos
            .iter()
            .map(|techno| (techno.id.clone(), techno.price.price.clone()))
            .collect();
        let mix_weights =
            compute_mix_weights(&production_by_techno, &unsaturated_total, &prices, &years);
        let total_production = YearlySeries::sum_over(&years, production_by_techno.values());

        Ok(StreamAggregate {
            production,
            consumption,
            land_use,
            production_by_techno,
            total_production,
            mix_weights,
            saturation,
        })
    }

    fn saturation<T: Scalar>(
        &self,
        raw_production: &TechnoSeries<T>,
        available: Option<&YearlySeries<T>>,
        years: &std::ops::RangeInclusive<u32>,
    ) -> Result<Option<YearlySeries<T>>> {
        let group = self.config.saturation.group();
        if group.is_empty() {
            return Ok(None);
        }

        let id = self.id();
        let available =
            available.with_context(|| format!("No available supply given for stream {id}"))?;
        available.check_covers(years, &format!("available supply of {id}"))?;
        let requested = group
            .iter()
            .map(|techno| {
                raw_production.get(techno).with_context(|| {
                    format!("Techno {techno} is limited by stream {id} but does not supply it")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let requested = YearlySeries::sum_over(years, requested);

        let factor = saturation_factor(&requested, available);
        log_limited_years(&id.0, &factor);
        Ok(Some(factor))
    }

    /// Compute the mix-weighted price of the stream
    pub fn compute_price<T: Scalar>(
        &self,
        aggregate: &StreamAggregate<T>,
        outputs: &IndexMap<TechnoID, TechnoOutputs<T>>,
    ) -> Result<StreamPrice<T>> {
        let technos = self.techno_outputs(outputs)?;
        let years = aggregate.total_production.years();
        let price: TechnoSeries<T> = technos
            .iter()
            .map(|techno| (techno.id.clone(), techno.price.price.clone()))
            .collect();
        let price_wotax: TechnoSeries<T> = technos
            .iter()
            .map(|techno| (techno.id.clone(), techno.price.price_wotax.clone()))
            .collect();

        Ok(StreamPrice {
            price: aggregate.mix_weights.weighted_average(&price, &years),
            price_wotax: aggregate.mix_weights.weighted_average(&price_wotax, &years),
        })
    }
}
