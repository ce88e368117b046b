//! The model represents the static input data provided by the user.
use crate::emissions::ExternalEmissions;
use crate::id::{CommodityID, TechnoID};
use crate::stream::Stream;
use crate::techno::pricing::InputSeries;
use crate::techno::ratio::RatioSettings;
use crate::techno::{Techno, TechnoInputs};
use crate::year::YearlySeries;
use indexmap::IndexMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// The yearly series a model is computed from
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
    /// Investment in each technology (G$)
    pub investments: IndexMap<TechnoID, YearlySeries<f64>>,
    /// Price of each input commodity
    pub prices: InputSeries<f64>,
    /// CO2 tax ($/tCO2)
    pub co2_tax: YearlySeries<f64>,
    /// Carbon intensity of input commodities
    pub co2_intensities: InputSeries<f64>,
    /// Availability of scarce commodities, in percent of demand
    pub resource_ratios: InputSeries<f64>,
    /// Utilisation of technologies, in percent
    pub utilisation: IndexMap<TechnoID, YearlySeries<f64>>,
    /// External supply capping streams with a saturation group
    pub constrained_supply: IndexMap<CommodityID, YearlySeries<f64>>,
    /// Emissions and removals from outside the energy system
    pub external_emissions: ExternalEmissions<f64>,
}

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// How resource ratios limit technologies
    pub ratio: RatioSettings,
    /// Technologies
    pub technos: IndexMap<TechnoID, Techno>,
    /// Streams
    pub streams: IndexMap<CommodityID, Stream>,
    /// Streams counted in the emissions balance
    pub emission_streams: Vec<CommodityID>,
    /// Yearly input series
    pub inputs: ModelInputs,
}

impl Model {
    /// The model years
    pub fn years(&self) -> RangeInclusive<u32> {
        self.parameters.years()
    }

    /// The inputs of one technology.
    ///
    /// # Panics
    ///
    /// Panics if the technology has no investment, which loading the model rules out.
    pub fn techno_inputs(&self, id: &TechnoID) -> TechnoInputs<'_, f64> {
        TechnoInputs {
            investment: &self.inputs.investments[id],
            input_prices: &self.inputs.prices,
            co2_tax: &self.inputs.co2_tax,
            input_co2_intensities: &self.inputs.co2_intensities,
            resource_ratios: &self.inputs.resource_ratios,
            utilisation: self.inputs.utilisation.get(id),
        }
    }
}
