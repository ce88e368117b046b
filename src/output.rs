//! The module responsible for writing output data to disk.
use crate::emissions::EmissionsBalance;
use crate::flow::FlowTable;
use crate::id::{CommodityID, TechnoID};
use crate::simulation::{ModelResults, StreamResults};
use crate::techno::TechnoOutputs;
use crate::year::YearlySeries;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "technomix_results";

/// The output file name for technology prices
const TECHNO_PRICES_FILE_NAME: &str = "techno_prices.csv";

/// The output file name for technology flows
const TECHNO_FLOWS_FILE_NAME: &str = "techno_flows.csv";

/// The output file name for technology capital and fleet
const TECHNO_CAPITAL_FILE_NAME: &str = "techno_capital.csv";

/// The output file name for stream prices
const STREAM_PRICES_FILE_NAME: &str = "stream_prices.csv";

/// The output file name for mix weights
const MIX_WEIGHTS_FILE_NAME: &str = "mix_weights.csv";

/// The output file name for stream flows
const STREAM_FLOWS_FILE_NAME: &str = "stream_flows.csv";

/// The output file name for the emissions balance
const EMISSIONS_FILE_NAME: &str = "emissions.csv";

/// The output file name for cohort production
const COHORTS_FILE_NAME: &str = "debug_cohorts.csv";

/// The output file name for resource limitation
const LIMITING_INPUTS_FILE_NAME: &str = "debug_limiting_inputs.csv";

/// The output file name for saturation factors
const SATURATION_FILE_NAME: &str = "debug_saturation.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output dir contained existing data that was deleted, false if not, or an error.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The kind of a flow in the flows CSV files
#[derive(
    PartialEq, Debug, Clone, Copy, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
enum FlowKind {
    #[string = "production"]
    Production,
    #[string = "consumption"]
    Consumption,
    #[string = "construction"]
    Construction,
    #[string = "land_use"]
    LandUse,
}

/// Represents a row in the techno prices CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TechnoPriceRow {
    year: u32,
    techno_id: TechnoID,
    capex: f64,
    factory: f64,
    transport: f64,
    usage: f64,
    co2_tax: f64,
    price_wotax: f64,
    price: f64,
    capex_part: f64,
    opex_part: f64,
    co2_tax_part: f64,
    amortized_price: Option<f64>,
}

/// Represents a row in the techno flows CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TechnoFlowRow {
    year: u32,
    techno_id: TechnoID,
    kind: FlowKind,
    flow: String,
    value: f64,
}

/// Represents a row in the techno capital CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TechnoCapitalRow {
    year: u32,
    techno_id: TechnoID,
    fleet_production: f64,
    mean_age: f64,
    new_capacity: f64,
    applied_ratio: f64,
    capital: f64,
    non_use_capital: f64,
}

/// Represents a row in the stream prices CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StreamPriceRow {
    year: u32,
    stream_id: CommodityID,
    price: f64,
    price_wotax: f64,
}

/// Represents a row in the mix weights CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct MixWeightRow {
    year: u32,
    stream_id: CommodityID,
    techno_id: TechnoID,
    weight: f64,
}

/// Represents a row in the stream flows CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StreamFlowRow {
    year: u32,
    stream_id: CommodityID,
    kind: FlowKind,
    flow: String,
    value: f64,
}

/// Represents a row in the emissions CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct EmissionsRow {
    year: u32,
    quantity: String,
    value: f64,
}

/// Represents a row in the cohorts CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CohortRow {
    year: u32,
    techno_id: TechnoID,
    age: u32,
    production: f64,
}

/// Represents a row in the limiting inputs CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LimitingInputRow {
    year: u32,
    techno_id: TechnoID,
    ratio: f64,
    limiting_input: Option<CommodityID>,
}

/// Represents a row in the saturation CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SaturationRow {
    year: u32,
    stream_id: CommodityID,
    factor: f64,
}

/// Iterate over `(year, flow, value)` for every flow in a table
fn iter_flow_table(table: &FlowTable<f64>) -> impl Iterator<Item = (u32, String, f64)> + '_ {
    table.iter().flat_map(|(key, series)| {
        series
            .iter()
            .map(move |(year, value)| (year, key.to_string(), value))
    })
}

fn tagged(
    kind: FlowKind,
    table: &FlowTable<f64>,
) -> impl Iterator<Item = (FlowKind, u32, String, f64)> + '_ {
    iter_flow_table(table).map(move |(year, flow, value)| (kind, year, flow, value))
}

/// Every flow of a technology or stream, with its kind
fn iter_flows<'a>(
    production: &'a FlowTable<f64>,
    consumption: &'a FlowTable<f64>,
    construction: Option<&'a FlowTable<f64>>,
    land_use: &'a YearlySeries<f64>,
) -> impl Iterator<Item = (FlowKind, u32, String, f64)> + 'a {
    tagged(FlowKind::Production, production)
        .chain(tagged(FlowKind::Consumption, consumption))
        .chain(
            construction
                .into_iter()
                .flat_map(|table| tagged(FlowKind::Construction, table)),
        )
        .chain(
            land_use
                .iter()
                .map(|(year, value)| (FlowKind::LandUse, year, "land".to_string(), value)),
        )
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    cohorts_writer: csv::Writer<File>,
    limiting_inputs_writer: csv::Writer<File>,
    saturation_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            cohorts_writer: new_writer(COHORTS_FILE_NAME)?,
            limiting_inputs_writer: new_writer(LIMITING_INPUTS_FILE_NAME)?,
            saturation_writer: new_writer(SATURATION_FILE_NAME)?,
        })
    }

    /// Write the cohorts and resource limitation of a technology
    fn write_techno(&mut self, outputs: &TechnoOutputs<f64>) -> Result<()> {
        for record in &outputs.aging.records {
            let row = CohortRow {
                year: record.year,
                techno_id: outputs.id.clone(),
                age: record.age,
                production: record.production,
            };
            self.cohorts_writer.serialize(row)?;
        }

        let applied = &outputs.applied_ratio;
        for ((year, ratio), limiting_input) in applied.ratio.iter().zip(&applied.limiting_input) {
            let row = LimitingInputRow {
                year,
                techno_id: outputs.id.clone(),
                ratio,
                limiting_input: limiting_input.clone(),
            };
            self.limiting_inputs_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write the saturation factor of a stream, if it has one
    fn write_stream(&mut self, stream_id: &CommodityID, results: &StreamResults) -> Result<()> {
        let Some(factor) = &results.aggregate.saturation else {
            return Ok(());
        };

        for (year, factor) in factor.iter() {
            let row = SaturationRow {
                year,
                stream_id: stream_id.clone(),
                factor,
            };
            self.saturation_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.cohorts_writer.flush()?;
        self.limiting_inputs_writer.flush()?;
        self.saturation_writer.flush()?;

        Ok(())
    }
}

/// An object for writing model results to file
pub struct DataWriter {
    techno_prices_writer: csv::Writer<File>,
    techno_flows_writer: csv::Writer<File>,
    techno_capital_writer: csv::Writer<File>,
    stream_prices_writer: csv::Writer<File>,
    mix_weights_writer: csv::Writer<File>,
    stream_flows_writer: csv::Writer<File>,
    emissions_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            techno_prices_writer: new_writer(TECHNO_PRICES_FILE_NAME)?,
            techno_flows_writer: new_writer(TECHNO_FLOWS_FILE_NAME)?,
            techno_capital_writer: new_writer(TECHNO_CAPITAL_FILE_NAME)?,
            stream_prices_writer: new_writer(STREAM_PRICES_FILE_NAME)?,
            mix_weights_writer: new_writer(MIX_WEIGHTS_FILE_NAME)?,
            stream_flows_writer: new_writer(STREAM_FLOWS_FILE_NAME)?,
            emissions_writer: new_writer(EMISSIONS_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write everything computed for a model
    pub fn write_results(&mut self, results: &ModelResults) -> Result<()> {
        for outputs in results.technos.values() {
            self.write_techno(outputs)?;
        }
        for (id, stream) in &results.streams {
            self.write_stream(id, stream)?;
        }
        self.write_emissions(&results.emissions)
    }

    /// Write the prices, flows and capital of a technology
    pub fn write_techno(&mut self, outputs: &TechnoOutputs<f64>) -> Result<()> {
        let price = &outputs.price;
        for (idx, year) in outputs.capex.years().enumerate() {
            let row = TechnoPriceRow {
                year,
                techno_id: outputs.id.clone(),
                capex: price.capex.values()[idx],
                factory: price.factory.values()[idx],
                transport: price.transport.values()[idx],
                usage: price.usage_total.values()[idx],
                co2_tax: price.co2_tax.values()[idx],
                price_wotax: price.price_wotax.values()[idx],
                price: price.price.values()[idx],
                capex_part: price.capex_part.values()[idx],
                opex_part: price.opex_part.values()[idx],
                co2_tax_part: price.co2_tax_part.values()[idx],
                amortized_price: price.amortized_price.as_ref().map(|p| p.values()[idx]),
            };
            self.techno_prices_writer.serialize(row)?;

            let row = TechnoCapitalRow {
                year,
                techno_id: outputs.id.clone(),
                fleet_production: outputs.aging.production.values()[idx],
                mean_age: outputs.aging.mean_age.values()[idx],
                new_capacity: outputs.aging.new_capacity.values()[idx],
                applied_ratio: outputs.applied_ratio.ratio.values()[idx],
                capital: outputs.capital.values()[idx],
                non_use_capital: outputs.non_use_capital.values()[idx],
            };
            self.techno_capital_writer.serialize(row)?;
        }

        let flows = &outputs.flows;
        for (kind, year, flow, value) in iter_flows(
            &flows.production,
            &flows.consumption,
            Some(&flows.construction),
            &flows.land_use,
        ) {
            let row = TechnoFlowRow {
                year,
                techno_id: outputs.id.clone(),
                kind,
                flow,
                value,
            };
            self.techno_flows_writer.serialize(row)?;
        }

        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_techno(outputs)?;
        }

        Ok(())
    }

    /// Write the price, mix and flows of a stream
    pub fn write_stream(&mut self, stream_id: &CommodityID, results: &StreamResults) -> Result<()> {
        let price = &results.price;
        for ((year, value), value_wotax) in price.price.iter().zip(price.price_wotax.values()) {
            let row = StreamPriceRow {
                year,
                stream_id: stream_id.clone(),
                price: value,
                price_wotax: *value_wotax,
            };
            self.stream_prices_writer.serialize(row)?;
        }

        let aggregate = &results.aggregate;
        for (techno_id, weights) in aggregate.mix_weights.iter() {
            for (year, weight) in weights.iter() {
                let row = MixWeightRow {
                    year,
                    stream_id: stream_id.clone(),
                    techno_id: techno_id.clone(),
                    weight,
                };
                self.mix_weights_writer.serialize(row)?;
            }
        }

        for (kind, year, flow, value) in iter_flows(
            &aggregate.production,
            &aggregate.consumption,
            None,
            &aggregate.land_use,
        ) {
            let row = StreamFlowRow {
                year,
                stream_id: stream_id.clone(),
                kind,
                flow,
                value,
            };
            self.stream_flows_writer.serialize(row)?;
        }

        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_stream(stream_id, results)?;
        }

        Ok(())
    }

    /// Write the emissions balance
    pub fn write_emissions(&mut self, emissions: &EmissionsBalance<f64>) -> Result<()> {
        let mut quantities = vec![
            ("from_energy_mix".to_string(), &emissions.from_energy_mix),
            (
                "carbon_capture_from_energy_mix".to_string(),
                &emissions.carbon_capture_from_energy_mix,
            ),
            ("removed_by_energy_mix".to_string(), &emissions.removed_by_energy_mix),
            ("needed_by_energy_mix".to_string(), &emissions.needed_by_energy_mix),
            ("co2_by_use".to_string(), &emissions.co2_by_use),
            ("total_co2".to_string(), &emissions.total_co2),
        ];
        for (gas, balance) in &emissions.species {
            quantities.push((format!("{gas}_sources"), &balance.sources));
            quantities.push((format!("{gas}_sinks"), &balance.sinks));
            quantities.push((format!("{gas}_net"), &balance.net));
        }
        quantities.push(("gwp_20".to_string(), &emissions.gwp_20));
        quantities.push(("gwp_100".to_string(), &emissions.gwp_100));

        for (quantity, series) in quantities {
            for (year, value) in series.iter() {
                let row = EmissionsRow {
                    year,
                    quantity: quantity.clone(),
                    value,
                };
                self.emissions_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.techno_prices_writer.flush()?;
        self.techno_flows_writer.flush()?;
        self.techno_capital_writer.flush()?;
        self.stream_prices_writer.flush()?;
        self.mix_weights_writer.flush()?;
        self.stream_flows_writer.flush()?;
        self.emissions_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}
