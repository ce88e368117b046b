//! Functionality for running the model.
//!
//! Every technology is computed first, from the model's input series. Streams then mix the
//! outputs of their technologies and the emissions balance is drawn up from the streams. The
//! whole model is recomputed in one pass; nothing is iterated to convergence.
use crate::emissions::{EmissionsBalance, compute_emissions};
use crate::id::{CommodityID, TechnoID};
use crate::model::Model;
use crate::output::DataWriter;
use crate::output::metadata::write_metadata;
use crate::stream::{StreamAggregate, StreamPrice};
use crate::techno::TechnoOutputs;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::info;
use std::path::Path;

/// What was computed for a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamResults {
    /// Flows and mix
    pub aggregate: StreamAggregate<f64>,
    /// Mix-weighted price
    pub price: StreamPrice<f64>,
}

/// Everything computed for a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResults {
    /// Outputs of every technology
    pub technos: IndexMap<TechnoID, TechnoOutputs<f64>>,
    /// Results of every stream
    pub streams: IndexMap<CommodityID, StreamResults>,
    /// The greenhouse gas balance
    pub emissions: EmissionsBalance<f64>,
}

/// Compute every technology, stream and the emissions balance of the model
pub fn compute(model: &Model) -> Result<ModelResults> {
    let mut technos = IndexMap::new();
    for (id, techno) in &model.technos {
        info!("Computing techno {id}");
        let outputs = techno.compute(&model.techno_inputs(id), &model.ratio)?;
        technos.insert(id.clone(), outputs);
    }

    let mut streams = IndexMap::new();
    for (id, stream) in &model.streams {
        info!("Computing stream {id}");
        let available = model.inputs.constrained_supply.get(id);
        let aggregate = stream.compute_production(&technos, available)?;
        let price = stream
            .compute_price(&aggregate, &technos)
            .with_context(|| format!("Could not price stream {id}"))?;
        streams.insert(id.clone(), StreamResults { aggregate, price });
    }

    info!("Computing emissions");
    let included: Vec<_> = model
        .emission_streams
        .iter()
        .map(|id| (&model.streams[id].config, &streams[id].aggregate))
        .collect();
    let emissions = compute_emissions(&included, &model.inputs.external_emissions, &model.years());

    Ok(ModelResults {
        technos,
        streams,
        emissions,
    })
}

/// Run the model and write the results.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. cohorts) to output files
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<()> {
    write_metadata(output_path, model)?;
    let results = compute(model)?;

    let mut writer = DataWriter::create(output_path, debug_model)?;
    writer.write_results(&results)?;
    writer.flush()?;

    Ok(())
}
