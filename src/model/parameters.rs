//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::flow::StreamUnit;
use crate::id::{CommodityID, IDCollection, TechnoID};
use crate::input::{input_err_msg, read_toml};
use crate::smooth::SmoothingKernel;
use crate::stream::mix::CutoffPolicy;
use crate::stream::saturation::SaturationPolicy;
use crate::stream::{Stream, StreamConfig};
use crate::techno::ratio::RatioSettings;
use crate::year::check_year_range;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_apply_ratio, bool, true);
define_param_default!(default_smoothing, String, SmoothingKernel::default().to_string());
define_param_default!(default_exp_min, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// The years covered by the model
    pub years: YearsParameters,
    /// How resource ratios limit technologies
    #[serde(default)]
    pub ratio: RatioParameters,
    /// The streams of the energy system
    pub streams: Vec<StreamParameters>,
    /// Which streams count towards the emissions balance
    #[serde(default)]
    pub emissions: EmissionsParameters,
}

/// The `[years]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
pub struct YearsParameters {
    /// First model year
    pub start: u32,
    /// Last model year
    pub end: u32,
}

/// The `[ratio]` section of the model file
#[derive(Debug, Deserialize, PartialEq)]
pub struct RatioParameters {
    /// Whether technologies are limited by the availability of their inputs
    #[serde(default = "default_apply_ratio")]
    pub apply_ratio: bool,
    /// The kernel used for the smoothed minimum of resource ratios
    #[serde(default = "default_smoothing")]
    pub smoothing: String,
}

impl Default for RatioParameters {
    fn default() -> Self {
        Self {
            apply_ratio: default_apply_ratio(),
            smoothing: default_smoothing(),
        }
    }
}

/// One entry of the `[[streams]]` array of the model file
#[derive(Debug, Deserialize, PartialEq)]
pub struct StreamParameters {
    /// The commodity supplied by the stream
    pub id: String,
    /// The unit the commodity is measured in
    #[serde(default)]
    pub unit: StreamUnit,
    /// Technologies supplying the stream, in order
    pub technos: Vec<String>,
    /// Whether production is floored smoothly (otherwise a hard cutoff is used)
    #[serde(default = "default_exp_min")]
    pub exp_min: bool,
    /// CO2 emitted when the commodity is used
    #[serde(default)]
    pub co2_per_use: f64,
    /// Technologies whose production is capped by an external supply
    #[serde(default)]
    pub saturation_group: Vec<String>,
}

/// The `[emissions]` section of the model file
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct EmissionsParameters {
    /// Streams included in the balance (all of them if absent)
    pub include: Option<Vec<String>>,
}

impl StreamParameters {
    fn to_config(&self) -> StreamConfig {
        let saturation = if self.saturation_group.is_empty() {
            SaturationPolicy::None
        } else {
            SaturationPolicy::ExponentialCap {
                group: self.saturation_group.iter().map(|id| id.as_str().into()).collect(),
            }
        };

        StreamConfig {
            id: self.id.as_str().into(),
            unit: self.unit,
            technos: self.technos.iter().map(|id| id.as_str().into()).collect(),
            cutoff: CutoffPolicy::from_exp_min(self.exp_min),
            co2_per_use: self.co2_per_use,
            saturation,
        }
    }

    /// Check the parameters of one stream
    fn validate(&self) -> Result<()> {
        let id = &self.id;
        ensure!(!self.technos.is_empty(), "Stream {id} has no technos");
        let technos: IndexSet<TechnoID> =
            self.technos.iter().map(|id| id.as_str().into()).collect();
        ensure!(
            technos.len() == self.technos.len(),
            "Stream {id} lists the same techno more than once"
        );
        ensure!(
            self.co2_per_use.is_finite(),
            "co2_per_use of stream {id} must be a finite number"
        );
        for techno in &self.saturation_group {
            technos
                .get_id_by_str(techno)
                .with_context(|| format!("Invalid saturation_group for stream {id}"))?;
        }
        if !self.exp_min {
            warn!(
                "Stream {id} uses a hard cutoff, so its mix weights are not differentiable at the \
                production threshold"
            );
        }

        Ok(())
    }
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // years
        check_year_range(self.years.start, self.years.end)?;

        // ratio
        self.ratio_settings()?;

        // streams
        ensure!(!self.streams.is_empty(), "At least one stream must be defined");
        let streams = self.streams()?;
        for stream in &self.streams {
            stream.validate()?;
        }

        // emissions
        self.emission_streams(&streams)?;

        Ok(())
    }

    /// The model years
    pub fn years(&self) -> RangeInclusive<u32> {
        self.years.start..=self.years.end
    }

    /// How resource ratios limit technologies
    pub fn ratio_settings(&self) -> Result<RatioSettings> {
        Ok(RatioSettings {
            apply_ratio: self.ratio.apply_ratio,
            kernel: SmoothingKernel::parse(&self.ratio.smoothing)?,
        })
    }

    /// The streams of the energy system, by ID
    pub fn streams(&self) -> Result<IndexMap<CommodityID, Stream>> {
        let mut streams = IndexMap::new();
        for parameters in &self.streams {
            let config = parameters.to_config();
            let id = config.id.clone();
            ensure!(
                streams.insert(id.clone(), Stream::new(config)).is_none(),
                "Stream {id} is defined more than once"
            );
        }

        Ok(streams)
    }

    /// The streams counted in the emissions balance
    pub fn emission_streams(
        &self,
        streams: &IndexMap<CommodityID, Stream>,
    ) -> Result<Vec<CommodityID>> {
        match &self.emissions.include {
            None => Ok(streams.keys().cloned().collect()),
            Some(include) => include
                .iter()
                .map(|id| {
                    streams
                        .get_id_by_str(id)
                        .context("Invalid stream in emissions.include")
                })
                .collect(),
        }
    }
}
