//! Code for reading the yearly series a model is computed from.
use super::{input_err_msg, read_csv, read_csv_optional};
use crate::emissions::ExternalEmissions;
use crate::error::ConfigurationError;
use crate::id::{CommodityID, IDCollection, IDLike, TechnoID};
use crate::model::ModelInputs;
use crate::stream::Stream;
use crate::techno::Techno;
use crate::year::YearlySeries;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

const INVESTMENTS_FILE_NAME: &str = "investments.csv";
const PRICES_FILE_NAME: &str = "prices.csv";
const CO2_TAXES_FILE_NAME: &str = "co2_taxes.csv";
const CO2_INTENSITIES_FILE_NAME: &str = "co2_intensities.csv";
const RESOURCE_RATIOS_FILE_NAME: &str = "resource_ratios.csv";
const UTILISATION_FILE_NAME: &str = "utilisation.csv";
const CONSTRAINED_SUPPLY_FILE_NAME: &str = "constrained_supply.csv";
const CCUS_FILE_NAME: &str = "ccus.csv";
const EMISSION_SOURCES_FILE_NAME: &str = "emission_sources.csv";
const EMISSION_SINKS_FILE_NAME: &str = "emission_sinks.csv";

/// A value for one year
#[derive(Debug, PartialEq, Deserialize)]
struct YearValue {
    year: u32,
    value: f64,
}

/// A value for one year and one technology, commodity, stream or named source
#[derive(Debug, PartialEq, Deserialize)]
struct KeyedYearValue {
    year: u32,
    #[serde(alias = "techno_id", alias = "commodity_id", alias = "stream_id", alias = "name")]
    id: String,
    value: f64,
}

/// Build a series covering `years` from the rows of a file
fn series_from_iter<I>(iter: I, years: &RangeInclusive<u32>) -> Result<YearlySeries<f64>>
where
    I: Iterator<Item = YearValue>,
{
    let pairs = iter
        .map(|row| {
            ensure!(
                row.value.is_finite(),
                "Non-finite value given for year {}",
                row.year
            );
            Ok((row.year, row.value))
        })
        .collect::<Result<Vec<_>>>()?;

    YearlySeries::from_year_values(years, pairs)
}

/// Build one series per ID from the rows of a file, in order of first appearance
fn keyed_series_from_iter<ID, I>(
    iter: I,
    years: &RangeInclusive<u32>,
) -> Result<IndexMap<ID, YearlySeries<f64>>>
where
    ID: IDLike,
    I: Iterator<Item = KeyedYearValue>,
{
    let mut grouped: IndexMap<String, Vec<YearValue>> = IndexMap::new();
    for row in iter {
        grouped.entry(row.id).or_default().push(YearValue {
            year: row.year,
            value: row.value,
        });
    }

    grouped
        .into_iter()
        .map(|(id, rows)| {
            let series = series_from_iter(rows.into_iter(), years)
                .with_context(|| format!("Invalid series for {id}"))?;
            Ok((ID::from(id), series))
        })
        .collect()
}

/// Read an optional file holding a single series
fn read_series(file_path: &Path, years: &RangeInclusive<u32>) -> Result<Option<YearlySeries<f64>>> {
    if !file_path.exists() {
        return Ok(None);
    }

    let iter = read_csv::<YearValue>(file_path)?;
    let series = series_from_iter(iter, years).with_context(|| input_err_msg(file_path))?;
    Ok(Some(series))
}

/// Read a file holding one series per ID. A missing file gives no series.
fn read_keyed_series<ID: IDLike>(
    file_path: &Path,
    years: &RangeInclusive<u32>,
) -> Result<IndexMap<ID, YearlySeries<f64>>> {
    let iter = read_csv_optional::<KeyedYearValue>(file_path)?;
    keyed_series_from_iter(iter, years).with_context(|| input_err_msg(file_path))
}

/// Check that every ID in `series` is known
fn check_ids_known<ID: IDLike, V>(
    file_path: &Path,
    series: &IndexMap<ID, YearlySeries<f64>>,
    known: &IndexMap<ID, V>,
) -> Result<()> {
    for id in series.keys() {
        known
            .get_id_by_str(&id.to_string())
            .with_context(|| input_err_msg(file_path))?;
    }

    Ok(())
}

/// Check that every value of every series is non-negative
fn check_non_negative<ID: IDLike>(
    file_path: &Path,
    series: &IndexMap<ID, YearlySeries<f64>>,
) -> Result<()> {
    for (id, values) in series {
        ensure!(
            values.values().iter().all(|value| *value >= 0.0),
            "{}: values for {id} must be non-negative",
            input_err_msg(file_path)
        );
    }

    Ok(())
}

/// Check that every value of every series is a percentage between 0 and 100
fn check_percentages<ID: IDLike>(
    file_path: &Path,
    name: &'static str,
    series: &IndexMap<ID, YearlySeries<f64>>,
) -> Result<()> {
    for (id, values) in series {
        if let Some(value) = values
            .values()
            .iter()
            .find(|value| !(0.0..=100.0).contains(*value))
        {
            let err = ConfigurationError::InvalidSeriesValue {
                series: name,
                id: id.to_string(),
                value: *value,
                reason: "must be between 0 and 100",
            };
            return Err(anyhow::Error::new(err).context(input_err_msg(file_path)));
        }
    }

    Ok(())
}

/// Read every investment, one series per technology
fn read_investments(
    model_dir: &Path,
    years: &RangeInclusive<u32>,
    technos: &IndexMap<TechnoID, Techno>,
) -> Result<IndexMap<TechnoID, YearlySeries<f64>>> {
    let file_path = model_dir.join(INVESTMENTS_FILE_NAME);
    let iter = read_csv::<KeyedYearValue>(&file_path)?;
    let investments =
        keyed_series_from_iter(iter, years).with_context(|| input_err_msg(&file_path))?;
    check_ids_known(&file_path, &investments, technos)?;
    for id in technos.keys() {
        ensure!(
            investments.contains_key(id),
            "{}: no investment given for techno {id}",
            input_err_msg(&file_path)
        );
    }

    Ok(investments)
}

/// Read the prices of inputs, which must cover every technology's needs
fn read_prices(
    model_dir: &Path,
    years: &RangeInclusive<u32>,
    technos: &IndexMap<TechnoID, Techno>,
) -> Result<IndexMap<CommodityID, YearlySeries<f64>>> {
    let file_path = model_dir.join(PRICES_FILE_NAME);
    let prices = read_keyed_series(&file_path, years)?;
    for techno in technos.values() {
        for commodity in techno.config.needs.keys() {
            ensure!(
                prices.contains_key(commodity),
                "{}: no price given for {commodity}, which is needed by techno {}",
                input_err_msg(&file_path),
                techno.id()
            );
        }
    }

    Ok(prices)
}

/// Read the external supply of streams limited by it
fn read_constrained_supply(
    model_dir: &Path,
    years: &RangeInclusive<u32>,
    streams: &IndexMap<CommodityID, Stream>,
) -> Result<IndexMap<CommodityID, YearlySeries<f64>>> {
    let file_path = model_dir.join(CONSTRAINED_SUPPLY_FILE_NAME);
    let supply = read_keyed_series(&file_path, years)?;
    check_ids_known(&file_path, &supply, streams)?;
    check_non_negative(&file_path, &supply)?;
    for stream in streams.values() {
        ensure!(
            stream.config.saturation.group().is_empty() || supply.contains_key(stream.id()),
            "{}: no supply given for stream {}, which is limited by it",
            input_err_msg(&file_path),
            stream.id()
        );
    }

    Ok(supply)
}

/// Read the emissions and removals from outside the energy system
fn read_external_emissions(
    model_dir: &Path,
    years: &RangeInclusive<u32>,
) -> Result<ExternalEmissions<f64>> {
    let ccus_captured = read_series(&model_dir.join(CCUS_FILE_NAME), years)?;
    Ok(ExternalEmissions {
        ccus_captured,
        sources: read_keyed_series(&model_dir.join(EMISSION_SOURCES_FILE_NAME), years)?,
        sinks: read_keyed_series(&model_dir.join(EMISSION_SINKS_FILE_NAME), years)?,
    })
}

/// Read every yearly series of a model.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `years` - The model years, which every series must cover
/// * `technos` - The model's technologies
/// * `streams` - The model's streams
pub fn read_model_inputs(
    model_dir: &Path,
    years: &RangeInclusive<u32>,
    technos: &IndexMap<TechnoID, Techno>,
    streams: &IndexMap<CommodityID, Stream>,
) -> Result<ModelInputs> {
    let investments = read_investments(model_dir, years, technos)?;
    let prices = read_prices(model_dir, years, technos)?;
    let co2_tax = read_series(&model_dir.join(CO2_TAXES_FILE_NAME), years)?
        .unwrap_or_else(|| YearlySeries::zeros(years));
    let co2_intensities = read_keyed_series(&model_dir.join(CO2_INTENSITIES_FILE_NAME), years)?;

    let file_path = model_dir.join(RESOURCE_RATIOS_FILE_NAME);
    let resource_ratios = read_keyed_series(&file_path, years)?;
    check_percentages(&file_path, "resource_ratios", &resource_ratios)?;

    let file_path = model_dir.join(UTILISATION_FILE_NAME);
    let utilisation = read_keyed_series(&file_path, years)?;
    check_ids_known(&file_path, &utilisation, technos)?;
    check_percentages(&file_path, "utilisation", &utilisation)?;

    Ok(ModelInputs {
        investments,
        prices,
        co2_tax,
        co2_intensities,
        resource_ratios,
        utilisation,
        constrained_supply: read_constrained_supply(model_dir, years, streams)?,
        external_emissions: read_external_emissions(model_dir, years)?,
    })
}
