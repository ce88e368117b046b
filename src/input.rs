//! Common routines for handling input data.
use crate::id::{CommodityID, IDCollection, TechnoID};
use crate::model::{Model, ModelInputs, ModelParameters};
use crate::stream::Stream;
use crate::techno::Techno;
use crate::techno::config::{TechnoConfig, parse_technos};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod series;
use series::read_model_inputs;

const TECHNOS_FILE_NAME: &str = "technos.toml";

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file, if the file exists.
///
/// A missing file is treated as an empty one.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_internal(file_path)?.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read the technology configurations from `technos.toml`
pub fn read_technos(model_dir: &Path) -> Result<IndexMap<TechnoID, TechnoConfig>> {
    let file_path = model_dir.join(TECHNOS_FILE_NAME);
    let toml_str = fs::read_to_string(&file_path).with_context(|| input_err_msg(&file_path))?;
    let technos = parse_technos(&toml_str).with_context(|| input_err_msg(&file_path))?;
    ensure!(
        !technos.is_empty(),
        "{} must define at least one techno",
        file_path.display()
    );

    Ok(technos)
}

/// Check that the streams and technologies fit together
fn check_streams(
    streams: &IndexMap<CommodityID, Stream>,
    technos: &IndexMap<TechnoID, Techno>,
) -> Result<()> {
    for stream in streams.values() {
        for id in &stream.config.technos {
            let id = technos.get_id_by_str(id.as_str())?;
            let product = technos[&id].product();
            ensure!(
                product == stream.id(),
                "Techno {id} produces {product}, so cannot supply stream {}",
                stream.id()
            );
        }
    }

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data ([`Model`]) or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let technos: IndexMap<TechnoID, Techno> = read_technos(model_dir)?
        .into_iter()
        .map(|(id, config)| (id, Techno::new(config)))
        .collect();
    let streams = parameters.streams()?;
    check_streams(&streams, &technos)?;

    let years = parameters.years();
    let inputs: ModelInputs = read_model_inputs(model_dir, &years, &technos, &streams)?;

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        ratio: parameters.ratio_settings()?,
        emission_streams: parameters.emission_streams(&streams)?,
        parameters,
        technos,
        streams,
        inputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{ELECTROLYSIS_TOML, assert_error, stream_config};
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\nworld,2");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // Whitespace is trimmed
        let file_path = create_csv_file(dir.path(), "id , value\n hello , 1 ");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(records.len(), 1);

        // File with no data (only column headers)
        let file_path = create_csv_file(dir.path(), "id,value");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .next()
                .is_none()
        );

        // Missing file
        let file_path = dir.path().join("missing.csv");
        assert!(read_csv::<Record>(&file_path).is_err());
        assert!(
            read_csv_optional::<Record>(&file_path)
                .unwrap()
                .next()
                .is_none()
        );
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "value = 1").unwrap();
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Value {
            value: u32,
        }
        assert_eq!(read_toml::<Value>(&file_path).unwrap(), Value { value: 1 });

        let missing = dir.path().join("missing.toml");
        assert_error!(
            read_toml::<Value>(&missing),
            format!("Error reading {}", missing.display())
        );
    }

    #[test]
    fn test_read_technos() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(TECHNOS_FILE_NAME)).unwrap();
            writeln!(file, "[Electrolysis]\n{ELECTROLYSIS_TOML}").unwrap();
        }
        let technos = read_technos(dir.path()).unwrap();
        assert_eq!(technos.len(), 1);
        assert_eq!(technos["Electrolysis"].product, "hydrogen".into());
    }

    #[test]
    fn test_check_streams() {
        let config = TechnoConfig::from_toml_str("Electrolysis", ELECTROLYSIS_TOML).unwrap();
        let technos = IndexMap::from([(config.id.clone(), Techno::new(config))]);
        let mut config = stream_config();
        let streams = IndexMap::from([(config.id.clone(), Stream::new(config.clone()))]);
        check_streams(&streams, &technos).unwrap();

        config.technos.push("SMR".into());
        let streams = IndexMap::from([(config.id.clone(), Stream::new(config))]);
        assert_error!(check_streams(&streams, &technos), "Unknown ID SMR found");
    }

    #[test]
    fn test_check_streams_wrong_product() {
        let config = TechnoConfig::from_toml_str("Electrolysis", ELECTROLYSIS_TOML).unwrap();
        let technos = IndexMap::from([(config.id.clone(), Techno::new(config))]);
        let mut config = stream_config();
        config.id = "methane".into();
        let streams = IndexMap::from([(config.id.clone(), Stream::new(config))]);
        assert_error!(
            check_streams(&streams, &technos),
            "Techno Electrolysis produces hydrogen, so cannot supply stream methane"
        );
    }
}
