//! Fatal configuration errors.
//!
//! These are raised while a technology or stream is being configured and abort the current
//! computation. Numeric degeneracies (division by zero, every technology below the production
//! threshold, ...) are never reported here: they are absorbed where they occur.
use thiserror::Error;

/// An error in the static configuration of a technology or stream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// The capex unit string is not one of the supported conventions
    #[error("Unsupported capex unit: {0}")]
    UnsupportedCapexUnit(String),
    /// A key required by the chosen configuration is missing
    #[error("Missing required key {key} for techno {techno}")]
    MissingKey {
        /// The technology being configured
        techno: String,
        /// The missing key
        key: &'static str,
    },
    /// The smoothing kernel name is not recognised
    #[error("Unknown smoothing kernel: {0}")]
    UnknownSmoothingKernel(String),
    /// A value is outside its allowed range
    #[error("Invalid value for {key} in techno {techno}: {reason}")]
    InvalidValue {
        /// The technology being configured
        techno: String,
        /// The offending key
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
    /// A value of an input series is outside its allowed range
    #[error("Invalid value {value} in {series} for {id}: {reason}")]
    InvalidSeriesValue {
        /// Name of the series
        series: &'static str,
        /// The commodity or technology the series belongs to
        id: String,
        /// The offending value
        value: f64,
        /// Why the value was rejected
        reason: &'static str,
    },
    /// A yearly series does not cover the model years
    #[error("Series {name} does not cover years {start}-{end}")]
    MisalignedSeries {
        /// Name of the series
        name: String,
        /// First model year
        start: u32,
        /// Last model year
        end: u32,
    },
}
