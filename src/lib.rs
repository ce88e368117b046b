//! Techno-economic models of energy-supply and carbon-management technologies.
//!
//! Technologies turn investment into capacity, production, prices and flows. Streams mix the
//! technologies supplying one commodity and the emissions balance adds up greenhouse gases over
//! the streams.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod emissions;
pub mod error;
pub mod finance;
pub mod flow;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod scalar;
pub mod settings;
pub mod simulation;
pub mod smooth;
pub mod stream;
pub mod techno;
pub mod units;
pub mod year;

#[cfg(test)]
mod fixture;

/// Get the config dir for the program, where the settings file is stored
pub fn get_technomix_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform, so use the working directory
        return PathBuf::default();
    };
    config_dir.push("technomix");

    config_dir
}
