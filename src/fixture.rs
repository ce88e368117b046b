//! Fixtures for tests
use crate::flow::StreamUnit;
use crate::stream::StreamConfig;
use crate::stream::mix::CutoffPolicy;
use crate::stream::saturation::SaturationPolicy;
use crate::techno::config::TechnoConfig;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// An electrolyser producing hydrogen
pub const ELECTROLYSIS_TOML: &str = r#"
product = "hydrogen"
Capex_init = 1000.0
Capex_init_unit = "$/MWh"
learning_rate = 0.1
WACC = 0.05
lifetime = 20
ConstructionDelay = 2
efficiency = 0.7
Opex_percentage = 0.025
CO2_from_production = 0.0
initial_production = 100.0
initial_age_decay = 0.1
land_use_per_unit = 0.001
margin = 110.0
needs = {electricity = 1.0, water = 0.5}
byproducts = {oxygen = 8.0}
construction_resources = {copper = 0.01}
"#;

#[fixture]
pub fn techno_config() -> TechnoConfig {
    TechnoConfig::from_toml_str("Electrolysis", ELECTROLYSIS_TOML).unwrap()
}

#[fixture]
pub fn stream_config() -> StreamConfig {
    StreamConfig {
        id: "hydrogen".into(),
        unit: StreamUnit::TWh,
        technos: vec!["Electrolysis".into()],
        cutoff: CutoffPolicy::ExpMin,
        co2_per_use: 0.0,
        saturation: SaturationPolicy::None,
    }
}
