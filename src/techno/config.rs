//! Static configuration of a technology.
//!
//! Technologies are described in TOML as one table per technology. The keys are snake_case, but
//! the capitalised names used by older data sets are accepted as aliases.
use crate::error::ConfigurationError;
use crate::flow::FlowKey;
use crate::id::{CommodityID, TechnoID};
use crate::techno::aging::AgeDistribution;
use crate::techno::learning::CapacityFactorRamp;
use crate::units::{
    CapexConversion, CapexUnit, DEFAULT_EURO_DOLLAR, EnergyPerMass, Hours, MassPerArea,
    MassPerVolume, MoneyPerEnergy,
};
use ::log::warn;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;

/// Default lower bound on learning, as a fraction of the initial capex
pub const DEFAULT_MAXIMUM_LEARNING_CAPEX_RATIO: f64 = 0.9;
/// Default decay of the legacy age distribution
pub const DEFAULT_INITIAL_AGE_DECAY: f64 = 0.1;
/// Default conversion of investments from G$ to M$
pub const DEFAULT_SCALING_FACTOR_INVEST_LEVEL: f64 = 1000.0;
/// Default conversion of capital from M$ to G$
pub const DEFAULT_SCALING_FACTOR_TECHNO_PRODUCTION: f64 = 1000.0;

/// Properties of the fuel a technology produces
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct FuelProperties {
    /// Density (kg/m³)
    pub density: Option<MassPerVolume>,
    /// Calorific value (kWh/kg)
    pub calorific_value: Option<EnergyPerMass>,
    /// Yearly yield of cultivated land (kg/ha)
    pub density_per_ha: Option<MassPerArea>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TechnoConfigRaw {
    product: Option<String>,
    #[serde(alias = "Capex_init")]
    capex_init: Option<f64>,
    #[serde(alias = "Capex_init_unit")]
    capex_init_unit: Option<String>,
    learning_rate: Option<f64>,
    #[serde(alias = "WACC")]
    wacc: Option<f64>,
    lifetime: Option<u32>,
    #[serde(alias = "ConstructionDelay", default)]
    construction_delay: u32,
    efficiency: Option<f64>,
    efficiency_max: Option<f64>,
    techno_evo_time: Option<f64>,
    efficiency_slope: Option<f64>,
    #[serde(alias = "Opex_percentage")]
    opex_percentage: Option<f64>,
    maximum_learning_capex_ratio: Option<f64>,
    #[serde(alias = "CO2_from_production", default)]
    co2_from_production: f64,
    full_load_hours: Option<Hours>,
    #[serde(default)]
    initial_production: f64,
    initial_age_decay: Option<f64>,
    initial_age_distribution: Option<Vec<f64>>,
    capacity_factor: Option<f64>,
    capacity_factor_at_year_end: Option<f64>,
    #[serde(default)]
    decommissioning_percentage: f64,
    nb_years_amort_capex: Option<u32>,
    euro_dollar: Option<f64>,
    #[serde(default)]
    land_use_per_unit: f64,
    #[serde(default)]
    needs: IndexMap<String, f64>,
    #[serde(default)]
    byproducts: IndexMap<FlowKey, f64>,
    #[serde(default)]
    construction_resources: IndexMap<String, f64>,
    scaling_factor_invest_level: Option<f64>,
    scaling_factor_techno_production: Option<f64>,
    #[serde(default)]
    fuel: FuelProperties,
    #[serde(default)]
    transport_cost: f64,
    transport_margin: Option<f64>,
    margin: Option<f64>,
    #[serde(default)]
    invest_before_year_start: Vec<f64>,
}

/// How the conversion efficiency of a technology evolves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Efficiency {
    /// The same efficiency every year
    Constant(f64),
    /// A sigmoid rising from `initial` towards `max`, centred `evo_time` years after the start
    Sigmoid {
        /// Efficiency in the first year
        initial: f64,
        /// Asymptotic efficiency
        max: f64,
        /// Years from the start until the midpoint of the sigmoid
        evo_time: f64,
        /// Steepness of the sigmoid
        slope: f64,
    },
}

impl Efficiency {
    /// The efficiency in `year`, for a model starting in `year_start`
    pub fn at(&self, year: u32, year_start: u32) -> f64 {
        match *self {
            Self::Constant(efficiency) => efficiency,
            Self::Sigmoid {
                initial,
                max,
                evo_time,
                slope,
            } => {
                let elapsed = year as f64 - year_start as f64 - evo_time;
                initial + (max - initial) / (1.0 + (-slope * elapsed).exp())
            }
        }
    }
}

/// Static parameters of a technology, validated and with units normalised
#[derive(Debug, Clone, PartialEq)]
pub struct TechnoConfig {
    /// The technology's ID
    pub id: TechnoID,
    /// The commodity the technology produces
    pub product: CommodityID,
    /// Initial capex in $/MWh (or $/t) of yearly output
    pub capex_init: MoneyPerEnergy,
    /// The unit `capex_init` was given in
    pub capex_unit: CapexUnit,
    /// Fractional cost reduction per doubling of cumulative investment
    pub learning_rate: f64,
    /// Weighted average cost of capital
    pub wacc: f64,
    /// Lifetime of a cohort in years
    pub lifetime: u32,
    /// Years between investment and production
    pub construction_delay: u32,
    /// Conversion efficiency
    pub efficiency: Efficiency,
    /// Yearly operating cost as a fraction of capex
    pub opex_percentage: f64,
    /// Lower bound on learning, as a fraction of the initial capex
    pub maximum_learning_capex_ratio: f64,
    /// Direct CO2 emissions (kgCO2/kWh of output)
    pub co2_from_production: f64,
    /// Production of the legacy fleet in the first year
    pub initial_production: f64,
    /// Ages of the legacy fleet
    pub age_distribution: AgeDistribution,
    /// Optional ramp of the capacity factor over the model years
    pub capacity_factor: Option<CapacityFactorRamp>,
    /// Decommissioning cost as a fraction of annualised capex
    pub decommissioning_percentage: f64,
    /// If set, capex is spread over this many years in the amortized price
    pub nb_years_amort_capex: Option<u32>,
    /// Land used per unit of output
    pub land_use_per_unit: f64,
    /// Inputs consumed per unit of output, before efficiency
    pub needs: IndexMap<CommodityID, f64>,
    /// Byproducts per unit of output
    pub byproducts: IndexMap<FlowKey, f64>,
    /// Resources consumed per unit of new capacity
    pub construction_resources: IndexMap<CommodityID, f64>,
    /// Factor converting investments to M$
    pub scaling_factor_invest_level: f64,
    /// Factor converting capital to G$
    pub scaling_factor_techno_production: f64,
    /// Fuel properties
    pub fuel: FuelProperties,
    /// Transport cost ($/t)
    pub transport_cost: f64,
    /// Margin on transport, in percent
    pub transport_margin: f64,
    /// Margin on the price, in percent
    pub margin: f64,
    /// Investment made before the first model year, one entry per year of construction delay
    pub invest_before_year_start: Vec<f64>,
}

fn invalid(id: &TechnoID, key: &'static str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        techno: id.to_string(),
        key,
        reason: reason.into(),
    }
}

fn missing(id: &TechnoID, key: &'static str) -> ConfigurationError {
    ConfigurationError::MissingKey {
        techno: id.to_string(),
        key,
    }
}

/// The keys every technology must set
struct RequiredKeys {
    product: String,
    capex_init: f64,
    capex_init_unit: String,
    learning_rate: f64,
    wacc: f64,
    lifetime: u32,
    opex_percentage: f64,
}

fn into_commodity_map(map: IndexMap<String, f64>) -> IndexMap<CommodityID, f64> {
    map.into_iter().map(|(id, value)| (id.into(), value)).collect()
}

impl TechnoConfigRaw {
    fn required_keys(&self, id: &TechnoID) -> Result<RequiredKeys, ConfigurationError> {
        Ok(RequiredKeys {
            product: self.product.clone().ok_or_else(|| missing(id, "product"))?,
            capex_init: self.capex_init.ok_or_else(|| missing(id, "capex_init"))?,
            capex_init_unit: self
                .capex_init_unit
                .clone()
                .ok_or_else(|| missing(id, "capex_init_unit"))?,
            learning_rate: self
                .learning_rate
                .ok_or_else(|| missing(id, "learning_rate"))?,
            wacc: self.wacc.ok_or_else(|| missing(id, "wacc"))?,
            lifetime: self.lifetime.ok_or_else(|| missing(id, "lifetime"))?,
            opex_percentage: self
                .opex_percentage
                .ok_or_else(|| missing(id, "opex_percentage"))?,
        })
    }

    fn into_config(self, id: TechnoID) -> Result<TechnoConfig> {
        let required = self.required_keys(&id)?;
        self.validate(&required, &id)?;

        let capex_unit = CapexUnit::parse(&required.capex_init_unit)?;
        let conversion = CapexConversion {
            full_load_hours: self.full_load_hours,
            euro_dollar: self.euro_dollar.unwrap_or(DEFAULT_EURO_DOLLAR),
            density: self.fuel.density,
            calorific_value: self.fuel.calorific_value,
            density_per_ha: self.fuel.density_per_ha,
        };
        let capex_init = capex_unit.to_canonical(required.capex_init, &conversion, &id.0)?;

        let efficiency = match self.efficiency_max {
            None => Efficiency::Constant(self.efficiency.unwrap_or(1.0)),
            Some(max) => Efficiency::Sigmoid {
                initial: self.efficiency.ok_or_else(|| missing(&id, "efficiency"))?,
                max,
                evo_time: self
                    .techno_evo_time
                    .ok_or_else(|| missing(&id, "techno_evo_time"))?,
                slope: self
                    .efficiency_slope
                    .ok_or_else(|| missing(&id, "efficiency_slope"))?,
            },
        };

        let age_distribution = match self.initial_age_distribution {
            Some(weights) => AgeDistribution::from_weights(required.lifetime, &weights)
                .with_context(|| format!("Invalid initial_age_distribution for techno {id}"))?,
            None => AgeDistribution::from_decay(
                required.lifetime,
                self.initial_age_decay.unwrap_or(DEFAULT_INITIAL_AGE_DECAY),
            ),
        };

        let capacity_factor = match (self.capacity_factor, self.capacity_factor_at_year_end) {
            (None, _) => None,
            (Some(initial), at_year_end) => Some(CapacityFactorRamp {
                initial,
                at_year_end: at_year_end.unwrap_or(initial),
            }),
        };

        let invest_before_year_start = if self.invest_before_year_start.is_empty() {
            vec![0.0; self.construction_delay as usize]
        } else {
            self.invest_before_year_start
        };

        Ok(TechnoConfig {
            product: required.product.into(),
            capex_init,
            capex_unit,
            learning_rate: required.learning_rate,
            wacc: required.wacc,
            lifetime: required.lifetime,
            construction_delay: self.construction_delay,
            efficiency,
            opex_percentage: required.opex_percentage,
            maximum_learning_capex_ratio: self
                .maximum_learning_capex_ratio
                .unwrap_or(DEFAULT_MAXIMUM_LEARNING_CAPEX_RATIO),
            co2_from_production: self.co2_from_production,
            initial_production: self.initial_production,
            age_distribution,
            capacity_factor,
            decommissioning_percentage: self.decommissioning_percentage,
            nb_years_amort_capex: self.nb_years_amort_capex,
            land_use_per_unit: self.land_use_per_unit,
            needs: into_commodity_map(self.needs),
            byproducts: self.byproducts,
            construction_resources: into_commodity_map(self.construction_resources),
            scaling_factor_invest_level: self
                .scaling_factor_invest_level
                .unwrap_or(DEFAULT_SCALING_FACTOR_INVEST_LEVEL),
            scaling_factor_techno_production: self
                .scaling_factor_techno_production
                .unwrap_or(DEFAULT_SCALING_FACTOR_TECHNO_PRODUCTION),
            fuel: self.fuel,
            transport_cost: self.transport_cost,
            transport_margin: self.transport_margin.unwrap_or(100.0),
            margin: self.margin.unwrap_or(100.0),
            invest_before_year_start,
            id,
        })
    }

    /// Check the ranges of the raw values.
    ///
    /// Logs a warning if the WACC is greater than 1.
    fn validate(&self, required: &RequiredKeys, id: &TechnoID) -> Result<()> {
        ensure!(
            required.capex_init > 0.0,
            invalid(id, "capex_init", "must be positive")
        );
        ensure!(
            (0.0..1.0).contains(&required.learning_rate),
            invalid(id, "learning_rate", "must be in [0, 1)")
        );
        ensure!(
            required.wacc >= 0.0,
            invalid(id, "wacc", "must be non-negative")
        );
        if required.wacc > 1.0 {
            warn!("WACC for techno {id} is greater than 1");
        }
        ensure!(
            required.lifetime >= 2,
            invalid(id, "lifetime", "must be at least 2 years")
        );
        ensure!(
            required.opex_percentage >= 0.0,
            invalid(id, "opex_percentage", "must be non-negative")
        );
        if let Some(efficiency) = self.efficiency {
            ensure!(
                efficiency > 0.0,
                invalid(id, "efficiency", "must be positive")
            );
        }
        if let Some(efficiency_max) = self.efficiency_max {
            ensure!(
                efficiency_max > 0.0,
                invalid(id, "efficiency_max", "must be positive")
            );
        }
        if let Some(ratio) = self.maximum_learning_capex_ratio {
            ensure!(
                (0.0..=1.0).contains(&ratio),
                invalid(id, "maximum_learning_capex_ratio", "must be in [0, 1]")
            );
        }
        ensure!(
            self.initial_production >= 0.0,
            invalid(id, "initial_production", "must be non-negative")
        );
        if let Some(decay) = self.initial_age_decay {
            ensure!(
                decay.is_finite(),
                invalid(id, "initial_age_decay", "must be finite")
            );
        }
        for (key, value) in [
            ("capacity_factor", self.capacity_factor),
            ("capacity_factor_at_year_end", self.capacity_factor_at_year_end),
        ] {
            if let Some(value) = value {
                ensure!(value > 0.0, invalid(id, key, "must be positive"));
            }
        }
        if let Some(years) = self.nb_years_amort_capex {
            ensure!(
                years >= 1,
                invalid(id, "nb_years_amort_capex", "must be at least 1")
            );
        }
        for (key, value) in [
            ("scaling_factor_invest_level", self.scaling_factor_invest_level),
            (
                "scaling_factor_techno_production",
                self.scaling_factor_techno_production,
            ),
        ] {
            if let Some(value) = value {
                ensure!(value > 0.0, invalid(id, key, "must be positive"));
            }
        }
        ensure!(
            self.invest_before_year_start.is_empty()
                || self.invest_before_year_start.len() == self.construction_delay as usize,
            invalid(
                id,
                "invest_before_year_start",
                "must match the construction delay"
            )
        );
        if self.transport_cost != 0.0 {
            ensure!(
                self.fuel.calorific_value.is_some(),
                missing(id, "calorific_value")
            );
        }

        Ok(())
    }
}

impl TechnoConfig {
    /// Parse the configuration of a single technology from a TOML table
    pub fn from_toml_str(id: &str, toml_str: &str) -> Result<Self> {
        let raw: TechnoConfigRaw =
            toml::from_str(toml_str).with_context(|| format!("Invalid config for techno {id}"))?;
        raw.into_config(id.into())
    }
}

/// Parse every technology in a TOML document with one table per technology
pub fn parse_technos(toml_str: &str) -> Result<IndexMap<TechnoID, TechnoConfig>> {
    let raw: IndexMap<String, TechnoConfigRaw> = toml::from_str(toml_str)?;
    raw.into_iter()
        .map(|(id, raw)| {
            let id = TechnoID::from(id);
            let config = raw
                .into_config(id.clone())
                .with_context(|| format!("Invalid config for techno {id}"))?;
            Ok((id, config))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::flow::GhgSpecies;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const PV: &str = r#"
        product = "electricity"
        Capex_init = 1900.0
        Capex_init_unit = "$/kW"
        full_load_hours = 8760.0
        learning_rate = 0.083
        WACC = 0.075
        lifetime = 25
        ConstructionDelay = 1
        Opex_percentage = 0.021
        initial_production = 9914.45
        byproducts = { CO2 = 0.0, heat = 0.1 }
    "#;

    #[test]
    fn test_from_toml_str() {
        let config = TechnoConfig::from_toml_str("PV", PV).unwrap();
        assert_eq!(config.id, "PV".into());
        assert_eq!(config.product, "electricity".into());
        assert_eq!(config.capex_unit, CapexUnit::DollarPerKW);
        assert_approx_eq!(
            f64,
            config.capex_init.value(),
            1900.0 * 1000.0 / 8760.0,
            epsilon = 1e-9
        );
        assert_eq!(config.lifetime, 25);
        assert_eq!(config.construction_delay, 1);
        assert_eq!(config.invest_before_year_start, vec![0.0]);
        assert_eq!(config.efficiency, Efficiency::Constant(1.0));
        assert_eq!(
            config.maximum_learning_capex_ratio,
            DEFAULT_MAXIMUM_LEARNING_CAPEX_RATIO
        );
        assert_eq!(config.margin, 100.0);
        assert_eq!(config.age_distribution.len(), 24);
        assert_eq!(
            config.byproducts.keys().collect::<Vec<_>>(),
            [&FlowKey::Ghg(GhgSpecies::CO2), &FlowKey::commodity("heat")]
        );
    }

    #[rstest]
    #[case("lifetime = 1", "Invalid value for lifetime in techno PV: must be at least 2 years")]
    #[case(
        "learning_rate = 1.0",
        "Invalid value for learning_rate in techno PV: must be in [0, 1)"
    )]
    #[case("WACC = -0.1", "Invalid value for wacc in techno PV: must be non-negative")]
    #[case("Capex_init = 0.0", "Invalid value for capex_init in techno PV: must be positive")]
    #[case(
        "invest_before_year_start = [1.0, 2.0]",
        "Invalid value for invest_before_year_start in techno PV: must match the construction delay"
    )]
    #[case("Capex_init_unit = \"£/kW\"", "Unsupported capex unit: £/kW")]
    #[case("transport_cost = 10.0", "Missing required key calorific_value for techno PV")]
    #[case("efficiency_max = 0.9", "Missing required key efficiency for techno PV")]
    fn test_invalid_config(#[case] replacement: &str, #[case] msg: &str) {
        let key = replacement.split(" = ").next().unwrap();
        let toml_str = PV
            .lines()
            .filter(|line| line.trim().split(" = ").next() != Some(key))
            .chain(std::iter::once(replacement))
            .collect::<Vec<_>>()
            .join("\n");
        assert_error!(TechnoConfig::from_toml_str("PV", &toml_str), msg);
    }

    #[test]
    fn test_error_can_be_downcast() {
        let toml_str = PV.replace("lifetime = 25", "lifetime = 0");
        let err = TechnoConfig::from_toml_str("PV", &toml_str).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::InvalidValue { key: "lifetime", .. })
        ));
    }

    #[rstest]
    #[case("WACC", "wacc")]
    #[case("lifetime", "lifetime")]
    #[case("product", "product")]
    #[case("Capex_init_unit", "capex_init_unit")]
    fn test_missing_required_key(#[case] name: &str, #[case] expected_key: &str) {
        let toml_str = PV
            .lines()
            .filter(|line| line.trim().split(" = ").next() != Some(name))
            .collect::<Vec<_>>()
            .join("\n");
        let err = TechnoConfig::from_toml_str("PV", &toml_str).unwrap_err();
        match err.downcast_ref::<ConfigurationError>() {
            Some(ConfigurationError::MissingKey { techno, key }) => {
                assert_eq!(techno, "PV");
                assert_eq!(*key, expected_key);
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case(2020, 0.3 + 0.6 / (1.0 + 5.0_f64.exp()))]
    #[case(2030, 0.6)]
    #[case(2100, 0.3 + 0.6 / (1.0 + (-70.0_f64).exp()))]
    fn test_sigmoid_efficiency(#[case] year: u32, #[case] expected: f64) {
        let efficiency = Efficiency::Sigmoid {
            initial: 0.3,
            max: 0.9,
            evo_time: 10.0,
            slope: 0.5,
        };
        assert_approx_eq!(f64, efficiency.at(year, 2020), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_technos() {
        let toml_str = format!("[PV]\n{PV}\n[PV2]\n{PV}");
        let technos = parse_technos(&toml_str).unwrap();
        assert_eq!(
            technos.keys().collect::<Vec<_>>(),
            [&TechnoID::new("PV"), &TechnoID::new("PV2")]
        );
    }
}
