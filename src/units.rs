//! Physical quantities used by technology configurations and the normalisation of capex units.
use crate::error::ConfigurationError;
use serde::Deserialize;
use std::str::FromStr;

/// Default conversion rate from euros to dollars
pub const DEFAULT_EURO_DOLLAR: f64 = 1.114;

macro_rules! unit_struct {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }
        }
    };
}

unit_struct!(MoneyPerEnergy, "A cost per unit of yearly output capacity ($/MWh)");
unit_struct!(Hours, "A number of hours per year");
unit_struct!(EnergyPerMass, "A calorific value (kWh/kg)");
unit_struct!(MassPerVolume, "A density (kg/m³)");
unit_struct!(MassPerArea, "A yearly yield per hectare (kg/ha)");

/// The conventions in which an initial capex can be expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
pub enum CapexUnit {
    /// Dollars per MWh of yearly output
    #[strum(serialize = "$/MWh")]
    DollarPerMWh,
    /// Dollars per kWh of yearly output
    #[strum(serialize = "$/kWh")]
    DollarPerKWh,
    /// Dollars per kW of installed capacity
    #[strum(serialize = "$/kW")]
    DollarPerKW,
    /// Euros per kW of installed capacity
    #[strum(serialize = "€/kW")]
    EuroPerKW,
    /// Dollars per MW of installed capacity
    #[strum(serialize = "$/MW")]
    DollarPerMW,
    /// Dollars per GW of installed capacity
    #[strum(serialize = "$/GW")]
    DollarPerGW,
    /// Dollars per kg of yearly output
    #[strum(serialize = "$/kg")]
    DollarPerKg,
    /// Dollars per tonne of yearly output (mass-denominated streams)
    #[strum(serialize = "$/t")]
    DollarPerTonne,
    /// Dollars per m³ of yearly output
    #[strum(serialize = "$/m3", serialize = "$/m³")]
    DollarPerCubicMetre,
    /// Euros per hectare of cultivated land
    #[strum(serialize = "€/ha")]
    EuroPerHectare,
}

/// Technology and fuel properties needed to convert a capex into $/MWh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapexConversion {
    /// Yearly full-load hours of the installed capacity
    pub full_load_hours: Option<Hours>,
    /// Euro to dollar rate
    pub euro_dollar: f64,
    /// Fuel density
    pub density: Option<MassPerVolume>,
    /// Fuel calorific value
    pub calorific_value: Option<EnergyPerMass>,
    /// Crop yield per hectare
    pub density_per_ha: Option<MassPerArea>,
}

impl CapexUnit {
    /// Parse a capex unit, failing with a configuration error for unsupported conventions
    pub fn parse(unit: &str) -> Result<Self, ConfigurationError> {
        Self::from_str(unit.trim())
            .map_err(|_| ConfigurationError::UnsupportedCapexUnit(unit.into()))
    }

    /// Convert `value`, expressed in this unit, into $/MWh of yearly output.
    ///
    /// # Arguments
    ///
    /// * `value` - The capex in this unit
    /// * `conversion` - Technology and fuel properties
    /// * `techno` - Name of the technology, for error messages
    pub fn to_canonical(
        self,
        value: f64,
        conversion: &CapexConversion,
        techno: &str,
    ) -> Result<MoneyPerEnergy, ConfigurationError> {
        let require = |found: Option<f64>, key: &'static str| {
            found.ok_or_else(|| ConfigurationError::MissingKey {
                techno: techno.into(),
                key,
            })
        };
        let full_load_hours =
            || require(conversion.full_load_hours.map(Hours::value), "full_load_hours");
        let calorific_value =
            || require(conversion.calorific_value.map(EnergyPerMass::value), "calorific_value");

        let canonical = match self {
            Self::DollarPerMWh | Self::DollarPerTonne => value,
            Self::DollarPerKWh => value * 1000.0,
            Self::DollarPerKW => value * 1000.0 / full_load_hours()?,
            Self::EuroPerKW => value * conversion.euro_dollar * 1000.0 / full_load_hours()?,
            Self::DollarPerMW => value / full_load_hours()?,
            Self::DollarPerGW => value / (1000.0 * full_load_hours()?),
            Self::DollarPerKg => value * 1000.0 / calorific_value()?,
            Self::DollarPerCubicMetre => {
                let density = require(conversion.density.map(MassPerVolume::value), "density")?;
                value * 1000.0 / (density * calorific_value()?)
            }
            Self::EuroPerHectare => {
                let density_per_ha =
                    require(conversion.density_per_ha.map(MassPerArea::value), "density_per_ha")?;
                value * conversion.euro_dollar * 1000.0 / (density_per_ha * calorific_value()?)
            }
        };

        Ok(MoneyPerEnergy(canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn conversion() -> CapexConversion {
        CapexConversion {
            full_load_hours: Some(Hours(8760.0)),
            euro_dollar: DEFAULT_EURO_DOLLAR,
            density: Some(MassPerVolume(0.8)),
            calorific_value: Some(EnergyPerMass(13.9)),
            density_per_ha: Some(MassPerArea(2903.0)),
        }
    }

    #[rstest]
    #[case("$/MWh", 100.0, 100.0)]
    #[case("$/kWh", 0.1, 100.0)]
    #[case("$/kW", 1900.0, 1900.0 * 1000.0 / 8760.0)]
    #[case("€/kW", 1000.0, 1000.0 * 1.114 * 1000.0 / 8760.0)]
    #[case("$/MW", 8760.0, 1.0)]
    #[case("$/GW", 8_760_000.0, 1.0)]
    #[case("$/kg", 13.9, 1000.0)]
    #[case("$/t", 50.0, 50.0)]
    #[case("$/m3", 0.8 * 13.9, 1000.0)]
    #[case("$/m³", 0.8 * 13.9, 1000.0)]
    #[case("€/ha", 2903.0 * 13.9, 1.114 * 1000.0)]
    fn test_to_canonical(#[case] unit: &str, #[case] value: f64, #[case] expected: f64) {
        let result = CapexUnit::parse(unit)
            .unwrap()
            .to_canonical(value, &conversion(), "techno")
            .unwrap();
        assert_approx_eq!(f64, result.value(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_unsupported_unit() {
        assert_eq!(
            CapexUnit::parse("£/kW").unwrap_err(),
            ConfigurationError::UnsupportedCapexUnit("£/kW".into())
        );
    }

    #[rstest]
    #[case("$/kW", "full_load_hours")]
    #[case("$/kg", "calorific_value")]
    #[case("$/m3", "density")]
    #[case("€/ha", "density_per_ha")]
    fn test_missing_property(#[case] unit: &str, #[case] key: &'static str) {
        let conversion = CapexConversion {
            full_load_hours: None,
            euro_dollar: DEFAULT_EURO_DOLLAR,
            density: None,
            calorific_value: None,
            density_per_ha: None,
        };
        assert_eq!(
            CapexUnit::parse(unit)
                .unwrap()
                .to_canonical(1.0, &conversion, "Electrolysis")
                .unwrap_err(),
            ConfigurationError::MissingKey {
                techno: "Electrolysis".into(),
                key
            }
        );
    }
}
