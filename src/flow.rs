//! Typed keys for the flows a technology produces or consumes.
//!
//! Each flow is either a commodity (an energy or resource stream, measured in the stream's own
//! unit) or a greenhouse gas (measured in Mt). Tables of yearly flows are keyed by [`FlowKey`], so
//! code looking for "the CO2 a technology emits" asks for `FlowKey::Ghg(GhgSpecies::CO2)` instead
//! of matching column-name suffixes.
use crate::id::CommodityID;
use crate::scalar::Scalar;
use crate::year::YearlySeries;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// The commodity produced by carbon capture technologies and consumed by storage/utilisation
pub const CARBON_CAPTURE: &str = "carbon_capture";

/// Greenhouse gases tracked by the emissions aggregator
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[allow(clippy::upper_case_acronyms)]
pub enum GhgSpecies {
    /// Carbon dioxide
    CO2,
    /// Methane
    CH4,
    /// Nitrous oxide
    N2O,
}

impl GhgSpecies {
    /// Global warming potential over a 20-year horizon
    pub fn gwp_20(self) -> f64 {
        match self {
            Self::CO2 => 1.0,
            Self::CH4 => 85.0,
            Self::N2O => 265.0,
        }
    }

    /// Global warming potential over a 100-year horizon
    pub fn gwp_100(self) -> f64 {
        match self {
            Self::CO2 => 1.0,
            Self::CH4 => 28.0,
            Self::N2O => 265.0,
        }
    }
}

/// The unit a stream's commodity is measured in
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum StreamUnit {
    /// Energy, in TWh
    #[default]
    #[string = "TWh"]
    TWh,
    /// Mass, in Mt
    #[string = "Mt"]
    Mt,
}

/// Identifies one flow of a technology or stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowKey {
    /// An energy or resource commodity
    Commodity(CommodityID),
    /// A greenhouse gas, in Mt
    Ghg(GhgSpecies),
}

impl FlowKey {
    /// Key for a commodity flow
    pub fn commodity(id: &str) -> Self {
        Self::Commodity(id.into())
    }

    /// The commodity ID, if this is a commodity flow
    pub fn commodity_id(&self) -> Option<&CommodityID> {
        match self {
            Self::Commodity(id) => Some(id),
            Self::Ghg(_) => None,
        }
    }
}

impl FromStr for FlowKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(GhgSpecies::from_str(s).map_or_else(|_| Self::commodity(s), Self::Ghg))
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commodity(id) => write!(f, "{id}"),
            Self::Ghg(species) => write!(f, "{species}"),
        }
    }
}

impl<'de> Deserialize<'de> for FlowKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_else(|never| match never {}))
    }
}

/// Yearly flows keyed by [`FlowKey`], in insertion order
pub type FlowTable<T> = IndexMap<FlowKey, YearlySeries<T>>;

/// Add `series` to the entry for `key`, inserting it if absent
pub fn accumulate<T: Scalar>(table: &mut FlowTable<T>, key: &FlowKey, series: &YearlySeries<T>) {
    if let Some(existing) = table.get_mut(key) {
        *existing = &*existing + series;
    } else {
        table.insert(key.clone(), series.clone());
    }
}

/// Multiply every flow in the table by the matching yearly factor
pub fn scale_table<T: Scalar>(table: &FlowTable<T>, factor: &YearlySeries<T>) -> FlowTable<T> {
    table
        .iter()
        .map(|(key, series)| (key.clone(), series * factor))
        .collect()
}

/// The flow for `key`, or zeros over `years` if the table has none
pub fn flow_or_zeros<T: Scalar>(
    table: &FlowTable<T>,
    key: &FlowKey,
    years: &RangeInclusive<u32>,
) -> YearlySeries<T> {
    table
        .get(key)
        .cloned()
        .unwrap_or_else(|| YearlySeries::zeros(years))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CO2", FlowKey::Ghg(GhgSpecies::CO2))]
    #[case("N2O", FlowKey::Ghg(GhgSpecies::N2O))]
    #[case(" methane ", FlowKey::commodity("methane"))]
    #[case("carbon_capture", FlowKey::commodity(CARBON_CAPTURE))]
    fn test_flow_key_from_str(#[case] input: &str, #[case] expected: FlowKey) {
        assert_eq!(input.parse::<FlowKey>().unwrap(), expected);
    }

    #[rstest]
    #[case("TWh", StreamUnit::TWh)]
    #[case("twh", StreamUnit::TWh)]
    #[case("MT", StreamUnit::Mt)]
    fn test_stream_unit_is_case_insensitive(#[case] label: &str, #[case] expected: StreamUnit) {
        #[derive(serde::Deserialize)]
        struct Unit {
            unit: StreamUnit,
        }

        let parsed: Unit = toml::from_str(&format!("unit = \"{label}\"")).unwrap();
        assert_eq!(parsed.unit, expected);
    }

    #[test]
    fn test_accumulate() {
        let key = FlowKey::Ghg(GhgSpecies::CO2);
        let mut table = FlowTable::new();
        accumulate(&mut table, &key, &YearlySeries::new(2020, vec![1.0, 2.0]));
        accumulate(&mut table, &key, &YearlySeries::new(2020, vec![0.5, 0.5]));
        assert_eq!(table[&key], YearlySeries::new(2020, vec![1.5, 2.5]));
    }

    #[test]
    fn test_flow_or_zeros() {
        let table = FlowTable::<f64>::new();
        assert_eq!(
            flow_or_zeros(&table, &FlowKey::commodity("electricity"), &(2020..=2021)),
            YearlySeries::new(2020, vec![0.0, 0.0])
        );
    }
}
