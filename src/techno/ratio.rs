//! Limiting a technology by the availability of the scarce commodities it consumes.
//!
//! Availability ratios are given in percent of demand for some commodities. A technology is
//! limited by the smoothed minimum of the ratios of the inputs it actually consumes.
use crate::flow::FlowKey;
use crate::id::CommodityID;
use crate::scalar::{Scalar, minimum};
use crate::smooth::SmoothingKernel;
use crate::techno::TechnoFlows;
use crate::techno::pricing::InputSeries;
use crate::year::YearlySeries;
use ::log::debug;

/// How resource ratios are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioSettings {
    /// If false, technologies are never limited
    pub apply_ratio: bool,
    /// The kernel used for the smoothed minimum
    pub kernel: SmoothingKernel,
}

impl Default for RatioSettings {
    fn default() -> Self {
        Self {
            apply_ratio: true,
            kernel: SmoothingKernel::default(),
        }
    }
}

/// The limitation applied to a technology
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedRatio<T> {
    /// Fraction of the technology's flows that can go ahead, per year
    pub ratio: YearlySeries<T>,
    /// The input with the lowest availability in each year, if any limits the technology
    pub limiting_input: Vec<Option<CommodityID>>,
}

/// Scale a technology's operating flows by the availability of its inputs.
///
/// Construction flows are not limited.
pub fn apply_resources_ratios<T: Scalar>(
    flows: &TechnoFlows<T>,
    ratios: &InputSeries<T>,
    settings: &RatioSettings,
) -> (TechnoFlows<T>, AppliedRatio<T>) {
    let years = flows.land_use.years();
    let candidates: Vec<_> = ratios
        .iter()
        .filter(|(id, _)| {
            settings.apply_ratio
                && flows
                    .consumption
                    .contains_key(&FlowKey::Commodity((*id).clone()))
        })
        .collect();

    if candidates.is_empty() {
        let applied = AppliedRatio {
            ratio: YearlySeries::constant(&years, T::one()),
            limiting_input: vec![None; flows.land_use.len()],
        };
        return (flows.clone(), applied);
    }

    let hundred = T::from_real(100.0);
    let mut percentages = Vec::with_capacity(candidates.len());
    let mut limiting_input = Vec::with_capacity(flows.land_use.len());
    let ratio = YearlySeries::from_fn(&years, |year| {
        percentages.clear();
        percentages.extend(candidates.iter().filter_map(|(_, series)| series.get(year)));
        let (limiting, _) = candidates
            .iter()
            .filter_map(|(id, series)| Some((*id, series.get(year)?.re())))
            .fold((None, f64::INFINITY), |(best, lowest), (id, value)| {
                if value < lowest {
                    (Some(id.clone()), value)
                } else {
                    (best, lowest)
                }
            });
        limiting_input.push(limiting);
        // Availability above demand never increases output
        minimum(settings.kernel.minimum(&percentages) / hundred, T::one())
    });
    debug!(
        "Limiting by ratios of {}",
        candidates.iter().map(|(id, _)| id.to_string()).collect::<Vec<_>>().join(", ")
    );

    let applied = AppliedRatio {
        ratio,
        limiting_input,
    };
    (flows.scale_operating(&applied.ratio), applied)
}
