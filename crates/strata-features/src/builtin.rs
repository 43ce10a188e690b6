//! Built-in features.
//!
//! Standard price and corporate-action features, all at version 1. Feature
//! dependencies follow the latest version so that a bumped `dividend_factor`
//! flows into `adjusted_close` once `adjusted_close` itself is re-registered.

use crate::definition::{Dependency, FeatureDefinition};
use crate::error::Result;
use crate::registry::FeatureRegistry;
use crate::transform::Transformation;
use strata_data::ObservationKind;

/// Definitions of every built-in feature.
pub fn builtin_definitions() -> Vec<FeatureDefinition> {
    use Dependency as D;
    use ObservationKind::{Dividend, Price, Split, Volume};

    vec![
        FeatureDefinition::new("close", 1, Transformation::Identity)
            .with_dependency(D::raw(Price))
            .with_description("Raw closing price"),
        FeatureDefinition::new("volume", 1, Transformation::Identity)
            .with_dependency(D::raw(Volume))
            .with_description("Raw traded volume"),
        FeatureDefinition::new("dividend_factor", 1, Transformation::DividendAdjustment)
            .with_dependency(D::raw(Price))
            .with_dependency(D::raw(Dividend))
            .with_description("Backward cumulative dividend adjustment factor, 1 at the latest close"),
        FeatureDefinition::new("split_factor", 1, Transformation::SplitAdjustment)
            .with_dependency(D::raw(Price))
            .with_dependency(D::raw(Split))
            .with_description("Backward cumulative split adjustment factor, 1 at the latest close"),
        FeatureDefinition::new("dividend_adjusted_close", 1, Transformation::Product)
            .with_dependency(D::feature("close"))
            .with_dependency(D::feature("dividend_factor"))
            .with_description("Close adjusted for dividends"),
        FeatureDefinition::new("adjusted_close", 1, Transformation::Product)
            .with_dependency(D::feature("close"))
            .with_dependency(D::feature("dividend_factor"))
            .with_dependency(D::feature("split_factor"))
            .with_description("Close adjusted for dividends and splits"),
        FeatureDefinition::new("returns", 1, Transformation::PercentChange { periods: 1 })
            .with_dependency(D::feature("adjusted_close"))
            .with_description("One-period total return from the adjusted close"),
        FeatureDefinition::new("close_diff", 1, Transformation::Difference { periods: 1 })
            .with_dependency(D::feature("close"))
            .with_description("One-period change in the raw close"),
        // Differencing turns a cumulative counter into per-interval amounts,
        // the way meter readings in kWh become kWh per 15 minutes. Volume fed
        // as a running total comes out as volume per period.
        FeatureDefinition::new("volume_diff", 1, Transformation::Difference { periods: 1 })
            .with_dependency(D::feature("volume"))
            .with_description("One-period change in volume; per-period volume when fed a cumulative count"),
        FeatureDefinition::new("close_minmax", 1, Transformation::MinMax)
            .with_dependency(D::feature("close"))
            .with_description("Close scaled to [0, 1] over the available history"),
        FeatureDefinition::new("close_zscore", 1, Transformation::ZScore)
            .with_dependency(D::feature("close"))
            .with_description("Close standard score over the available history"),
    ]
}

/// Names of the built-in features.
pub fn builtin_names() -> Vec<String> {
    builtin_definitions()
        .iter()
        .map(|d| d.name().to_string())
        .collect()
}

impl FeatureRegistry {
    /// Registry populated with the built-in features.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        for definition in builtin_definitions() {
            registry.register(definition)?;
        }
        Ok(registry)
    }
}
