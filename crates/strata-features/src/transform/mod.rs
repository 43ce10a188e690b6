//! Built-in transformations.
//!
//! Every transformation is a pure function from aligned input series (in the
//! order the feature declares its dependencies) to an output series. Missing
//! inputs propagate to missing outputs; nothing is defaulted to zero and
//! nothing is interpolated.

pub mod adjustment;
pub mod arith;
pub mod normalize;
pub mod window;

use crate::error::{FeatureError, Result};
use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad grouping of transformations, used for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    /// Raw series passed through or combined
    Price,
    /// Corporate-action adjustment factors
    CorporateAction,
    /// Period-over-period changes
    Change,
    /// Window normalizations
    Normalization,
}

/// Closed set of transformation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    /// Pass the single input through
    Identity,
    /// Backward dividend adjustment factor from `[price, dividend]`
    DividendAdjustment,
    /// Backward split adjustment factor from `[price, split]`
    SplitAdjustment,
    /// Element-wise product of two or more inputs
    Product,
    /// `x[i] - x[i - periods]`
    Difference {
        /// Lag in observations
        periods: usize,
    },
    /// `x[i] / x[i - periods] - 1`
    PercentChange {
        /// Lag in observations
        periods: usize,
    },
    /// `(x - min) / (max - min)` over the window
    MinMax,
    /// `(x - mean) / std` over the window
    ZScore,
}

impl Transformation {
    /// Short name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::DividendAdjustment => "dividend_adjustment",
            Self::SplitAdjustment => "split_adjustment",
            Self::Product => "product",
            Self::Difference { .. } => "difference",
            Self::PercentChange { .. } => "percent_change",
            Self::MinMax => "min_max",
            Self::ZScore => "z_score",
        }
    }

    /// Category of the transformation.
    pub const fn category(&self) -> FeatureCategory {
        match self {
            Self::Identity | Self::Product => FeatureCategory::Price,
            Self::DividendAdjustment | Self::SplitAdjustment => FeatureCategory::CorporateAction,
            Self::Difference { .. } | Self::PercentChange { .. } => FeatureCategory::Change,
            Self::MinMax | Self::ZScore => FeatureCategory::Normalization,
        }
    }

    const fn arity(&self) -> (usize, Option<usize>, &'static str) {
        match self {
            Self::DividendAdjustment | Self::SplitAdjustment => (2, Some(2), "exactly 2"),
            Self::Product => (2, None, "at least 2"),
            _ => (1, Some(1), "exactly 1"),
        }
    }

    /// Check that `inputs` dependencies can feed this transformation.
    pub fn check_arity(&self, inputs: usize) -> Result<()> {
        let (min, max, expected) = self.arity();
        if inputs < min || max.is_some_and(|max| inputs > max) {
            return Err(FeatureError::Arity {
                transformation: self.name(),
                expected,
                actual: inputs,
            });
        }
        Ok(())
    }

    /// Check parameters that do not depend on inputs.
    pub fn check_parameters(&self) -> std::result::Result<(), String> {
        match self {
            Self::Difference { periods } | Self::PercentChange { periods } if *periods == 0 => {
                Err("periods must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply the transformation.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::Arity`] when given the wrong number of inputs.
    pub fn apply(&self, inputs: &[&TimeSeries]) -> Result<TimeSeries> {
        self.check_arity(inputs.len())?;

        let output = match self {
            Self::Identity => inputs[0].clone(),
            Self::DividendAdjustment => adjustment::dividend_factor(inputs[0], inputs[1]),
            Self::SplitAdjustment => adjustment::split_factor(inputs[0], inputs[1]),
            Self::Product => arith::product(inputs),
            Self::Difference { periods } => window::difference(inputs[0], *periods),
            Self::PercentChange { periods } => window::percent_change(inputs[0], *periods),
            Self::MinMax => normalize::min_max(inputs[0]),
            Self::ZScore => normalize::z_score(inputs[0]),
        };
        Ok(output)
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Difference { periods } | Self::PercentChange { periods } => {
                write!(f, "{}({periods})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}
