#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builtin;
pub mod definition;
pub mod error;
pub mod registry;
pub mod series;
pub mod transform;

pub use definition::{Dependency, FeatureDefinition, FeatureKey};
pub use error::{FeatureError, Result};
pub use registry::FeatureRegistry;
pub use series::TimeSeries;
pub use transform::{FeatureCategory, Transformation};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
