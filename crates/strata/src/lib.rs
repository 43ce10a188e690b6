#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod query;

// Re-export main types from sub-crates
pub use strata_data as data;
pub use strata_features as features;
pub use strata_output as output;
pub use strata_store as store;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ComputationRequest, ComputeEngine};
pub use error::{ComputeError, EngineError, ErrorKind};
pub use query::{FeatureFailure, FeatureSummary, QueryRequest, QueryResponse, QueryService};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
