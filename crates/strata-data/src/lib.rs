#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/strata/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod observation;
pub mod source;
pub mod yahoo;

pub use error::{DataError, MalformedRecord, Result};
pub use observation::{EntityId, ObservationKind, RawObservation, TimeRange};
pub use source::{FetchOutcome, JsonRecords, MemorySource, RawSource, UpstreamRecord};
pub use yahoo::YahooSource;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
