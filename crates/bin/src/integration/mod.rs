//! Glue between the command line and the library crates.
//!
//! Cache location, raw data source selection and time argument parsing.

pub(crate) mod cache_manager;
pub(crate) mod pipeline;
