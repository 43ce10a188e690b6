//! Yahoo Finance data source.

pub mod quotes;

pub use quotes::YahooSource;
