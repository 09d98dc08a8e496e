//! Data layer of the meter report converter.
//!
//! Discovers and reads CSV meter exports, identifies their timestamp and
//! power columns, aggregates readings onto the 10-minute grid, reshapes the
//! grid into day-columnar report tables and writes them out as CSV or JSON.

pub mod aggregator;
pub mod analysis;
pub mod reader;
pub mod reshaper;
pub mod resolver;
pub mod writer;

pub use report_core as core;
