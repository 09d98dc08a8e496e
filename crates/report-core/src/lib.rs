//! Core types and pure helpers for the meter report converter.
//!
//! Domain model (samples, 10-minute interval grid, day-columnar report),
//! timestamp and value parsing, slot arithmetic, per-day statistics, cell
//! formatting, conversion options and CLI settings.

pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod options;
pub mod settings;
pub mod time_utils;

pub use error::{ReportError, Result};
