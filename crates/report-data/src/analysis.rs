//! Conversion pipeline for the meter report converter.
//!
//! Drives every sheet of a workbook through column resolution, cleaning,
//! interval aggregation and day-columnar reshaping, and consolidates the
//! per-sheet daily statistic into a totals table when several sheets convert.
//! A sheet that cannot be read or resolved is recorded as skipped and never
//! stops the others.

use std::path::Path;

use chrono::Utc;
use report_core::data_processors::TimestampProcessor;
use report_core::error::{ReportError, Result};
use report_core::models::{RawTable, ReportTable, TotalsTable};
use report_core::options::{ConversionOptions, DateOrder, TrimPolicy};
use report_core::time_utils::TimezoneHandler;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregator::IntervalAggregator;
use crate::reader::{discover_sheets, load_table, SheetSource};
use crate::reshaper::{consolidate_totals, DayColumnarReshaper};
use crate::resolver::{ColumnResolution, ColumnResolver};

// ── Public types ──────────────────────────────────────────────────────────────

/// Result of converting one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    pub name: String,
    /// Header of the column read as timestamps.
    pub timestamp_column: String,
    /// Header of the column read as power values.
    pub value_column: String,
    pub rows_read: usize,
    /// Rows dropped because the timestamp or value did not parse.
    pub rows_dropped: usize,
    pub table: ReportTable,
}

impl SheetReport {
    /// Number of day blocks produced.
    pub fn days(&self) -> usize {
        self.table.blocks.len()
    }

    /// `true` when no usable data survived cleaning.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// A sheet that was not converted, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub name: String,
    pub reason: String,
}

/// Run metadata included in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    pub date_order: DateOrder,
    pub trim: TrimPolicy,
    pub sheets_converted: usize,
    pub sheets_skipped: usize,
    pub rows_read: usize,
    pub rows_dropped: usize,
    /// Wall-clock seconds spent on the whole conversion.
    pub processing_time_seconds: f64,
}

/// The complete output of [`convert_path`] / [`convert_workbook`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookReport {
    pub sheets: Vec<SheetReport>,
    pub skipped: Vec<SkippedSheet>,
    /// Present when more than one sheet produced data.
    pub totals: Option<TotalsTable>,
    pub metadata: ConversionMetadata,
}

impl WorkbookReport {
    /// Sheets that produced at least one day block.
    pub fn non_empty_sheets(&self) -> impl Iterator<Item = &SheetReport> {
        self.sheets.iter().filter(|s| !s.is_empty())
    }

    /// `true` when not a single sheet produced data.
    pub fn has_no_data(&self) -> bool {
        self.non_empty_sheets().next().is_none()
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Convert one already-loaded sheet.
///
/// Returns [`ReportError::ColumnNotFound`] when the timestamp or value column
/// cannot be identified. A sheet whose rows all fail to parse is not an
/// error; it yields an empty table.
pub fn convert_sheet(
    name: &str,
    table: &RawTable,
    options: &ConversionOptions,
    parser: &TimestampProcessor,
) -> Result<SheetReport> {
    let resolver = ColumnResolver::new(parser)
        .with_overrides(options.timestamp_column.clone(), options.value_column.clone());

    let (timestamp_col, value_col) = match resolver.resolve(table) {
        ColumnResolution::Resolved {
            timestamp_col,
            value_col,
        } => (timestamp_col, value_col),
        ColumnResolution::NotFound { missing } => {
            return Err(ReportError::ColumnNotFound {
                sheet: name.to_string(),
                missing: missing.as_str().to_string(),
            });
        }
    };
    debug!(
        "Sheet '{}': timestamp column '{}', value column '{}'",
        name, table.headers[timestamp_col], table.headers[value_col]
    );

    let cleaned = IntervalAggregator::clean(table.readings(timestamp_col, value_col), parser);
    if cleaned.rows_dropped > 0 {
        warn!(
            "Sheet '{}': dropped {} of {} row(s) with unparsable timestamp or value",
            name, cleaned.rows_dropped, cleaned.rows_read
        );
    }

    let grid = IntervalAggregator::from_options(options).aggregate(&cleaned.samples);
    let report_table = DayColumnarReshaper::reshape(name, grid.into_days());
    if report_table.is_empty() {
        warn!("Sheet '{}': no usable data", name);
    }

    Ok(SheetReport {
        name: name.to_string(),
        timestamp_column: table.headers[timestamp_col].clone(),
        value_column: table.headers[value_col].clone(),
        rows_read: cleaned.rows_read,
        rows_dropped: cleaned.rows_dropped,
        table: report_table,
    })
}

/// Convert every sheet in `sources`.
///
/// Fails only when the configured timezone is invalid; per-sheet failures
/// end up in [`WorkbookReport::skipped`].
pub fn convert_workbook(
    sources: &[SheetSource],
    delimiter: Option<u8>,
    options: &ConversionOptions,
) -> Result<WorkbookReport> {
    let start = std::time::Instant::now();

    let timezone = TimezoneHandler::new(options.timezone.as_deref())?;
    let parser = TimestampProcessor::new(options.date_order, timezone);

    let mut sheets = Vec::new();
    let mut skipped = Vec::new();

    for source in sources {
        let table = match load_table(&source.path, delimiter) {
            Ok(table) => table,
            Err(e) => {
                warn!("Skipping sheet '{}': {}", source.name, e);
                skipped.push(SkippedSheet {
                    name: source.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if table.is_empty() {
            warn!("Skipping empty sheet '{}'", source.name);
            skipped.push(SkippedSheet {
                name: source.name.clone(),
                reason: "sheet has no data rows".to_string(),
            });
            continue;
        }

        match convert_sheet(&source.name, &table, options, &parser) {
            Ok(report) => {
                info!(
                    "Sheet '{}': {} row(s) read, {} dropped, {} day(s)",
                    report.name,
                    report.rows_read,
                    report.rows_dropped,
                    report.days()
                );
                sheets.push(report);
            }
            Err(e) => {
                warn!("Skipping sheet '{}': {}", source.name, e);
                skipped.push(SkippedSheet {
                    name: source.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let totals = build_totals(&sheets, options);

    let metadata = ConversionMetadata {
        generated_at: Utc::now().to_rfc3339(),
        date_order: options.date_order,
        trim: options.trim,
        sheets_converted: sheets.len(),
        sheets_skipped: skipped.len(),
        rows_read: sheets.iter().map(|s| s.rows_read).sum(),
        rows_dropped: sheets.iter().map(|s| s.rows_dropped).sum(),
        processing_time_seconds: start.elapsed().as_secs_f64(),
    };

    Ok(WorkbookReport {
        sheets,
        skipped,
        totals,
        metadata,
    })
}

/// Discover the sheets under `input` (a CSV file or a directory) and convert them.
pub fn convert_path(
    input: &Path,
    delimiter: Option<u8>,
    options: &ConversionOptions,
) -> Result<WorkbookReport> {
    let sources = discover_sheets(input)?;
    convert_workbook(&sources, delimiter, options)
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn build_totals(sheets: &[SheetReport], options: &ConversionOptions) -> Option<TotalsTable> {
    let tables: Vec<ReportTable> = sheets
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.table.clone())
        .collect();
    if tables.len() < 2 {
        return None;
    }
    Some(consolidate_totals(&tables, options.total_statistic))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
