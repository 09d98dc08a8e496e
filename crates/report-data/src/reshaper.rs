//! Day-columnar reshaping and cross-sheet totals.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use report_core::calculations::SummaryCalculator;
use report_core::formatting::scale_to_kilo;
use report_core::models::{
    DayBlock, DaySeries, ReportRow, ReportTable, TotalsRow, TotalsTable,
};
use report_core::options::SummaryStatistic;
use report_core::time_utils::slot_label;

/// Sub-headers of the four columns of every day block.
pub const BLOCK_HEADERS: [&str; 4] = [
    "UTC Offset (minutes)",
    "Local Time Stamp",
    "Active Power (W)",
    "kW",
];

/// Turns aggregated day series into a [`ReportTable`].
pub struct DayColumnarReshaper;

impl DayColumnarReshaper {
    /// One 144-row block per day, ascending by date whatever the input order.
    ///
    /// Series sharing a date are merged slot by slot.
    pub fn reshape(sheet: impl Into<String>, days: Vec<DaySeries>) -> ReportTable {
        let mut by_date: BTreeMap<NaiveDate, DaySeries> = BTreeMap::new();
        for series in days {
            match by_date.get_mut(&series.date()) {
                Some(existing) => existing.merge(&series),
                None => {
                    by_date.insert(series.date(), series);
                }
            }
        }

        ReportTable {
            sheet: sheet.into(),
            blocks: by_date.values().map(Self::block).collect(),
        }
    }

    fn block(series: &DaySeries) -> DayBlock {
        let date_label = series.date().format("%Y-%m-%d").to_string();
        let rows = series
            .values()
            .iter()
            .enumerate()
            .map(|(slot, raw)| ReportRow {
                date_label: date_label.clone(),
                time_label: slot_label(slot),
                raw: *raw,
                scaled: raw.map(scale_to_kilo),
            })
            .collect();

        DayBlock {
            date: series.date(),
            rows,
            summary: SummaryCalculator::summarize(series),
        }
    }
}

/// Combine one daily statistic of every sheet into a per-date table.
///
/// Dates are the union over all sheets; a sheet without a block for a date
/// (or with an undefined statistic) contributes `None`. The total column is
/// the row-wise sum of the defined values.
pub fn consolidate_totals(tables: &[ReportTable], statistic: SummaryStatistic) -> TotalsTable {
    let dates: BTreeSet<NaiveDate> = tables.iter().flat_map(|t| t.dates()).collect();

    let rows = dates
        .into_iter()
        .map(|date| {
            let per_sheet: Vec<Option<f64>> = tables
                .iter()
                .map(|t| t.block(date).and_then(|b| b.summary.value_of(statistic)))
                .collect();
            let total = SummaryCalculator::sum_defined(&per_sheet);
            TotalsRow {
                date,
                per_sheet,
                total,
            }
        })
        .collect();

    TotalsTable {
        statistic,
        sheets: tables.iter().map(|t| t.sheet.clone()).collect(),
        rows,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
