//! CSV and JSON serialisation of converted reports.
//!
//! The CSV layout mirrors the spreadsheet the report is meant to become:
//! one four-column block per day, placed left to right in date order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use report_core::calculations::SummaryCalculator;
use report_core::error::Result;
use report_core::formatting::{render_cell, render_statistic};
use report_core::models::{DayBlock, ReportTable, TotalsTable};
use report_core::options::{ConversionOptions, GapFill, OutputFormat, SummaryStatistic};
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::WorkbookReport;
use crate::reshaper::BLOCK_HEADERS;

/// File stem of the cross-sheet totals output.
pub const TOTALS_STEM: &str = "totals";

/// Presentation choices applied at render time only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub gap_fill: GapFill,
    pub include_summary: bool,
}

impl RenderOptions {
    pub fn from_options(options: &ConversionOptions) -> Self {
        Self {
            gap_fill: options.gap_fill,
            include_summary: options.include_summary,
        }
    }
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// Write one sheet's day-columnar table as CSV.
pub fn write_report_csv<W: Write>(out: W, table: &ReportTable, render: RenderOptions) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);

    // Block header: the date over the first column of each block.
    let header: Vec<String> = table
        .blocks
        .iter()
        .flat_map(|b| [b.date_label(), String::new(), String::new(), String::new()])
        .collect();
    writer.write_record(&header)?;

    let sub_headers: Vec<&str> = table.blocks.iter().flat_map(|_| BLOCK_HEADERS).collect();
    writer.write_record(&sub_headers)?;

    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .blocks
            .iter()
            .flat_map(|b| {
                let r = &b.rows[row];
                [
                    r.date_label.clone(),
                    r.time_label.clone(),
                    render_cell(r.raw, render.gap_fill),
                    render_cell(r.scaled, render.gap_fill),
                ]
            })
            .collect();
        writer.write_record(&record)?;
    }

    if render.include_summary {
        for statistic in SummaryStatistic::ALL {
            let record: Vec<String> = table
                .blocks
                .iter()
                .flat_map(|b| summary_cells(b, statistic))
                .collect();
            writer.write_record(&record)?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn summary_cells(block: &DayBlock, statistic: SummaryStatistic) -> [String; 4] {
    let scaled: Vec<Option<f64>> = block.rows.iter().map(|r| r.scaled).collect();
    let scaled_summary = SummaryCalculator::summarize(&scaled[..]);
    [
        block.date_label(),
        statistic.label().to_string(),
        render_statistic(block.summary.value_of(statistic)),
        render_statistic(scaled_summary.value_of(statistic)),
    ]
}

/// Write the totals table: `Date`, one column per sheet, `Total`.
pub fn write_totals_csv<W: Write>(out: W, totals: &TotalsTable) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["Date".to_string()];
    header.extend(totals.sheets.iter().cloned());
    header.push("Total".to_string());
    writer.write_record(&header)?;

    for row in &totals.rows {
        let mut record = vec![row.date.format("%Y-%m-%d").to_string()];
        record.extend(row.per_sheet.iter().map(|v| render_statistic(*v)));
        record.push(render_statistic(row.total));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Pretty-print any serialisable report value. Absent slots stay `null`.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: W, value: &T) -> Result<()> {
    let mut out = BufWriter::new(out);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

// ── Files ─────────────────────────────────────────────────────────────────────

/// Output file name for `sheet` with the given extension.
pub fn output_file_name(sheet: &str, extension: &str) -> String {
    format!("{sheet}_converted.{extension}")
}

/// Write every non-empty sheet (and the totals, if any) into `dir`.
///
/// Returns the paths written, in order.
pub fn write_outputs(
    report: &WorkbookReport,
    dir: &Path,
    format: OutputFormat,
    render: RenderOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for sheet in report.non_empty_sheets() {
        if format.writes_csv() {
            let path = dir.join(output_file_name(&sheet.name, "csv"));
            write_report_csv(File::create(&path)?, &sheet.table, render)?;
            written.push(path);
        }
        if format.writes_json() {
            let path = dir.join(output_file_name(&sheet.name, "json"));
            write_json(File::create(&path)?, sheet)?;
            written.push(path);
        }
    }

    if let Some(totals) = &report.totals {
        if format.writes_csv() {
            let path = dir.join(format!("{TOTALS_STEM}.csv"));
            write_totals_csv(File::create(&path)?, totals)?;
            written.push(path);
        }
        if format.writes_json() {
            let path = dir.join(format!("{TOTALS_STEM}.json"));
            write_json(File::create(&path)?, totals)?;
            written.push(path);
        }
    }

    for path in &written {
        debug!("wrote {}", path.display());
    }
    info!("{} output file(s) written to {}", written.len(), dir.display());
    Ok(written)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::convert_path;
    use crate::reshaper::DayColumnarReshaper;
    use chrono::NaiveDate;
    use report_core::models::{DaySeries, TotalsRow};
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn render_csv(table: &ReportTable, render: RenderOptions) -> Vec<Vec<String>> {
        let mut buf = Vec::new();
        write_report_csv(&mut buf, table, render).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect()
    }

    fn sample_table() -> ReportTable {
        DayColumnarReshaper::reshape(
            "Meter",
            vec![
                DaySeries::from_slots(day(2), [Some(0.0)]),
                DaySeries::from_slots(day(1), [Some(100.0), None, Some(-20.5)]),
            ],
        )
    }

    // ── write_report_csv ──────────────────────────────────────────────────────

    #[test]
    fn test_csv_layout() {
        let lines = render_csv(&sample_table(), RenderOptions::default());

        assert_eq!(lines.len(), 2 + 144);
        assert_eq!(lines[0], vec!["2024-01-01", "", "", "", "2024-01-02", "", "", ""]);
        assert_eq!(lines[1][..4], BLOCK_HEADERS.map(String::from));
        assert_eq!(lines[2], vec!["2024-01-01", "00:00", "100", "0.1", "2024-01-02", "00:00", "0", "0"]);
        assert_eq!(lines[3], vec!["2024-01-01", "00:10", "", "", "2024-01-02", "00:10", "", ""]);
        assert_eq!(lines[4][2..4], ["-20.5".to_string(), "0.0205".to_string()]);
        assert_eq!(lines[145][1], "23:50");
    }

    #[test]
    fn test_csv_zero_fill() {
        let render = RenderOptions {
            gap_fill: GapFill::Zero,
            include_summary: false,
        };
        let lines = render_csv(&sample_table(), render);
        assert_eq!(lines[3][2], "0");
        assert_eq!(lines[3][3], "0");
    }

    #[test]
    fn test_csv_summary_rows() {
        let table = DayColumnarReshaper::reshape(
            "Meter",
            vec![
                DaySeries::from_slots(day(1), [Some(100.0), Some(-300.0)]),
                DaySeries::empty(day(2)),
            ],
        );
        let render = RenderOptions {
            gap_fill: GapFill::Blank,
            include_summary: true,
        };
        let lines = render_csv(&table, render);

        assert_eq!(lines.len(), 2 + 144 + 4);
        let total = &lines[146];
        assert_eq!(total[1], "Total");
        assert_eq!(total[2], "-200");
        assert_eq!(total[3], "0.4");
        assert_eq!(total[6], "n/a");
        assert_eq!(total[7], "n/a");
        assert_eq!(lines[148][1], "Max");
        assert_eq!(lines[148][2], "100");
        assert_eq!(lines[148][3], "0.3");
    }

    #[test]
    fn test_csv_empty_table() {
        let mut buf = Vec::new();
        write_report_csv(&mut buf, &ReportTable::default(), RenderOptions::default()).unwrap();
        assert!(buf.iter().all(|b| *b == b'\n' || *b == b'"'));
    }

    // ── write_totals_csv ──────────────────────────────────────────────────────

    #[test]
    fn test_totals_csv() {
        let totals = TotalsTable {
            statistic: SummaryStatistic::Max,
            sheets: vec!["A".to_string(), "B".to_string()],
            rows: vec![TotalsRow {
                date: day(1),
                per_sheet: vec![Some(3.0), None],
                total: Some(3.0),
            }],
        };
        let mut buf = Vec::new();
        write_totals_csv(&mut buf, &totals).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Date,A,B,Total\n2024-01-01,3,n/a,3\n"
        );
    }

    // ── write_json ────────────────────────────────────────────────────────────

    #[test]
    fn test_json_keeps_absent_as_null() {
        let mut buf = Vec::new();
        write_json(&mut buf, &sample_table()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let rows = &value["blocks"][0]["rows"];
        assert_eq!(rows[0]["raw"], serde_json::json!(100.0));
        assert!(rows[1]["raw"].is_null());
        assert_eq!(value["blocks"][0]["date"], "2024-01-01");
    }

    // ── write_outputs ─────────────────────────────────────────────────────────

    #[test]
    fn test_write_outputs_both_formats() {
        let input = TempDir::new().unwrap();
        std::fs::write(input.path().join("a.csv"), "Timestamp,PSum\n2024-01-01 00:00,1\n").unwrap();
        std::fs::write(input.path().join("b.csv"), "Timestamp,PSum\n2024-01-01 00:00,2\n").unwrap();
        std::fs::write(input.path().join("c.csv"), "Timestamp,PSum\nbad,2\n").unwrap();

        let report = convert_path(input.path(), None, &ConversionOptions::default()).unwrap();
        let out = TempDir::new().unwrap();
        let out_dir = out.path().join("reports");
        let written =
            write_outputs(&report, &out_dir, OutputFormat::Both, RenderOptions::default()).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "a_converted.csv",
                "a_converted.json",
                "b_converted.csv",
                "b_converted.json",
                "totals.csv",
                "totals.json"
            ]
        );
        assert!(written.iter().all(|p| p.exists()));
        assert!(!out_dir.join("c_converted.csv").exists());

        let totals = std::fs::read_to_string(out_dir.join("totals.csv")).unwrap();
        assert!(totals.starts_with("Date,a,b,Total\n"));
    }

    #[test]
    fn test_write_outputs_csv_only_single_sheet() {
        let input = TempDir::new().unwrap();
        let path = input.path().join("only.csv");
        std::fs::write(&path, "Timestamp,PSum\n2024-01-01 00:00,1\n").unwrap();

        let report = convert_path(&path, None, &ConversionOptions::default()).unwrap();
        let out = TempDir::new().unwrap();
        let written =
            write_outputs(&report, out.path(), OutputFormat::Csv, RenderOptions::default()).unwrap();
        assert_eq!(written, vec![out.path().join("only_converted.csv")]);
    }
}
