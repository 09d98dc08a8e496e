use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How slash/dot separated dates such as `03/04/2024` are read.
///
/// ISO `YYYY-MM-DD` dates are unambiguous and unaffected by this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateOrder {
    /// `DD/MM/YYYY`: `03/04/2024` is the 3rd of April.
    #[default]
    DayFirst,
    /// `MM/DD/YYYY`: `03/04/2024` is the 4th of March.
    MonthFirst,
}

impl FromStr for DateOrder {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "day-first" | "dayfirst" | "dmy" => Ok(DateOrder::DayFirst),
            "month-first" | "monthfirst" | "mdy" => Ok(DateOrder::MonthFirst),
            other => Err(ReportError::Config(format!("unknown date order: {other}"))),
        }
    }
}

impl DateOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateOrder::DayFirst => "day-first",
            DateOrder::MonthFirst => "month-first",
        }
    }
}

/// Whether leading and trailing zero/absent runs of each day are blanked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimPolicy {
    /// Keep every observed slot, including edge zeros.
    #[default]
    Off,
    /// Blank every slot before the first and after the last nonzero slot.
    Edges,
}

impl TrimPolicy {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            TrimPolicy::Edges
        } else {
            TrimPolicy::Off
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, TrimPolicy::Edges)
    }
}

/// Presentation of absent slots at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapFill {
    /// Absent slots render as empty cells.
    #[default]
    Blank,
    /// Absent slots render as `0`.
    Zero,
}

impl FromStr for GapFill {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "blank" | "empty" => Ok(GapFill::Blank),
            "zero" => Ok(GapFill::Zero),
            other => Err(ReportError::Config(format!("unknown gap fill: {other}"))),
        }
    }
}

impl GapFill {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapFill::Blank => "blank",
            GapFill::Zero => "zero",
        }
    }
}

/// Per-day statistic over the observed slots of a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatistic {
    Total,
    Mean,
    #[default]
    Max,
    Min,
}

impl FromStr for SummaryStatistic {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "total" | "sum" => Ok(SummaryStatistic::Total),
            "mean" | "avg" | "average" => Ok(SummaryStatistic::Mean),
            "max" => Ok(SummaryStatistic::Max),
            "min" => Ok(SummaryStatistic::Min),
            other => Err(ReportError::Config(format!("unknown statistic: {other}"))),
        }
    }
}

impl SummaryStatistic {
    /// Every statistic, in the order summary rows are rendered.
    pub const ALL: [SummaryStatistic; 4] = [
        SummaryStatistic::Total,
        SummaryStatistic::Mean,
        SummaryStatistic::Max,
        SummaryStatistic::Min,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatistic::Total => "total",
            SummaryStatistic::Mean => "mean",
            SummaryStatistic::Max => "max",
            SummaryStatistic::Min => "min",
        }
    }

    /// Row label used in rendered reports.
    pub fn label(&self) -> &'static str {
        match self {
            SummaryStatistic::Total => "Total",
            SummaryStatistic::Mean => "Mean",
            SummaryStatistic::Max => "Max",
            SummaryStatistic::Min => "Min",
        }
    }
}

/// Which serialisations the CLI writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Both,
}

impl FromStr for OutputFormat {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "both" => Ok(OutputFormat::Both),
            other => Err(ReportError::Config(format!("unknown output format: {other}"))),
        }
    }
}

impl OutputFormat {
    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    pub fn writes_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Everything the conversion pipeline needs to know, independent of the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Interpretation of ambiguous slash/dot dates.
    pub date_order: DateOrder,
    /// Edge trimming applied per day after aggregation.
    pub trim: TrimPolicy,
    /// Presentation of absent slots in rendered output.
    pub gap_fill: GapFill,
    /// Materialise empty days between the first and last observed day.
    pub fill_missing_days: bool,
    /// Append per-day summary rows to rendered blocks.
    pub include_summary: bool,
    /// Statistic combined across sheets in the totals table.
    pub total_statistic: SummaryStatistic,
    /// Explicit timestamp column header, bypassing the heuristics.
    pub timestamp_column: Option<String>,
    /// Explicit value column header, bypassing the heuristics.
    pub value_column: Option<String>,
    /// IANA zone that offset-carrying timestamps are converted into.
    pub timezone: Option<String>,
}
