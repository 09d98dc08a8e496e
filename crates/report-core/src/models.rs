use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::options::SummaryStatistic;
use crate::time_utils::SLOTS_PER_DAY;

// ── Input ─────────────────────────────────────────────────────────────────────

/// A rectangular table of text cells as produced by a file reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Header row, one name per column.
    pub headers: Vec<String>,
    /// Data rows. Rows may be shorter than the header; missing cells read as empty.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (`row`, `col`), or `""` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All cells of column `col`, top to bottom.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, col))
    }

    /// Pair up the timestamp and value cells of every row.
    pub fn readings(
        &self,
        timestamp_col: usize,
        value_col: usize,
    ) -> impl Iterator<Item = RawReading<'_>> + '_ {
        (0..self.rows.len()).map(move |row| RawReading {
            timestamp: self.cell(row, timestamp_col),
            value: self.cell(row, value_col),
        })
    }
}

/// One input record before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading<'a> {
    pub timestamp: &'a str,
    pub value: &'a str,
}

/// A reading whose timestamp and value both parsed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedSample {
    /// Local wall-clock instant of the reading.
    pub instant: NaiveDateTime,
    /// Finite reading value, sign preserved.
    pub value: f64,
}

impl ParsedSample {
    pub fn new(instant: NaiveDateTime, value: f64) -> Self {
        Self { instant, value }
    }
}

// ── Interval grid ─────────────────────────────────────────────────────────────

/// One (day, slot) cell of the canonical grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalBucket {
    pub day: NaiveDate,
    /// Slot index in `0..144`.
    pub slot: usize,
    /// Sum of the samples in this slot; `None` when no sample was observed.
    pub aggregate: Option<f64>,
}

/// Exactly 144 buckets for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DaySeriesRepr")]
pub struct DaySeries {
    date: NaiveDate,
    slots: Vec<Option<f64>>,
}

/// Wire shape of [`DaySeries`]; the slot count is checked on the way in.
#[derive(Deserialize)]
struct DaySeriesRepr {
    date: NaiveDate,
    slots: Vec<Option<f64>>,
}

impl TryFrom<DaySeriesRepr> for DaySeries {
    type Error = String;

    fn try_from(repr: DaySeriesRepr) -> Result<Self, Self::Error> {
        if repr.slots.len() != SLOTS_PER_DAY {
            return Err(format!(
                "day {} has {} slots, expected {}",
                repr.date,
                repr.slots.len(),
                SLOTS_PER_DAY
            ));
        }
        Ok(Self {
            date: repr.date,
            slots: repr.slots,
        })
    }
}

impl DaySeries {
    /// A day with every slot absent.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            slots: vec![None; SLOTS_PER_DAY],
        }
    }

    /// Build a day from explicit slot values; missing trailing slots are absent
    /// and anything beyond 144 is ignored.
    pub fn from_slots(date: NaiveDate, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut series = Self::empty(date);
        for (slot, value) in values.into_iter().take(SLOTS_PER_DAY).enumerate() {
            series.slots[slot] = value;
        }
        series
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Aggregate of `slot`, `None` when absent or out of range.
    pub fn get(&self, slot: usize) -> Option<f64> {
        self.slots.get(slot).copied().flatten()
    }

    /// Add `value` into `slot`, turning an absent slot into an observed one.
    pub fn add(&mut self, slot: usize, value: f64) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = Some(cell.unwrap_or(0.0) + value);
        }
    }

    /// Mark `slot` absent.
    pub fn clear(&mut self, slot: usize) {
        if let Some(cell) = self.slots.get_mut(slot) {
            *cell = None;
        }
    }

    /// Fold another series for the same date into this one, slot by slot.
    pub fn merge(&mut self, other: &DaySeries) {
        for (slot, value) in other.slots.iter().enumerate() {
            if let Some(v) = value {
                self.add(slot, *v);
            }
        }
    }

    /// The 144 slot values in order.
    pub fn values(&self) -> &[Option<f64>] {
        &self.slots
    }

    /// Values of observed slots only.
    pub fn observed(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots.iter().filter_map(|v| *v)
    }

    pub fn observed_count(&self) -> usize {
        self.slots.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_all_absent(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn buckets(&self) -> impl Iterator<Item = IntervalBucket> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(move |(slot, aggregate)| IntervalBucket {
                day: self.date,
                slot,
                aggregate: *aggregate,
            })
    }
}

/// The aggregated grid: one [`DaySeries`] per materialised day, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalGrid {
    days: BTreeMap<NaiveDate, DaySeries>,
}

impl IntervalGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate at (`day`, `slot`); `None` when absent or the day is not in the grid.
    pub fn get(&self, day: NaiveDate, slot: usize) -> Option<f64> {
        self.days.get(&day).and_then(|s| s.get(slot))
    }

    pub fn day(&self, day: NaiveDate) -> Option<&DaySeries> {
        self.days.get(&day)
    }

    /// The series for `day`, created all-absent if missing.
    pub fn day_mut(&mut self, day: NaiveDate) -> &mut DaySeries {
        self.days
            .entry(day)
            .or_insert_with(|| DaySeries::empty(day))
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.days.contains_key(&day)
    }

    pub fn days(&self) -> impl Iterator<Item = &DaySeries> {
        self.days.values()
    }

    pub fn days_mut(&mut self) -> impl Iterator<Item = &mut DaySeries> {
        self.days.values_mut()
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Consume the grid into ascending day series.
    pub fn into_days(self) -> Vec<DaySeries> {
        self.days.into_values().collect()
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Statistics over the observed slots of one day.
///
/// Every statistic is `None` when the day has no observed slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub observed_slots: usize,
    pub total: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl DaySummary {
    pub fn value_of(&self, statistic: SummaryStatistic) -> Option<f64> {
        match statistic {
            SummaryStatistic::Total => self.total,
            SummaryStatistic::Mean => self.mean,
            SummaryStatistic::Max => self.max,
            SummaryStatistic::Min => self.min,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.observed_slots > 0
    }
}

/// One row of a day block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// ISO date of the block, repeated on every row.
    pub date_label: String,
    /// `HH:MM` slot label.
    pub time_label: String,
    /// Signed aggregate, `None` when absent.
    pub raw: Option<f64>,
    /// `abs(raw) / 1000`, `None` exactly when `raw` is.
    pub scaled: Option<f64>,
}

/// The four-column block for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBlock {
    pub date: NaiveDate,
    /// Always 144 rows, 00:00 through 23:50.
    pub rows: Vec<ReportRow>,
    pub summary: DaySummary,
}

impl DayBlock {
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Day-columnar view of one sheet, blocks in ascending date order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub sheet: String,
    pub blocks: Vec<DayBlock>,
}

impl ReportTable {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.blocks.iter().map(|b| b.date).collect()
    }

    pub fn block(&self, date: NaiveDate) -> Option<&DayBlock> {
        self.blocks.iter().find(|b| b.date == date)
    }

    /// Number of slot rows shared by every block (0 for an empty table).
    pub fn row_count(&self) -> usize {
        if self.blocks.is_empty() {
            0
        } else {
            SLOTS_PER_DAY
        }
    }
}

/// One date of the cross-sheet totals table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsRow {
    pub date: NaiveDate,
    /// One entry per sheet, in [`TotalsTable::sheets`] order.
    pub per_sheet: Vec<Option<f64>>,
    /// Sum of the defined per-sheet values; `None` when none are defined.
    pub total: Option<f64>,
}

/// Per-date statistic of every sheet plus a row-wise total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsTable {
    pub statistic: SummaryStatistic,
    pub sheets: Vec<String>,
    pub rows: Vec<TotalsRow>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    // ── RawTable ─────────────────────────────────────────────────────────────

    #[test]
    fn test_raw_table_short_rows_read_empty() {
        let table = RawTable::new(
            vec!["Time".into(), "PSum".into()],
            vec![vec!["2024-01-01 00:00".into()]],
        );
        assert_eq!(table.cell(0, 0), "2024-01-01 00:00");
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn test_raw_table_readings() {
        let table = RawTable::new(
            vec!["PSum".into(), "Time".into()],
            vec![
                vec!["100".into(), "2024-01-01 00:00".into()],
                vec!["50".into(), "2024-01-01 00:05".into()],
            ],
        );
        let readings: Vec<RawReading> = table.readings(1, 0).collect();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].timestamp, "2024-01-01 00:05");
        assert_eq!(readings[1].value, "50");
    }

    // ── DaySeries ────────────────────────────────────────────────────────────

    #[test]
    fn test_day_series_always_has_144_slots() {
        let series = DaySeries::empty(day(1));
        assert_eq!(series.values().len(), 144);
        assert!(series.is_all_absent());

        let long = DaySeries::from_slots(day(1), vec![Some(1.0); 200]);
        assert_eq!(long.values().len(), 144);
    }

    #[test]
    fn test_day_series_deserialize_checks_slot_count() {
        let short = r#"{"date":"2024-04-03","slots":[1.0,null,2.0]}"#;
        let err = serde_json::from_str::<DaySeries>(short).unwrap_err();
        assert!(err.to_string().contains("3 slots"));

        let grid = format!(r#"{{"days":{{"2024-04-03":{short}}}}}"#);
        assert!(serde_json::from_str::<IntervalGrid>(&grid).is_err());

        let full = DaySeries::from_slots(day(1), vec![Some(1.5); 144]);
        let json = serde_json::to_string(&full).expect("serialize");
        let back: DaySeries = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, full);
    }

    #[test]
    fn test_day_series_add_distinguishes_zero_from_absent() {
        let mut series = DaySeries::empty(day(1));
        series.add(3, 0.0);
        assert_eq!(series.get(3), Some(0.0));
        assert_eq!(series.get(4), None);
        assert_eq!(series.observed_count(), 1);
    }

    #[test]
    fn test_day_series_add_sums() {
        let mut series = DaySeries::empty(day(1));
        series.add(0, 120.0);
        series.add(0, -20.0);
        assert_eq!(series.get(0), Some(100.0));
    }

    #[test]
    fn test_day_series_out_of_range_is_ignored() {
        let mut series = DaySeries::empty(day(1));
        series.add(144, 5.0);
        assert!(series.is_all_absent());
        assert_eq!(series.get(144), None);
    }

    #[test]
    fn test_day_series_merge() {
        let mut a = DaySeries::from_slots(day(1), [Some(1.0), None, Some(2.0)]);
        let b = DaySeries::from_slots(day(1), [Some(4.0), Some(0.0)]);
        a.merge(&b);
        assert_eq!(a.get(0), Some(5.0));
        assert_eq!(a.get(1), Some(0.0));
        assert_eq!(a.get(2), Some(2.0));
        assert_eq!(a.get(3), None);
    }

    #[test]
    fn test_day_series_buckets() {
        let series = DaySeries::from_slots(day(2), [None, Some(7.5)]);
        let buckets: Vec<IntervalBucket> = series.buckets().collect();
        assert_eq!(buckets.len(), 144);
        assert_eq!(buckets[1].aggregate, Some(7.5));
        assert_eq!(buckets[1].day, day(2));
        assert!(buckets.iter().enumerate().all(|(i, b)| b.slot == i));
    }

    // ── IntervalGrid ─────────────────────────────────────────────────────────

    #[test]
    fn test_grid_days_are_ascending() {
        let mut grid = IntervalGrid::new();
        grid.day_mut(day(3)).add(0, 1.0);
        grid.day_mut(day(1)).add(0, 1.0);
        let dates: Vec<NaiveDate> = grid.days().map(DaySeries::date).collect();
        assert_eq!(dates, vec![day(1), day(3)]);
        assert_eq!(grid.first_day(), Some(day(1)));
        assert_eq!(grid.last_day(), Some(day(3)));
        assert_eq!(grid.get(day(2), 0), None);
        assert_eq!(grid.get(day(3), 0), Some(1.0));
    }

    // ── DaySummary ───────────────────────────────────────────────────────────

    #[test]
    fn test_summary_value_of() {
        let summary = DaySummary {
            observed_slots: 2,
            total: Some(3.0),
            mean: Some(1.5),
            max: Some(2.0),
            min: Some(1.0),
        };
        assert_eq!(summary.value_of(SummaryStatistic::Total), Some(3.0));
        assert_eq!(summary.value_of(SummaryStatistic::Min), Some(1.0));
        assert!(summary.is_defined());
        assert!(!DaySummary::default().is_defined());
    }

    #[test]
    fn test_report_table_row_count() {
        assert_eq!(ReportTable::default().row_count(), 0);
    }
}
