//! Interval aggregation: irregular readings onto the fixed 10-minute grid.

use report_core::data_processors::{TimestampProcessor, ValueProcessor};
use report_core::models::{DaySeries, IntervalGrid, ParsedSample, RawReading};
use report_core::options::{ConversionOptions, TrimPolicy};
use report_core::time_utils::{floor_to_bucket, slot_index};
use tracing::debug;

// ── CleanedSamples ────────────────────────────────────────────────────────────

/// Parsed samples plus the bookkeeping reported back to the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanedSamples {
    pub samples: Vec<ParsedSample>,
    pub rows_read: usize,
    /// Rows whose timestamp or value did not parse.
    pub rows_dropped: usize,
}

impl CleanedSamples {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ── IntervalAggregator ────────────────────────────────────────────────────────

/// Floors samples to their 10-minute slot and sums every slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntervalAggregator {
    trim: TrimPolicy,
    fill_missing_days: bool,
}

impl IntervalAggregator {
    pub fn new(trim: TrimPolicy, fill_missing_days: bool) -> Self {
        Self {
            trim,
            fill_missing_days,
        }
    }

    pub fn from_options(options: &ConversionOptions) -> Self {
        Self::new(options.trim, options.fill_missing_days)
    }

    /// Parse raw readings, dropping any row whose timestamp or value is unusable.
    pub fn clean<'a>(
        readings: impl IntoIterator<Item = RawReading<'a>>,
        parser: &TimestampProcessor,
    ) -> CleanedSamples {
        let mut cleaned = CleanedSamples::default();

        for reading in readings {
            cleaned.rows_read += 1;
            match (parser.parse(reading.timestamp), ValueProcessor::parse(reading.value)) {
                (Some(instant), Some(value)) => {
                    cleaned.samples.push(ParsedSample::new(instant, value));
                }
                _ => {
                    cleaned.rows_dropped += 1;
                    debug!(
                        "dropping row: timestamp={:?} value={:?}",
                        reading.timestamp, reading.value
                    );
                }
            }
        }

        cleaned
    }

    /// Build the grid. An empty sample set gives an empty grid.
    ///
    /// Each slot holds the signed sum of the samples whose floored instant
    /// falls on it; slots without samples stay absent, never zero.
    pub fn aggregate(&self, samples: &[ParsedSample]) -> IntervalGrid {
        let mut grid = IntervalGrid::new();

        for sample in samples {
            let bucket = floor_to_bucket(sample.instant);
            grid.day_mut(bucket.date())
                .add(slot_index(bucket.time()), sample.value);
        }

        if self.fill_missing_days {
            if let (Some(first), Some(last)) = (grid.first_day(), grid.last_day()) {
                for day in first.iter_days().take_while(|d| *d <= last) {
                    grid.day_mut(day);
                }
            }
        }

        if self.trim.is_enabled() {
            for day in grid.days_mut() {
                Self::trim_day(day);
            }
        }

        debug!(
            "aggregated {} sample(s) into {} day(s)",
            samples.len(),
            grid.len()
        );
        grid
    }

    /// Blank every slot before the first and after the last nonzero slot.
    ///
    /// A day with no nonzero slot ends up entirely absent but is kept.
    pub fn trim_day(day: &mut DaySeries) {
        let nonzero = |v: &Option<f64>| matches!(v, Some(x) if *x != 0.0);
        let first = day.values().iter().position(nonzero);
        let last = day.values().iter().rposition(nonzero);

        let len = day.values().len();
        let keep = match (first, last) {
            (Some(f), Some(l)) => f..=l,
            _ => {
                for slot in 0..len {
                    day.clear(slot);
                }
                return;
            }
        };
        for slot in (0..len).filter(|s| !keep.contains(s)) {
            day.clear(slot);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
