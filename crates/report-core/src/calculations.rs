use crate::models::{DaySeries, DaySummary};

/// Anything that exposes the observed (non-absent) values of one day.
pub trait ObservedSeries {
    /// Observed values in slot order.
    fn observed_values(&self) -> Vec<f64>;
}

impl ObservedSeries for DaySeries {
    fn observed_values(&self) -> Vec<f64> {
        self.observed().collect()
    }
}

impl ObservedSeries for [Option<f64>] {
    fn observed_values(&self) -> Vec<f64> {
        self.iter().filter_map(|v| *v).collect()
    }
}

// ── SummaryCalculator ─────────────────────────────────────────────────────────

/// Stateless per-day statistics.
pub struct SummaryCalculator;

impl SummaryCalculator {
    /// Summarise the observed slots of `series`.
    ///
    /// Absent slots never contribute; a day with no observed slot yields a
    /// summary whose statistics are all `None`, never `0`.
    pub fn summarize<S: ObservedSeries + ?Sized>(series: &S) -> DaySummary {
        let values = series.observed_values();
        if values.is_empty() {
            return DaySummary::default();
        }

        let total: f64 = values.iter().sum();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        DaySummary {
            observed_slots: values.len(),
            total: Some(total),
            mean: Some(total / values.len() as f64),
            max: Some(max),
            min: Some(min),
        }
    }

    /// Sum of the defined values, `None` when nothing is defined.
    pub fn sum_defined(values: &[Option<f64>]) -> Option<f64> {
        values
            .iter()
            .flatten()
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
