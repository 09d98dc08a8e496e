//! Timestamp and power column identification.
//!
//! Meter exports name their columns inconsistently (`Local Time Stamp`,
//! `Datetime`, `PSum (W)`, `Active Power`, …). The resolver matches header
//! names against hint lists first and falls back to content sniffing, so the
//! aggregator only ever sees two concrete column indices.

use std::sync::OnceLock;

use regex::Regex;
use report_core::data_processors::{TimestampProcessor, ValueProcessor};
use report_core::models::RawTable;
use serde::Serialize;
use tracing::debug;

/// Header fragments that mark a timestamp column.
const TIMESTAMP_HINTS: &[&str] = &[
    "timestamp",
    "date time",
    "datetime",
    "date",
    "time",
    "local timestamp",
    "local time stamp",
    "localtime",
    "ts",
];

/// Hints this short only match a whole header word (`ts` must not match `watts`).
const WHOLE_WORD_MAX_LEN: usize = 2;

/// Share of rows that must parse as timestamps for content-based detection.
const TIMESTAMP_PARSE_THRESHOLD: f64 = 0.5;

// ── Resolution result ─────────────────────────────────────────────────────────

/// Which required column could not be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingColumn {
    Timestamp,
    Value,
    Both,
}

impl MissingColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingColumn::Timestamp => "timestamp",
            MissingColumn::Value => "value",
            MissingColumn::Both => "timestamp and value",
        }
    }
}

/// Outcome of column resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnResolution {
    Resolved { timestamp_col: usize, value_col: usize },
    NotFound { missing: MissingColumn },
}

// ── ColumnResolver ────────────────────────────────────────────────────────────

/// Finds the timestamp and power columns of a [`RawTable`].
pub struct ColumnResolver<'a> {
    parser: &'a TimestampProcessor,
    timestamp_override: Option<String>,
    value_override: Option<String>,
}

impl<'a> ColumnResolver<'a> {
    /// A resolver that relies purely on heuristics.
    pub fn new(parser: &'a TimestampProcessor) -> Self {
        Self {
            parser,
            timestamp_override: None,
            value_override: None,
        }
    }

    /// Pin either column to an exact header name (case-insensitive).
    pub fn with_overrides(mut self, timestamp: Option<String>, value: Option<String>) -> Self {
        self.timestamp_override = timestamp;
        self.value_override = value;
        self
    }

    pub fn resolve(&self, table: &RawTable) -> ColumnResolution {
        let headers: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

        let timestamp_col = match &self.timestamp_override {
            Some(name) => find_exact(&headers, name),
            None => self.guess_timestamp(table, &headers),
        };
        let value_col = match &self.value_override {
            Some(name) => find_exact(&headers, name),
            None => self.guess_value(table, &headers, timestamp_col),
        };

        debug!(
            "ColumnResolver: timestamp={:?} value={:?} headers={:?}",
            timestamp_col, value_col, table.headers
        );

        match (timestamp_col, value_col) {
            (Some(t), Some(v)) if t != v => ColumnResolution::Resolved {
                timestamp_col: t,
                value_col: v,
            },
            (Some(_), Some(_)) => ColumnResolution::NotFound {
                missing: MissingColumn::Value,
            },
            (None, None) => ColumnResolution::NotFound {
                missing: MissingColumn::Both,
            },
            (None, _) => ColumnResolution::NotFound {
                missing: MissingColumn::Timestamp,
            },
            (_, None) => ColumnResolution::NotFound {
                missing: MissingColumn::Value,
            },
        }
    }

    // ── Heuristics ────────────────────────────────────────────────────────────

    /// First column (in column order) whose header carries a timestamp hint,
    /// else the first column whose cells are mostly parseable timestamps.
    fn guess_timestamp(&self, table: &RawTable, headers: &[String]) -> Option<usize> {
        if let Some(idx) = headers.iter().position(|h| has_timestamp_hint(h)) {
            return Some(idx);
        }

        if table.is_empty() {
            return None;
        }
        (0..headers.len()).find(|&col| {
            let parsed = table
                .column(col)
                .filter(|cell| self.parser.parse(cell).is_some())
                .count();
            parsed as f64 > TIMESTAMP_PARSE_THRESHOLD * table.len() as f64
        })
    }

    /// First non-timestamp column whose header names active power, else the
    /// non-timestamp column with the most numeric cells.
    fn guess_value(
        &self,
        table: &RawTable,
        headers: &[String],
        timestamp_col: Option<usize>,
    ) -> Option<usize> {
        let candidates = || (0..headers.len()).filter(move |c| Some(*c) != timestamp_col);

        if let Some(idx) = candidates().find(|&c| has_power_hint(&headers[c])) {
            return Some(idx);
        }

        let mut best: Option<(usize, usize)> = None;
        for col in candidates() {
            let numeric = table
                .column(col)
                .filter(|cell| ValueProcessor::parse(cell).is_some())
                .count();
            if numeric > 0 && best.map_or(true, |(_, n)| numeric > n) {
                best = Some((col, numeric));
            }
        }
        best.map(|(col, _)| col)
    }
}

// ── Header matching ───────────────────────────────────────────────────────────

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_\-]+").expect("regex is valid"))
}

/// Lowercase, trim and collapse whitespace/underscore/dash runs to one space.
pub fn normalize_header(header: &str) -> String {
    separator_regex()
        .replace_all(header.trim(), " ")
        .trim()
        .to_lowercase()
}

fn words(header: &str) -> impl Iterator<Item = &str> {
    header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn has_timestamp_hint(header: &str) -> bool {
    TIMESTAMP_HINTS.iter().any(|hint| {
        if hint.len() <= WHOLE_WORD_MAX_LEN {
            words(header).any(|w| w == *hint)
        } else {
            header.contains(hint)
        }
    })
}

fn has_power_hint(header: &str) -> bool {
    // `p_sum` normalises to `p sum`.
    header.contains("psum")
        || header.contains("p sum")
        || (header.contains("power") && header.contains("active"))
        || header.contains("kw")
}

fn find_exact(headers: &[String], name: &str) -> Option<usize> {
    let wanted = normalize_header(name);
    headers.iter().position(|h| *h == wanted)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
