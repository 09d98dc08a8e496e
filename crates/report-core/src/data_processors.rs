use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::trace;

use crate::options::DateOrder;
use crate::time_utils::TimezoneHandler;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// ISO-style naive layouts, tried in order. These never depend on [`DateOrder`].
const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Layouts that carry an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Year-first layouts must open with a full four-digit year; chrono's `%Y`
/// would otherwise read `03/04/24` as the year 3.
fn year_first_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}[-/]").expect("regex is valid"))
}

/// `D/M/YYYY`, `M.D.YYYY`, `D-M-YYYY` … with an optional time and AM/PM marker.
fn numeric_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^(\d{1,2})[./-](\d{1,2})[./-](\d{4})
            (?:[\sT]+(\d{1,2}):(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?\s*([AaPp][Mm])?)?$",
        )
        .expect("regex is valid")
    })
}

/// Parses meter timestamps into local wall-clock instants.
///
/// Slash/dot/dash separated dates are read strictly in the configured
/// [`DateOrder`]; a value that is only valid in the other order is rejected
/// rather than silently reinterpreted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampProcessor {
    order: DateOrder,
    timezone: TimezoneHandler,
}

impl TimestampProcessor {
    pub fn new(order: DateOrder, timezone: TimezoneHandler) -> Self {
        Self { order, timezone }
    }

    pub fn date_order(&self) -> DateOrder {
        self.order
    }

    /// Parse `raw` or return `None` for anything unrecognised.
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if year_first_regex().is_match(s) {
            if let Some(ts) = self.parse_with_offset(s) {
                return Some(ts);
            }

            for fmt in ISO_FORMATS {
                if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(ts);
                }
            }

            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(date.and_time(NaiveTime::default()));
            }
        }

        if let Some(ts) = self.parse_numeric_date(s) {
            return Some(ts);
        }

        trace!("unparsable timestamp \"{}\"", s);
        None
    }

    fn parse_with_offset(&self, s: &str) -> Option<NaiveDateTime> {
        // Replace trailing 'Z' with '+00:00'.
        let normalised = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
            Some(stripped) => format!("{}+00:00", stripped),
            None => s.to_string(),
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(self.timezone.localize(dt));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(&normalised, fmt) {
                return Some(self.timezone.localize(dt));
            }
        }
        None
    }

    fn parse_numeric_date(&self, s: &str) -> Option<NaiveDateTime> {
        let caps = numeric_date_regex().captures(s)?;
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;

        let (day, month) = match self.order {
            DateOrder::DayFirst => (first, second),
            DateOrder::MonthFirst => (second, first),
        };
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        let Some(hour) = caps.get(4) else {
            return Some(date.and_time(NaiveTime::default()));
        };
        let mut hour: u32 = hour.as_str().parse().ok()?;
        let minute: u32 = caps[5].parse().ok()?;
        let second: u32 = match caps.get(6) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let nanos: u32 = match caps.get(7) {
            Some(m) => {
                let digits = m.as_str();
                let value: u32 = digits.parse().ok()?;
                value * 10u32.pow(9 - digits.len() as u32)
            }
            None => 0,
        };

        if let Some(meridiem) = caps.get(8) {
            if hour == 0 || hour > 12 {
                return None;
            }
            let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
            hour = match (pm, hour) {
                (false, 12) => 0,
                (true, 12) => 12,
                (true, h) => h + 12,
                (false, h) => h,
            };
        }

        let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?;
        Some(date.and_time(time))
    }
}

// ── ValueProcessor ────────────────────────────────────────────────────────────

/// Parses meter readings written with either `.` or `,` as decimal separator.
pub struct ValueProcessor;

impl ValueProcessor {
    /// Parse a reading, returning `None` for empty, non-numeric or non-finite input.
    ///
    /// * Whitespace anywhere (including non-breaking spaces) is removed.
    /// * With both `.` and `,` present, the last one is the decimal separator.
    /// * A single `,` is a decimal separator; repeated separators of one kind
    ///   are thousands separators.
    pub fn parse(raw: &str) -> Option<f64> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return None;
        }

        let normalised = Self::normalise_separators(&compact);
        normalised.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn normalise_separators(s: &str) -> String {
        let last_dot = s.rfind('.');
        let last_comma = s.rfind(',');
        match (last_dot, last_comma) {
            (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => s.replace(',', ""),
            (None, Some(_)) if s.matches(',').count() == 1 => s.replace(',', "."),
            (None, Some(_)) => s.replace(',', ""),
            (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
            _ => s.to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn processor(order: DateOrder) -> TimestampProcessor {
        TimestampProcessor::new(order, TimezoneHandler::wall_clock())
    }

    fn ymd_hms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    // ── TimestampProcessor: ISO ──────────────────────────────────────────────

    #[test]
    fn test_parse_iso_variants() {
        let p = processor(DateOrder::DayFirst);
        let expected = ymd_hms(2024, 4, 3, 12, 12, 1);
        assert_eq!(p.parse("2024-04-03 12:12:01"), Some(expected));
        assert_eq!(p.parse("2024-04-03T12:12:01"), Some(expected));
        assert_eq!(p.parse("  2024-04-03 12:12:01  "), Some(expected));
        assert_eq!(
            p.parse("2024-04-03 12:12"),
            Some(ymd_hms(2024, 4, 3, 12, 12, 0))
        );
        assert_eq!(p.parse("2024-04-03"), Some(ymd_hms(2024, 4, 3, 0, 0, 0)));
    }

    #[test]
    fn test_parse_iso_fractional_seconds() {
        let p = processor(DateOrder::DayFirst);
        let ts = p.parse("2024-04-03T12:12:01.250").unwrap();
        assert_eq!(ts.second(), 1);
        assert_eq!(ts.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_iso_unaffected_by_date_order() {
        let day_first = processor(DateOrder::DayFirst).parse("2024-03-04 00:00:00");
        let month_first = processor(DateOrder::MonthFirst).parse("2024-03-04 00:00:00");
        assert_eq!(day_first, month_first);
        assert_eq!(day_first.unwrap().month(), 3);
    }

    // ── TimestampProcessor: offsets ──────────────────────────────────────────

    #[test]
    fn test_parse_offset_keeps_wall_clock_by_default() {
        let p = processor(DateOrder::DayFirst);
        assert_eq!(
            p.parse("2024-01-01T10:05:00+02:00"),
            Some(ymd_hms(2024, 1, 1, 10, 5, 0))
        );
        assert_eq!(
            p.parse("2024-01-01T10:05:00Z"),
            Some(ymd_hms(2024, 1, 1, 10, 5, 0))
        );
    }

    #[test]
    fn test_parse_offset_converts_to_target_zone() {
        let p = TimestampProcessor::new(
            DateOrder::DayFirst,
            TimezoneHandler::new(Some("UTC")).unwrap(),
        );
        assert_eq!(
            p.parse("2024-01-01 10:05:00+02:00"),
            Some(ymd_hms(2024, 1, 1, 8, 5, 0))
        );
    }

    // ── TimestampProcessor: ambiguous dates ──────────────────────────────────

    #[test]
    fn test_day_first_reads_day_then_month() {
        let ts = processor(DateOrder::DayFirst)
            .parse("03/04/2024 12:00")
            .unwrap();
        assert_eq!((ts.day(), ts.month()), (3, 4));
    }

    #[test]
    fn test_month_first_reads_month_then_day() {
        let ts = processor(DateOrder::MonthFirst)
            .parse("03/04/2024 12:00")
            .unwrap();
        assert_eq!((ts.day(), ts.month()), (4, 3));
    }

    #[test]
    fn test_wrong_order_is_rejected_not_reinterpreted() {
        // 13 cannot be a month; month-first must not swap the fields.
        assert!(processor(DateOrder::MonthFirst)
            .parse("13/04/2024 12:00")
            .is_none());
        assert!(processor(DateOrder::DayFirst)
            .parse("04/13/2024 12:00")
            .is_none());
    }

    #[test]
    fn test_dot_and_dash_separators() {
        let p = processor(DateOrder::DayFirst);
        assert_eq!(
            p.parse("03.04.2024 07:15:30"),
            Some(ymd_hms(2024, 4, 3, 7, 15, 30))
        );
        assert_eq!(
            p.parse("3-4-2024 7:15"),
            Some(ymd_hms(2024, 4, 3, 7, 15, 0))
        );
        assert_eq!(p.parse("03/04/2024"), Some(ymd_hms(2024, 4, 3, 0, 0, 0)));
    }

    #[test]
    fn test_meridiem() {
        let p = processor(DateOrder::MonthFirst);
        assert_eq!(
            p.parse("04/03/2024 12:05 AM"),
            Some(ymd_hms(2024, 4, 3, 0, 5, 0))
        );
        assert_eq!(
            p.parse("04/03/2024 12:05 PM"),
            Some(ymd_hms(2024, 4, 3, 12, 5, 0))
        );
        assert_eq!(
            p.parse("04/03/2024 1:05:09 pm"),
            Some(ymd_hms(2024, 4, 3, 13, 5, 9))
        );
        assert!(p.parse("04/03/2024 13:05 PM").is_none());
    }

    #[test]
    fn test_two_digit_years_rejected() {
        let p = processor(DateOrder::DayFirst);
        assert!(p.parse("03/04/24 12:00").is_none());
        assert!(p.parse("25/12/23 08:15:00").is_none());
        assert!(p.parse("03-04-24 12:00").is_none());
        assert!(p.parse("03-04-24").is_none());
        assert!(p.parse("03-04-24 12:00:00+01:00").is_none());
        assert!(processor(DateOrder::MonthFirst).parse("12/25/23 08:15").is_none());
    }

    #[test]
    fn test_year_first_slash_layout_still_parses() {
        let p = processor(DateOrder::DayFirst);
        assert_eq!(
            p.parse("2024/04/03 10:05"),
            Some(ymd_hms(2024, 4, 3, 10, 5, 0))
        );
    }

    #[test]
    fn test_garbage_timestamps() {
        let p = processor(DateOrder::DayFirst);
        assert!(p.parse("").is_none());
        assert!(p.parse("   ").is_none());
        assert!(p.parse("not-a-date").is_none());
        assert!(p.parse("2024-02-30 10:00").is_none());
        assert!(p.parse("31/02/2024 10:00").is_none());
    }

    // ── ValueProcessor ───────────────────────────────────────────────────────

    #[test]
    fn test_value_plain() {
        assert_eq!(ValueProcessor::parse("120"), Some(120.0));
        assert_eq!(ValueProcessor::parse("-20.5"), Some(-20.5));
        assert_eq!(ValueProcessor::parse(" 1.5e3 "), Some(1500.0));
    }

    #[test]
    fn test_value_comma_decimal() {
        assert_eq!(ValueProcessor::parse("12,5"), Some(12.5));
        assert_eq!(ValueProcessor::parse("-0,25"), Some(-0.25));
    }

    #[test]
    fn test_value_thousands_separators() {
        assert_eq!(ValueProcessor::parse("1.234,5"), Some(1234.5));
        assert_eq!(ValueProcessor::parse("1,234.5"), Some(1234.5));
        assert_eq!(ValueProcessor::parse("1,234,567"), Some(1_234_567.0));
        assert_eq!(ValueProcessor::parse("1.234.567"), Some(1_234_567.0));
        assert_eq!(ValueProcessor::parse("1\u{00A0}234,5"), Some(1234.5));
    }

    #[test]
    fn test_value_rejects_non_numeric() {
        assert_eq!(ValueProcessor::parse(""), None);
        assert_eq!(ValueProcessor::parse("n/a"), None);
        assert_eq!(ValueProcessor::parse("12 W"), None);
        assert_eq!(ValueProcessor::parse("NaN"), None);
        assert_eq!(ValueProcessor::parse("inf"), None);
    }

    #[test]
    fn test_value_zero_is_a_value() {
        assert_eq!(ValueProcessor::parse("0"), Some(0.0));
        assert_eq!(ValueProcessor::parse("0,0"), Some(0.0));
    }
}
