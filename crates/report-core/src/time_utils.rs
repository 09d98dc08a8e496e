use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{ReportError, Result};

// ── Slot grid ─────────────────────────────────────────────────────────────────

/// Width of one report bucket in minutes.
pub const BUCKET_MINUTES: u32 = 10;

/// Number of buckets covering one calendar day (00:00 … 23:50).
pub const SLOTS_PER_DAY: usize = (24 * 60 / BUCKET_MINUTES) as usize;

/// Index of the bucket containing `time`, in `0..SLOTS_PER_DAY`.
pub fn slot_index(time: NaiveTime) -> usize {
    let minutes = time.hour() * 60 + time.minute();
    (minutes / BUCKET_MINUTES) as usize
}

/// Start time of bucket `slot`. Out-of-range slots clamp to the last bucket.
pub fn slot_start(slot: usize) -> NaiveTime {
    let slot = slot.min(SLOTS_PER_DAY - 1) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(slot * BUCKET_MINUTES * 60, 0)
        .unwrap_or_default()
}

/// `HH:MM` label of bucket `slot`.
pub fn slot_label(slot: usize) -> String {
    slot_start(slot).format("%H:%M").to_string()
}

/// All 144 slot labels in ascending order.
pub fn slot_labels() -> Vec<String> {
    (0..SLOTS_PER_DAY).map(slot_label).collect()
}

/// Floor `ts` to the start of its enclosing bucket.
///
/// This is a floor, never round-to-nearest: `12:19:59` maps to `12:10:00`.
pub fn floor_to_bucket(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date().and_time(slot_start(slot_index(ts.time())))
}

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Maps offset-carrying timestamps onto the report's local wall clock.
///
/// Meter exports usually hold naive local readings; those never pass through
/// here. Timestamps with an explicit UTC offset are either converted into the
/// configured report zone or, when no zone is configured, kept at the
/// wall-clock time they were written with.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimezoneHandler {
    target: Option<Tz>,
}

impl TimezoneHandler {
    /// Build a handler from an optional zone name; `"auto"` picks the system zone.
    pub fn new(tz_name: Option<&str>) -> Result<Self> {
        let target = match tz_name {
            None => None,
            Some(name) => {
                let name = if name.eq_ignore_ascii_case("auto") {
                    get_system_timezone()
                } else {
                    name.to_string()
                };
                let tz = name
                    .parse::<Tz>()
                    .map_err(|_| ReportError::InvalidTimezone(name.clone()))?;
                Some(tz)
            }
        };
        Ok(Self { target })
    }

    /// Handler that keeps every timestamp's written wall-clock time.
    pub fn wall_clock() -> Self {
        Self { target: None }
    }

    /// Convert `dt` to a naive local timestamp in the report zone.
    pub fn localize(&self, dt: DateTime<FixedOffset>) -> NaiveDateTime {
        match self.target {
            Some(tz) => dt.with_timezone(&tz).naive_local(),
            None => dt.naive_local(),
        }
    }

    /// The configured report zone, if any.
    pub fn target(&self) -> Option<Tz> {
        self.target
    }
}

/// Resolve a zone name, warning about and discarding unknown names.
///
/// Used for values loaded from a saved defaults file, where a stale zone
/// must not prevent the report from running.
pub fn sanitize_timezone(tz_name: Option<String>) -> Option<String> {
    let name = tz_name?;
    if name.eq_ignore_ascii_case("auto") || validate_timezone(&name) {
        Some(name)
    } else {
        warn!("ignoring unrecognised timezone \"{}\"", name);
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
