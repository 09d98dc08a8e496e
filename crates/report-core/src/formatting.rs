use crate::options::GapFill;

/// Decimal places kept for non-integer report values.
pub const VALUE_DECIMALS: u32 = 6;

/// Text used for a summary statistic that is undefined for its day.
pub const UNDEFINED_LABEL: &str = "n/a";

/// Round `value` to `decimals` places.
///
/// Values too large to scale without overflowing have no fractional digits
/// left to round and are returned unchanged.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Unit-scaled magnitude of a raw watt reading: `abs(raw) / 1000`, rounded.
///
/// # Examples
///
/// ```
/// use report_core::formatting::scale_to_kilo;
///
/// assert_eq!(scale_to_kilo(100.0), 0.1);
/// assert_eq!(scale_to_kilo(-2500.0), 2.5);
/// ```
pub fn scale_to_kilo(raw: f64) -> f64 {
    round_to(raw.abs() / 1000.0, VALUE_DECIMALS)
}

/// Format a report value: whole numbers as integers, everything else rounded
/// to six decimals without trailing zeros.
///
/// # Examples
///
/// ```
/// use report_core::formatting::format_value;
///
/// assert_eq!(format_value(150.0), "150");
/// assert_eq!(format_value(-20.0), "-20");
/// assert_eq!(format_value(0.1), "0.1");
/// assert_eq!(format_value(1.23456789), "1.234568");
/// ```
pub fn format_value(value: f64) -> String {
    let rounded = round_to(value, VALUE_DECIMALS);
    if rounded == 0.0 {
        // Avoid "-0".
        return "0".to_string();
    }
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        return format!("{}", rounded as i64);
    }

    let text = format!("{:.prec$}", rounded, prec = VALUE_DECIMALS as usize);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Render a possibly-absent slot value for output.
pub fn render_cell(value: Option<f64>, fill: GapFill) -> String {
    match (value, fill) {
        (Some(v), _) => format_value(v),
        (None, GapFill::Blank) => String::new(),
        (None, GapFill::Zero) => "0".to_string(),
    }
}

/// Render a summary statistic; undefined statistics are flagged, never shown as 0.
pub fn render_statistic(value: Option<f64>) -> String {
    match value {
        Some(v) => format_value(v),
        None => UNDEFINED_LABEL.to_string(),
    }
}
