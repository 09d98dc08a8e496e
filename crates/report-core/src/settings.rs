use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};
use crate::options::{ConversionOptions, DateOrder, GapFill, OutputFormat, SummaryStatistic, TrimPolicy};
use crate::time_utils::sanitize_timezone;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Convert irregular power-meter exports into 10-minute day-columnar reports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meter-report",
    about = "Convert irregular power-meter exports into 10-minute day-columnar reports",
    version
)]
pub struct Settings {
    /// Input CSV file, or a directory of CSV files (one sheet per file)
    pub input: Option<PathBuf>,

    /// Directory the converted reports are written to
    #[arg(long, short = 'o', default_value = ".")]
    pub output_dir: PathBuf,

    /// Output format
    #[arg(long, default_value = "csv", value_parser = ["csv", "json", "both"])]
    pub format: String,

    /// How slash/dot dates like 03/04/2024 are read
    #[arg(long, default_value = "day-first", value_parser = ["day-first", "month-first"])]
    pub date_order: String,

    /// Blank leading and trailing zero runs of every day
    #[arg(long)]
    pub trim: bool,

    /// Rendering of slots with no reading
    #[arg(long, default_value = "blank", value_parser = ["blank", "zero"])]
    pub gap_fill: String,

    /// Emit empty days between the first and last observed day
    #[arg(long)]
    pub fill_missing_days: bool,

    /// Append Total/Mean/Max/Min rows to every day block
    #[arg(long)]
    pub summary: bool,

    /// Per-day statistic combined across sheets in the totals table
    #[arg(long, default_value = "max", value_parser = ["total", "mean", "max", "min"])]
    pub total_statistic: String,

    /// Timestamp column header (auto-detected if not specified)
    #[arg(long)]
    pub timestamp_column: Option<String>,

    /// Power column header (auto-detected if not specified)
    #[arg(long)]
    pub value_column: Option<String>,

    /// CSV field delimiter
    #[arg(long, default_value = "auto", value_parser = ["auto", "comma", "semicolon", "tab"])]
    pub delimiter: String,

    /// Zone that offset-carrying timestamps are converted into ("auto" = system)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Saved defaults file (defaults to ~/.meter-report/defaults.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Persist the current report options as defaults
    #[arg(long)]
    pub save_defaults: bool,

    /// Clear saved defaults
    #[arg(long)]
    pub clear: bool,
}

// ── ReportDefaults ─────────────────────────────────────────────────────────────

/// Report options persisted to `~/.meter-report/defaults.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ReportDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_missing_days: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_statistic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl ReportDefaults {
    /// Return the default path to the persisted defaults file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the defaults path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".meter-report").join("defaults.json")
    }

    /// Load defaults from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write defaults to an explicit path.
    pub fn save_to(&self, path: &Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the defaults file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments and merge saved defaults for every option that was
    /// not given explicitly.
    ///
    /// Fails when `--save-defaults` or `--clear` cannot update the defaults file.
    pub fn load_with_defaults() -> Result<Self> {
        Self::load_with_defaults_impl(std::env::args_os().collect(), &ReportDefaults::config_path())
    }

    /// Full implementation. `default_config` is used unless `--config` is given,
    /// so tests can redirect to a temporary directory.
    pub fn load_with_defaults_impl(
        args: Vec<std::ffi::OsString>,
        default_config: &Path,
    ) -> Result<Self> {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        let config_path = settings
            .config
            .clone()
            .unwrap_or_else(|| default_config.to_path_buf());

        if settings.clear {
            ReportDefaults::clear_at(&config_path).map_err(|source| ReportError::ConfigWrite {
                path: config_path.clone(),
                source,
            })?;
            return Ok(Self::resolve_flags(settings));
        }

        let saved = ReportDefaults::load_from(&config_path);
        settings.merge_defaults(saved, &matches);
        settings = Self::resolve_flags(settings);

        if settings.save_defaults {
            ReportDefaults::from(&settings)
                .save_to(&config_path)
                .map_err(|source| ReportError::ConfigWrite {
                    path: config_path.clone(),
                    source,
                })?;
        }

        Ok(settings)
    }

    /// Overlay `saved` onto every field the command line did not set.
    // NOTE: clap stores the arg id using the *field name* (underscores).
    fn merge_defaults(&mut self, saved: ReportDefaults, matches: &clap::ArgMatches) {
        fn take<T>(matches: &clap::ArgMatches, id: &str, saved: Option<T>, slot: &mut T) {
            if !is_arg_explicitly_set(matches, id) {
                if let Some(v) = saved {
                    *slot = v;
                }
            }
        }

        take(matches, "format", saved.format, &mut self.format);
        take(matches, "date_order", saved.date_order, &mut self.date_order);
        take(matches, "trim", saved.trim, &mut self.trim);
        take(matches, "gap_fill", saved.gap_fill, &mut self.gap_fill);
        take(
            matches,
            "fill_missing_days",
            saved.fill_missing_days,
            &mut self.fill_missing_days,
        );
        take(matches, "summary", saved.summary, &mut self.summary);
        take(
            matches,
            "total_statistic",
            saved.total_statistic,
            &mut self.total_statistic,
        );
        take(matches, "delimiter", saved.delimiter, &mut self.delimiter);
        if !is_arg_explicitly_set(matches, "timezone") && self.timezone.is_none() {
            self.timezone = sanitize_timezone(saved.timezone);
        }
    }

    /// Apply the `--debug` flag.
    fn resolve_flags(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The requested output format.
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse()
    }

    /// Explicit CSV delimiter byte, `None` to sniff it from the file.
    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter.to_lowercase().as_str() {
            "auto" => Ok(None),
            "comma" | "," => Ok(Some(b',')),
            "semicolon" | ";" => Ok(Some(b';')),
            "tab" | "\t" => Ok(Some(b'\t')),
            other => Err(ReportError::Config(format!("unknown delimiter: {other}"))),
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl TryFrom<&Settings> for ConversionOptions {
    type Error = ReportError;

    fn try_from(s: &Settings) -> Result<Self> {
        Ok(ConversionOptions {
            date_order: s.date_order.parse::<DateOrder>()?,
            trim: TrimPolicy::from_flag(s.trim),
            gap_fill: s.gap_fill.parse::<GapFill>()?,
            fill_missing_days: s.fill_missing_days,
            include_summary: s.summary,
            total_statistic: s.total_statistic.parse::<SummaryStatistic>()?,
            timestamp_column: s.timestamp_column.clone(),
            value_column: s.value_column.clone(),
            timezone: s.timezone.clone(),
        })
    }
}

impl From<&Settings> for ReportDefaults {
    fn from(s: &Settings) -> Self {
        ReportDefaults {
            format: Some(s.format.clone()),
            date_order: Some(s.date_order.clone()),
            trim: Some(s.trim),
            gap_fill: Some(s.gap_fill.clone()),
            fill_missing_days: Some(s.fill_missing_days),
            summary: Some(s.summary),
            total_statistic: Some(s.total_statistic.clone()),
            delimiter: Some(s.delimiter.clone()),
            timezone: s.timezone.clone(),
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
