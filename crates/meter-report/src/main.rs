mod bootstrap;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use report_core::options::ConversionOptions;
use report_core::settings::Settings;
use report_data::analysis::{convert_path, WorkbookReport};
use report_data::writer::{write_outputs, RenderOptions};

fn main() -> Result<()> {
    let settings = Settings::load_with_defaults()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;
    tracing::info!("meter-report v{} starting", env!("CARGO_PKG_VERSION"));

    let Some(input) = settings.input.clone() else {
        if settings.clear {
            println!("Saved defaults cleared.");
            return Ok(());
        }
        if settings.save_defaults {
            println!("Defaults saved.");
            return Ok(());
        }
        bail!("no input given: pass a CSV file or a directory of CSV files");
    };

    let (report, written) = run(&settings, &input)?;
    print_summary(&report, &written);
    Ok(())
}

/// Convert `input` with the options in `settings` and write the outputs.
fn run(settings: &Settings, input: &Path) -> Result<(WorkbookReport, Vec<PathBuf>)> {
    let options = ConversionOptions::try_from(settings)?;
    let format = settings.output_format()?;
    let delimiter = settings.delimiter_byte()?;

    tracing::info!(
        "Converting {} (date order: {}, trim: {})",
        input.display(),
        options.date_order.as_str(),
        options.trim.is_enabled()
    );

    let report = convert_path(input, delimiter, &options)?;
    if report.has_no_data() {
        tracing::warn!("No usable data in {}", input.display());
        return Ok((report, Vec::new()));
    }

    let output_dir = bootstrap::ensure_output_dir(&settings.output_dir)?;
    let written = write_outputs(&report, &output_dir, format, RenderOptions::from_options(&options))?;
    Ok((report, written))
}

fn print_summary(report: &WorkbookReport, written: &[PathBuf]) {
    for sheet in &report.sheets {
        println!(
            "{}: {} row(s) read, {} dropped, {} day(s)  [{} / {}]",
            sheet.name,
            sheet.rows_read,
            sheet.rows_dropped,
            sheet.days(),
            sheet.timestamp_column,
            sheet.value_column
        );
    }
    for skipped in &report.skipped {
        println!("{}: skipped ({})", skipped.name, skipped.reason);
    }

    if report.has_no_data() {
        println!("No usable data: nothing was written.");
        return;
    }
    for path in written {
        println!("Wrote {}", path.display());
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
