//! CSV discovery and loading for the meter report converter.
//!
//! Every `.csv` file is one sheet; a directory input becomes a workbook of
//! all CSV files found beneath it.

use std::io::Read;
use std::path::{Path, PathBuf};

use report_core::error::{ReportError, Result};
use report_core::models::RawTable;
use tracing::{debug, warn};

/// Longest sheet name a spreadsheet accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// One input file to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    /// Sheet label derived from the file stem.
    pub name: String,
    pub path: PathBuf,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Input path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Resolve `input` (a file or a directory) into the sheets to convert.
pub fn discover_sheets(input: &Path) -> Result<Vec<SheetSource>> {
    if !input.exists() {
        return Err(ReportError::InputPathNotFound(input.to_path_buf()));
    }

    let files = if input.is_dir() {
        find_csv_files(input)
    } else {
        vec![input.to_path_buf()]
    };
    if files.is_empty() {
        return Err(ReportError::NoInputFiles(input.to_path_buf()));
    }

    let mut sources: Vec<SheetSource> = Vec::with_capacity(files.len());
    for path in files {
        let mut name = sheet_name(&path);
        // Two files with the same stem in different folders must stay distinct.
        let base = name.clone();
        let mut n = 2;
        while sources.iter().any(|s| s.name == name) {
            name = numbered_sheet_name(&base, n);
            n += 1;
        }
        sources.push(SheetSource { name, path });
    }

    debug!("Discovered {} sheet(s) under {}", sources.len(), input.display());
    Ok(sources)
}

/// Load one CSV file, sniffing the delimiter when `delimiter` is `None`.
pub fn load_table(path: &Path, delimiter: Option<u8>) -> Result<RawTable> {
    let bytes = std::fs::read(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    // Spreadsheet exports often start with a UTF-8 byte order mark.
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);
    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(body));
    read_table(body, delimiter)
}

/// Parse CSV text with a header row into a [`RawTable`].
pub fn read_table<R: Read>(input: R, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut unreadable = 0usize;
    for record in reader.records() {
        match record {
            Ok(r) => {
                if r.iter().all(str::is_empty) {
                    continue;
                }
                rows.push(r.iter().map(str::to_string).collect());
            }
            Err(e) => {
                unreadable += 1;
                debug!("skipping unreadable CSV record: {}", e);
            }
        }
    }
    if unreadable > 0 {
        warn!("{} unreadable CSV record(s) skipped", unreadable);
    }

    Ok(RawTable::new(headers, rows))
}

/// Pick `,`, `;` or tab by counting occurrences in the header line.
pub fn sniff_delimiter(body: &[u8]) -> u8 {
    let header = body.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let count = |d: u8| header.iter().filter(|b| **b == d).count();

    [b';', b'\t']
        .into_iter()
        .filter(|d| count(*d) > count(b','))
        .max_by_key(|d| count(*d))
        .unwrap_or(b',')
}

/// Sheet label for `path`: the file stem, cut to [`MAX_SHEET_NAME`] characters.
pub fn sheet_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Sheet".to_string());
    truncate_sheet_name(&stem)
}

fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(MAX_SHEET_NAME).collect()
}

/// `base (n)`, with `base` shortened so the suffix always survives the length cap.
fn numbered_sheet_name(base: &str, n: usize) -> String {
    let suffix = format!(" ({n})");
    let room = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
    let head: String = base.chars().take(room).collect();
    format!("{head}{suffix}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
