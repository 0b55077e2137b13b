//! Writing output tables to spreadsheet files.
//!
//! The whole document is rendered in memory first and then written to a
//! temporary file beside the destination, which is atomically persisted.
//! A failed write never leaves a partial file at the destination.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::normalizer::OutputTable;

/// Errors that can occur when writing output.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to build workbook: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to write CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Table too large for a worksheet: {0}")]
    TooLarge(String),
}

/// Worksheet name used for xlsx output.
pub const SHEET_NAME: &str = "Records";

/// Longest text a single worksheet cell can hold, in characters.
pub const MAX_XLSX_CELL_CHARS: usize = 32_767;

/// File name used when the input has no usable name (stdin).
pub const DEFAULT_OUTPUT_NAME: &str = "converted_records.xlsx";

/// Supported output file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    /// Guesses the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        extension.parse().ok()
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}' (expected xlsx, csv or json)",
                other
            )),
        }
    }
}

/// Derives the output path from the input path.
///
/// `letters/Amsterdam.txt` becomes `letters/Amsterdam_converted.xlsx`;
/// stdin (`-`) becomes `converted_records.xlsx` in the working directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    if input == Path::new("-") {
        return PathBuf::from(DEFAULT_OUTPUT_NAME);
    }
    match input.file_stem().and_then(|s| s.to_str()) {
        Some(stem) if !stem.is_empty() => input.with_file_name(format!(
            "{}_converted.{}",
            stem,
            OutputFormat::Xlsx.extension()
        )),
        _ => PathBuf::from(DEFAULT_OUTPUT_NAME),
    }
}

/// Renders a table into the bytes of a file in `format`.
pub fn render(table: &OutputTable, format: OutputFormat) -> Result<Vec<u8>, OutputError> {
    match format {
        OutputFormat::Xlsx => render_xlsx(table),
        OutputFormat::Csv => render_csv(table),
        OutputFormat::Json => render_json(table),
    }
}

/// Writes a table to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if rendering fails or the destination is not writable.
/// The destination is left untouched in that case.
pub fn write_table(table: &OutputTable, path: &Path, format: OutputFormat) -> Result<(), OutputError> {
    let bytes = render(table, format)?;
    persist(path, &bytes)?;
    info!(
        path = %path.display(),
        format = %format,
        rows = table.len(),
        "wrote output table"
    );
    Ok(())
}

fn persist(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| OutputError::IoError(e.error))?;
    Ok(())
}

fn render_xlsx(table: &OutputTable) -> Result<Vec<u8>, OutputError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, name) in table.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, column_number(col)?, name, &header)?;
        }

        for (index, row) in table.rows.iter().enumerate() {
            let row_number = u32::try_from(index + 1)
                .map_err(|_| OutputError::TooLarge(format!("{} rows", table.len())))?;
            for (col, cell) in row.iter().enumerate() {
                // Missing cells stay blank.
                if let Some(text) = cell {
                    let text = fit_cell(text, index + 1, &table.columns[col]);
                    worksheet.write_string(row_number, column_number(col)?, text)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Cuts `text` down to what a worksheet cell can hold.
fn fit_cell<'a>(text: &'a str, row: usize, column: &str) -> &'a str {
    match text.char_indices().nth(MAX_XLSX_CELL_CHARS) {
        Some((end, _)) => {
            warn!(
                row,
                column,
                chars = text.chars().count(),
                limit = MAX_XLSX_CELL_CHARS,
                "cell text too long for a worksheet, truncating"
            );
            &text[..end]
        }
        None => text,
    }
}

fn column_number(index: usize) -> Result<u16, OutputError> {
    u16::try_from(index).map_err(|_| OutputError::TooLarge(format!("{} columns", index + 1)))
}

fn render_csv(table: &OutputTable) -> Result<Vec<u8>, OutputError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer
        .into_inner()
        .map_err(|e| OutputError::IoError(io::Error::new(e.error().kind(), e.error().to_string())))
}

fn render_json(table: &OutputTable) -> Result<Vec<u8>, OutputError> {
    let rows: Vec<Map<String, Value>> = (0..table.len())
        .map(|row| {
            table
                .row_pairs(row)
                .map(|(column, cell)| {
                    let value = cell.map_or(Value::Null, |text| Value::String(text.to_string()));
                    (column.to_string(), value)
                })
                .collect()
        })
        .collect();

    let mut bytes = serde_json::to_vec_pretty(&rows)?;
    bytes.push(b'\n');
    Ok(bytes)
}
