//! Spreadsheet formatter.
//!
//! Re-reads the delimited artifact and produces an `.xlsx` workbook where
//! every column carries the text number format, so codes like `00042`, long
//! identifiers and date-like strings keep their exact text. The header row
//! gets an autofilter and is frozen. Fields longer than a cell can hold are
//! truncated with a warning; the delimited artifact keeps the full value.
//!
//! The workbook is owned by a single `format` call and dropped on every exit
//! path; nothing is kept between jobs.

use super::{ArtifactKind, ExportArtifact, TextEncoding, DELIMITER, QUOTE};
use crate::error::{Result, SqlSheetError};
use csv::ReaderBuilder;
use rust_xlsxwriter::utility::row_col_to_cell;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info, warn};

/// Longest sheet name a workbook accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Characters a single cell can hold.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Built-in "Text" number format (`@`).
const TEXT_NUM_FORMAT_INDEX: u8 = 49;

/// Converts delimited artifacts into formatted spreadsheets.
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetFormatter {
    encoding: TextEncoding,
    keep_intermediate: bool,
}

impl SpreadsheetFormatter {
    /// `encoding` must match the one the delimited artifact was written with.
    pub fn new(encoding: TextEncoding, keep_intermediate: bool) -> Self {
        Self {
            encoding,
            keep_intermediate,
        }
    }

    /// Builds `target` from the delimited file at `source`.
    ///
    /// An existing file at `target` is removed first. On success the
    /// delimited file is deleted unless retention was requested; on failure
    /// it is left in place.
    pub fn format(
        &self,
        source: &Path,
        target: &Path,
        sheet_name: Option<&str>,
    ) -> Result<ExportArtifact> {
        let records = self.read_records(source)?;
        check_limits(&records)?;

        if target.exists() {
            debug!("Removing existing {}", target.display());
            std::fs::remove_file(target).map_err(|e| {
                SqlSheetError::formatting(format!("Cannot replace {}: {e}", target.display()))
            })?;
        }

        let default_name = target
            .file_stem()
            .map(|s| s.to_string_lossy().chars().take(MAX_SHEET_NAME_LEN).collect::<String>());

        let mut workbook = build_workbook(&records, sheet_name, default_name.as_deref())
            .map_err(|e| SqlSheetError::formatting(e.to_string()))?;

        workbook.save(target).map_err(|e| {
            SqlSheetError::formatting(format!("Cannot save {}: {e}", target.display()))
        })?;

        info!(
            "Saved {} ({} data rows)",
            target.display(),
            records.len().saturating_sub(1)
        );

        if self.keep_intermediate {
            debug!("Keeping intermediate {}", source.display());
        } else if let Err(e) = std::fs::remove_file(source) {
            warn!(
                "Could not delete intermediate file {}: {}",
                source.display(),
                e
            );
        }

        Ok(ExportArtifact {
            path: target.to_path_buf(),
            kind: ArtifactKind::Spreadsheet,
        })
    }

    /// Splits the delimited file into fields with the same delimiter and
    /// qualifier the writer used.
    fn read_records(&self, source: &Path) -> Result<Vec<Vec<String>>> {
        let bytes = std::fs::read(source).map_err(|e| {
            SqlSheetError::formatting(format!("Cannot open {}: {e}", source.display()))
        })?;
        let text = self.encoding.decode(&bytes)?;

        ReaderBuilder::new()
            .delimiter(DELIMITER)
            .quote(QUOTE)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(String::from).collect())
                    .map_err(|e| {
                        SqlSheetError::formatting(format!("{}: {e}", source.display()))
                    })
            })
            .collect()
    }
}

fn check_limits(records: &[Vec<String>]) -> Result<()> {
    if records.len() > MAX_ROWS {
        return Err(SqlSheetError::formatting(format!(
            "{} rows exceed the worksheet limit of {MAX_ROWS}",
            records.len()
        )));
    }
    let columns = records.iter().map(Vec::len).max().unwrap_or(0);
    if columns > MAX_COLUMNS {
        return Err(SqlSheetError::formatting(format!(
            "{columns} columns exceed the worksheet limit of {MAX_COLUMNS}"
        )));
    }
    Ok(())
}

fn build_workbook(
    records: &[Vec<String>],
    sheet_name: Option<&str>,
    default_name: Option<&str>,
) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let text = Format::new().set_num_format_index(TEXT_NUM_FORMAT_INDEX);
    let worksheet = workbook.add_worksheet();

    match sheet_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            if let Err(e) = worksheet.set_name(name) {
                warn!("Cannot rename sheet to '{}': {}. Keeping default name", name, e);
            }
        }
        None => {
            if let Some(name) = default_name {
                if let Err(e) = worksheet.set_name(name) {
                    debug!("Default sheet name '{}' rejected: {}", name, e);
                }
            }
        }
    }

    let columns = records.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..columns {
        worksheet.set_column_format(col as u16, &text)?;
    }

    for (row, record) in records.iter().enumerate() {
        for (col, field) in record.iter().enumerate() {
            // Blank cells already inherit the column's text format.
            if !field.is_empty() {
                let (row, col) = (row as u32, col as u16);
                let value = fit_cell(field, row, col);
                worksheet.write_string_with_format(row, col, &*value, &text)?;
            }
        }
    }

    if columns > 0 {
        let last_row = records.len().saturating_sub(1) as u32;
        worksheet.autofilter(0, 0, last_row, (columns - 1) as u16)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook)
}

/// Cuts a field to the cell capacity. The delimited artifact keeps the full value.
fn fit_cell(field: &str, row: u32, col: u16) -> Cow<'_, str> {
    match field.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                "Cell {} holds {} characters, truncated to {MAX_CELL_CHARS}",
                row_col_to_cell(row, col),
                field.chars().count()
            );
            Cow::Owned(field[..cut].to_string())
        }
        None => Cow::Borrowed(field),
    }
}
