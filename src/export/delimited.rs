//! Delimited text writer.
//!
//! Output contract:
//! - fields separated by `;`, records terminated by CRLF;
//! - a field containing `;`, `"`, CR or LF is wrapped in `"` with inner
//!   quotes doubled, so any compliant reader recovers the exact string;
//! - NULL is an empty field;
//! - the header line is always written, also for zero rows;
//! - numbers and dates use their invariant text form.

use super::{ArtifactKind, ExportArtifact, TextEncoding};
use crate::db::{TabularResult, Value};
use crate::error::{Result, SqlSheetError};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// Field separator.
pub const DELIMITER: u8 = b';';

/// Text qualifier.
pub const QUOTE: u8 = b'"';

/// Renders a result to delimited text (before character encoding).
///
/// A result without columns renders as an empty string.
pub fn render_delimited(result: &TabularResult) -> Result<String> {
    result.validate()?;

    if result.columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .double_quote(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    let write_err = |e: csv::Error| SqlSheetError::export(e.to_string());

    writer.write_record(&result.columns).map_err(write_err)?;
    for row in &result.rows {
        writer
            .write_record(row.iter().map(Value::to_invariant_string))
            .map_err(write_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| SqlSheetError::export(e.error().to_string()))?;

    String::from_utf8(bytes).map_err(|e| SqlSheetError::export(e.to_string()))
}

/// Writes tabular results to delimited text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularExporter {
    encoding: TextEncoding,
}

impl TabularExporter {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    /// Serializes `result` to `target`, replacing any existing file.
    pub fn export(&self, result: &TabularResult, target: &Path) -> Result<ExportArtifact> {
        let text = render_delimited(result)?;
        let (bytes, replaced) = self.encoding.encode(&text);

        if replaced > 0 {
            warn!(
                "{}: {} characters not representable in {} were written as '?'",
                target.display(),
                replaced,
                self.encoding
            );
        }

        std::fs::write(target, &bytes)
            .map_err(|e| SqlSheetError::export(format!("{}: {e}", target.display())))?;

        debug!(
            "Wrote {} rows ({} bytes) to {}",
            result.row_count(),
            bytes.len(),
            target.display()
        );

        Ok(ExportArtifact {
            path: target.to_path_buf(),
            kind: ArtifactKind::DelimitedText,
        })
    }
}
