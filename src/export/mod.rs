//! Export pipeline: tabular result → delimited text → optional spreadsheet.

mod delimited;
mod encoding;
mod spreadsheet;

pub use delimited::{render_delimited, TabularExporter, DELIMITER, QUOTE};
pub use encoding::TextEncoding;
pub use spreadsheet::{SpreadsheetFormatter, MAX_CELL_CHARS, MAX_SHEET_NAME_LEN};

use std::path::{Path, PathBuf};

/// Output format requested for each job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Semicolon-delimited text only.
    #[value(alias = "csv")]
    Delimited,
    /// Formatted spreadsheet, built from the delimited text.
    #[value(alias = "xlsx")]
    Spreadsheet,
}

/// Kind of file an export step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    DelimitedText,
    Spreadsheet,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::DelimitedText => "csv",
            Self::Spreadsheet => "xlsx",
        }
    }
}

/// A file written by the export pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl ExportArtifact {
    /// Builds the artifact path `{dir}/{base_name}.{ext}`.
    pub fn in_dir(dir: &Path, base_name: &str, kind: ArtifactKind) -> Self {
        Self {
            path: dir.join(format!("{base_name}.{}", kind.extension())),
            kind,
        }
    }
}
