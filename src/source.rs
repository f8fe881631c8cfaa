//! Query file discovery.
//!
//! Resolves the query files of a run: one explicit file, or every file
//! directly inside a folder whose extension matches (case-insensitive).

use crate::error::{Result, SqlSheetError};
use encoding_rs::WINDOWS_1252;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the operator pointed the run at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryInput {
    File(PathBuf),
    Folder(PathBuf),
}

impl QueryInput {
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// One query file to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFile {
    pub path: PathBuf,
}

impl QueryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name used to attribute logs and errors.
    pub fn identifier(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Reads the query text.
    ///
    /// A UTF-8 byte-order mark is dropped. Files that are not valid UTF-8
    /// are read as windows-1252, the usual encoding of scripts saved by
    /// older Windows editors.
    pub fn read_text(&self) -> Result<String> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| SqlSheetError::InputNotFound(format!("{}: {e}", self.path.display())))?;
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes[..]);

        match std::str::from_utf8(body) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => {
                debug!("{} is not UTF-8, reading as windows-1252", self.identifier());
                Ok(WINDOWS_1252.decode_without_bom_handling(body).0.into_owned())
            }
        }
    }
}

/// Enumerates the query files for an input.
#[derive(Debug, Clone)]
pub struct QuerySource {
    input: QueryInput,
    extension: String,
}

impl QuerySource {
    /// `extension` is matched case-insensitively; a leading dot is ignored.
    pub fn new(input: QueryInput, extension: &str) -> Self {
        Self {
            input,
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn input(&self) -> &QueryInput {
        &self.input
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Lists the query files, sorted by file name.
    ///
    /// A folder without matching files yields an empty list.
    pub fn discover(&self) -> Result<Vec<QueryFile>> {
        match &self.input {
            QueryInput::File(path) => {
                if !path.is_file() {
                    return Err(SqlSheetError::input_not_found(path));
                }
                Ok(vec![QueryFile::new(path.clone())])
            }
            QueryInput::Folder(dir) => self.discover_folder(dir),
        }
    }

    fn discover_folder(&self, dir: &Path) -> Result<Vec<QueryFile>> {
        if !dir.is_dir() {
            return Err(SqlSheetError::input_not_found(dir));
        }

        let entries = std::fs::read_dir(dir)
            .map_err(|e| SqlSheetError::InputNotFound(format!("{}: {e}", dir.display())))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| SqlSheetError::InputNotFound(format!("{}: {e}", dir.display())))?;
            let path = entry.path();
            if path.is_file() && self.matches_extension(&path) {
                files.push(QueryFile::new(path));
            }
        }

        files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        debug!("Found {} query files in {}", files.len(), dir.display());
        Ok(files)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}
