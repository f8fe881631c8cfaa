//! Error types for sqlsheet.
//!
//! Defines the main error enum used throughout the application.

use std::path::Path;
use thiserror::Error;

/// Main error type for sqlsheet operations.
#[derive(Error, Debug)]
pub enum SqlSheetError {
    /// The query file or query folder does not exist.
    #[error("Input not found: {0}")]
    InputNotFound(String),

    /// Connecting to the server failed while running a query file.
    #[error("Connection error ({file}): {message}")]
    Connection { file: String, message: String },

    /// The server rejected or failed to run a query file.
    #[error("Query error ({file}): {message}")]
    QueryExecution { file: String, message: String },

    /// Writing the delimited text artifact failed (disk full, permission denied, ...).
    #[error("Export error: {0}")]
    ExportWrite(String),

    /// Building or saving the spreadsheet artifact failed.
    #[error("Formatting error: {0}")]
    Formatting(String),

    /// The output directory could not be created.
    #[error("Cannot create output directory: {0}")]
    DirectoryCreation(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqlSheetError {
    /// Creates an input-not-found error for the given path.
    pub fn input_not_found(path: &Path) -> Self {
        Self::InputNotFound(path.display().to_string())
    }

    /// Creates a connection error attributed to a query file.
    pub fn connection(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connection {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Creates a query execution error attributed to a query file.
    pub fn query(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Creates an export write error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::ExportWrite(msg.into())
    }

    /// Creates a spreadsheet formatting error with the given message.
    pub fn formatting(msg: impl Into<String>) -> Self {
        Self::Formatting(msg.into())
    }

    /// Creates a directory creation error with the given message.
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::DirectoryCreation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InputNotFound(_) => "Input Error",
            Self::Connection { .. } => "Connection Error",
            Self::QueryExecution { .. } => "Query Error",
            Self::ExportWrite(_) => "Export Error",
            Self::Formatting(_) => "Formatting Error",
            Self::DirectoryCreation(_) => "Directory Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using SqlSheetError.
pub type Result<T> = std::result::Result<T, SqlSheetError>;
