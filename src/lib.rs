//! sqlsheet - run SQL query files and export the results as CSV or XLSX.
//!
//! This library exposes the core modules for use in integration tests.

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod secret;
pub mod source;
