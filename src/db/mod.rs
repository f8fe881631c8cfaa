//! Database abstraction layer for sqlsheet.
//!
//! Provides a trait-based interface for running a query file, allowing the
//! batch orchestrator to be driven by a live server or by an in-memory mock.

mod mock;
mod postgres;
mod types;

pub use mock::MockExecutor;
pub use postgres::PostgresExecutor;
pub use types::{unique_column_names, Row, TabularResult, Value};

use crate::error::Result;
use async_trait::async_trait;

/// Runs the full text of one query file and returns its tabular result.
///
/// `file` identifies the query file in errors and logs; `sql` is passed to
/// the server as a single opaque batch.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, file: &str, sql: &str) -> Result<TabularResult>;
}
