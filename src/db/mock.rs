//! Mock query executor for testing.
//!
//! Returns predefined results per query file and records every call, so the
//! batch pipeline can be exercised without a database server.

use super::{QueryExecutor, TabularResult, Value};
use crate::error::{Result, SqlSheetError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A mock executor that returns canned results keyed by query file name.
#[derive(Default)]
pub struct MockExecutor {
    results: HashMap<String, TabularResult>,
    failures: HashMap<String, String>,
    executed: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the result returned for `file`.
    pub fn with_result(mut self, file: impl Into<String>, result: TabularResult) -> Self {
        self.results.insert(file.into(), result);
        self
    }

    /// Makes `file` fail with a query error carrying `message`.
    pub fn with_failure(mut self, file: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(file.into(), message.into());
        self
    }

    /// Names of the query files executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, file: &str, sql: &str) -> Result<TabularResult> {
        if let Ok(mut calls) = self.executed.lock() {
            calls.push(file.to_string());
        }

        if let Some(message) = self.failures.get(file) {
            return Err(SqlSheetError::query(file, message.clone()));
        }

        if let Some(result) = self.results.get(file) {
            return Ok(result.clone());
        }

        // Unregistered files echo their query text in a one-cell result.
        Ok(TabularResult::with_rows(
            vec!["query".to_string()],
            vec![vec![Value::Text(sql.to_string())]],
        ))
    }
}
