//! PostgreSQL query executor.
//!
//! Provides the `PostgresExecutor` struct that implements the `QueryExecutor`
//! trait using sqlx. Each call opens its own connection and closes it once the
//! batch has run.

use crate::config::{ConnectionSettings, SslMode};
use crate::db::{unique_column_names, QueryExecutor, Row, TabularResult, Value};
use crate::error::{Result, SqlSheetError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 15;

/// PostgreSQL query executor.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    settings: ConnectionSettings,
}

impl PostgresExecutor {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = match self.settings.ssl_mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        };

        PgConnectOptions::new()
            .host(&self.settings.host)
            .port(self.settings.port)
            .database(&self.settings.database)
            .username(&self.settings.user)
            .password(self.settings.password.expose())
            .ssl_mode(ssl_mode)
            .application_name("sqlsheet")
    }

    async fn connect(&self, file: &str) -> Result<PgConnection> {
        debug!("Connecting to {}", self.settings.display_string());

        tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            PgConnection::connect_with(&self.connect_options()),
        )
        .await
        .map_err(|_| {
            SqlSheetError::connection(
                file,
                format!(
                    "Connection to {}:{} timed out after {CONNECT_TIMEOUT_SECS} seconds",
                    self.settings.host, self.settings.port
                ),
            )
        })?
        .map_err(|e| map_connection_error(e, file, &self.settings))
    }

    async fn run(&self, conn: &mut PgConnection, file: &str, sql: &str) -> Result<TabularResult> {
        let start = Instant::now();

        // The simple-query protocol accepts multi-statement batches as-is.
        let fetch = (&mut *conn).fetch_all(sqlx::raw_sql(sql));
        let pg_rows = match self.settings.query_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                SqlSheetError::query(
                    file,
                    format!("Query timed out after {} seconds", limit.as_secs()),
                )
            })?,
            None => fetch.await,
        }
        .map_err(|e| SqlSheetError::query(file, format_query_error(e)))?;

        debug!("{} returned {} rows in {:?}", file, pg_rows.len(), start.elapsed());

        let Some(first_row) = pg_rows.first() else {
            let columns = self.describe_columns(conn, file, sql).await;
            return Ok(TabularResult::new(unique_column_names(columns)));
        };

        let shape: Vec<String> = column_names(first_row);
        let mut rows: Vec<Row> = Vec::with_capacity(pg_rows.len());
        let mut dropped = 0usize;

        for row in &pg_rows {
            if column_names(row) == shape {
                rows.push(convert_row(row));
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(
                "{}: ignored {} rows from later result sets with a different column list",
                file, dropped
            );
        }

        Ok(TabularResult::with_rows(unique_column_names(shape), rows))
    }

    /// Fetches column names for a query that returned no rows by preparing it.
    /// Multi-statement batches cannot be prepared and yield no columns.
    async fn describe_columns(
        &self,
        conn: &mut PgConnection,
        file: &str,
        sql: &str,
    ) -> Vec<String> {
        match (&mut *conn).prepare(sql).await {
            Ok(statement) => statement
                .columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect(),
            Err(e) => {
                debug!("{}: no column metadata for empty result: {}", file, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, file: &str, sql: &str) -> Result<TabularResult> {
        let mut conn = self.connect(file).await?;
        info!("{}: running query against {}", file, self.settings.display_string());

        let result = self.run(&mut conn, file, sql).await;

        if let Err(e) = conn.close().await {
            debug!("{}: error while closing connection: {}", file, e);
        }

        result
    }
}

fn column_names(row: &PgRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let typed = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row.try_get::<bool, _>(index).ok().map(Value::Bool),

        "INT2" | "SMALLINT" => row
            .try_get::<i16, _>(index)
            .ok()
            .map(|v| Value::Int(v as i64)),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<i32, _>(index)
            .ok()
            .map(|v| Value::Int(v as i64)),

        "INT8" | "BIGINT" => row.try_get::<i64, _>(index).ok().map(Value::Int),

        // Widening through the shortest decimal form keeps 1.1 as 1.1.
        "FLOAT4" | "REAL" => row
            .try_get::<f32, _>(index)
            .ok()
            .and_then(|v| v.to_string().parse::<f64>().ok())
            .map(Value::Float),

        "FLOAT8" | "DOUBLE PRECISION" => row.try_get::<f64, _>(index).ok().map(Value::Float),

        "NUMERIC" => text_value(row, index).map(Value::Numeric),

        "DATE" => row.try_get::<NaiveDate, _>(index).ok().map(Value::Date),

        "TIME" => row.try_get::<NaiveTime, _>(index).ok().map(Value::Time),

        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .ok()
            .map(Value::Timestamp),

        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .ok()
            .map(Value::TimestampTz),

        "BYTEA" => row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes),

        _ => None,
    };

    typed
        .or_else(|| text_value(row, index).map(Value::Text))
        .unwrap_or(Value::Null)
}

/// Reads the server's text representation of a value. Rows fetched over the
/// simple-query protocol are always in text format.
fn text_value(row: &PgRow, index: usize) -> Option<String> {
    row.try_get_unchecked::<String, _>(index).ok()
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(
    error: sqlx::Error,
    file: &str,
    settings: &ConnectionSettings,
) -> SqlSheetError {
    let host = &settings.host;
    let port = settings.port;
    let error_str = error.to_string().to_lowercase();

    let message = if error_str.contains("connection refused")
        || error_str.contains("could not connect")
    {
        format!("Cannot connect to {host}:{port}. Check that the server is running.")
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        format!(
            "Authentication failed for user '{}'. Check your credentials.",
            settings.user
        )
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        format!("Database '{}' does not exist.", settings.database)
    } else {
        error.to_string()
    };

    SqlSheetError::connection(file, message)
}

/// Formats a query error with detail and hint if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
