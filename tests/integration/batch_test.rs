//! Batch orchestration integration tests.
//!
//! Runs whole batches against the mock executor and checks the artifacts
//! left in the output directory.

use chrono::{Local, TimeZone};
use pretty_assertions::assert_eq;
use sqlsheet::batch::{BatchOrchestrator, JobStatus};
use sqlsheet::config::ExportConfig;
use sqlsheet::db::{MockExecutor, TabularResult, Value};
use sqlsheet::error::SqlSheetError;
use sqlsheet::export::ExportFormat;
use sqlsheet::source::{QueryInput, QuerySource};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn two_by_three() -> TabularResult {
    TabularResult::with_rows(
        vec!["id".into(), "name".into(), "amount".into()],
        vec![
            vec![Value::Int(1), Value::from("Alice"), Value::Numeric("10.50".into())],
            vec![Value::Int(2), Value::from("Bob"), Value::Null],
        ],
    )
}

/// Creates a query folder holding `names`, each with a trivial query.
fn query_folder(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), "SELECT 1").unwrap();
    }
    dir
}

fn folder_source(dir: &Path) -> QuerySource {
    QuerySource::new(QueryInput::Folder(dir.to_path_buf()), "sql")
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_single_file_delimited() {
    let input = query_folder(&["report.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new().with_result("report.sql", two_by_three());
    let config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    let source = QuerySource::new(QueryInput::File(input.path().join("report.sql")), "sql");

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&source)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(listing(out.path()), vec!["QueryResults.csv"]);

    let bytes = std::fs::read(out.path().join("QueryResults.csv")).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["id;name;amount", "1;Alice;10.50", "2;Bob;"]);
}

#[tokio::test]
async fn test_folder_spreadsheet_removes_intermediate() {
    let input = query_folder(&["a.sql", "B.sql", "notes.txt"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new()
        .with_result("a.sql", two_by_three())
        .with_result("B.sql", two_by_three());
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.output_file = "X".to_string();

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(listing(out.path()), vec!["X_B.xlsx", "X_a.xlsx"]);
    assert_eq!(executor.executed(), vec!["B.sql", "a.sql"]);
}

#[tokio::test]
async fn test_folder_spreadsheet_keeps_intermediate_when_asked() {
    let input = query_folder(&["a.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new().with_result("a.sql", two_by_three());
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.output_file = "X".to_string();
    config.keep_intermediate = true;

    BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert_eq!(listing(out.path()), vec!["X_a.csv", "X_a.xlsx"]);
}

#[tokio::test]
async fn test_empty_folder_is_a_successful_no_op() {
    let input = query_folder(&["readme.md"]);
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("not-created");

    let executor = MockExecutor::new();
    let config = ExportConfig::new(&target, ExportFormat::Spreadsheet);

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(report.outcomes.is_empty());
    assert!(executor.executed().is_empty());
    assert!(!target.exists());
}

#[tokio::test]
async fn test_timestamp_suffix_shared_by_all_jobs() {
    let input = query_folder(&["a.sql", "b.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    config.output_file = "X".to_string();
    config.append_timestamp = true;

    let started = Local.with_ymd_and_hms(2024, 3, 1, 23, 59, 58).unwrap();
    let report = BatchOrchestrator::new(&executor, &config)
        .with_start_time(started)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    let names: Vec<&str> = report
        .outcomes
        .iter()
        .map(|o| o.base_name.as_str())
        .collect();
    assert_eq!(names, vec!["X_a_20240301_235958", "X_b_20240301_235958"]);
    assert_eq!(
        listing(out.path()),
        vec!["X_a_20240301_235958.csv", "X_b_20240301_235958.csv"]
    );
}

#[tokio::test]
async fn test_case_colliding_stems_get_distinct_artifacts() {
    let input = query_folder(&["Sales.sql", "sales.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    config.output_file = "X".to_string();

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(report.is_success());
    let artifacts: Vec<PathBuf> = report
        .artifacts()
        .iter()
        .map(|a| a.path.clone())
        .collect();
    assert_eq!(
        artifacts,
        vec![out.path().join("X_Sales.csv"), out.path().join("X_sales_2.csv")]
    );
}

#[tokio::test]
async fn test_first_failure_aborts_batch() {
    let input = query_folder(&["a.sql", "b.sql", "c.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor =
        MockExecutor::new().with_failure("b.sql", "relation \"nope\" does not exist");
    let mut config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    config.output_file = "X".to_string();

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(executor.executed(), vec!["a.sql", "b.sql"]);
    assert_eq!(listing(out.path()), vec!["X_a.csv"]);

    match &report.outcomes[1].status {
        JobStatus::Failed { error } => {
            assert!(error.contains("b.sql"));
            assert!(error.contains("does not exist"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_formatting_failure_keeps_intermediate_and_aborts() {
    let input = query_folder(&["a.sql", "b.sql"]);
    let out = tempfile::tempdir().unwrap();
    // A directory where the workbook should go cannot be replaced.
    let blocked = out.path().join("X_a.xlsx");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("keep.txt"), "").unwrap();

    let executor = MockExecutor::new().with_result("a.sql", two_by_three());
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.output_file = "X".to_string();

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(executor.executed(), vec!["a.sql"]);

    match &report.outcomes[0].status {
        JobStatus::Failed { error } => assert!(error.starts_with("Formatting error")),
        other => panic!("expected failure, got {other:?}"),
    }

    let csv = out.path().join("X_a.csv");
    assert!(csv.is_file());
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(blocked.is_dir());
    assert!(!out.path().join("X_b.csv").exists());
}

#[tokio::test]
async fn test_continue_on_error_runs_every_job() {
    let input = query_folder(&["a.sql", "b.sql", "c.sql"]);
    let out = tempfile::tempdir().unwrap();

    let executor = MockExecutor::new().with_failure("b.sql", "syntax error");
    let mut config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    config.output_file = "X".to_string();
    config.continue_on_error = true;

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&folder_source(input.path()))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(listing(out.path()), vec!["X_a.csv", "X_c.csv"]);
}

#[tokio::test]
async fn test_missing_single_file_is_input_error() {
    let out = tempfile::tempdir().unwrap();
    let executor = MockExecutor::new();
    let config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    let source = QuerySource::new(QueryInput::File(out.path().join("missing.sql")), "sql");

    let err = BatchOrchestrator::new(&executor, &config)
        .run(&source)
        .await
        .unwrap_err();

    assert!(matches!(err, SqlSheetError::InputNotFound(_)));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_output_directory_is_created() {
    let input = query_folder(&["report.sql"]);
    let out = tempfile::tempdir().unwrap();
    let nested = out.path().join("daily").join("reports");

    let executor = MockExecutor::new();
    let config = ExportConfig::new(&nested, ExportFormat::Delimited);
    let source = QuerySource::new(QueryInput::File(input.path().join("report.sql")), "sql");

    let report = BatchOrchestrator::new(&executor, &config)
        .run(&source)
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(nested.join("QueryResults.csv").is_file());
}

#[tokio::test]
async fn test_output_directory_creation_failure() {
    let input = query_folder(&["report.sql"]);
    let out = tempfile::tempdir().unwrap();
    let blocker = out.path().join("file");
    std::fs::write(&blocker, "").unwrap();

    let executor = MockExecutor::new();
    let config = ExportConfig::new(blocker.join("sub"), ExportFormat::Delimited);
    let source = QuerySource::new(QueryInput::File(input.path().join("report.sql")), "sql");

    let err = BatchOrchestrator::new(&executor, &config)
        .run(&source)
        .await
        .unwrap_err();

    assert!(matches!(err, SqlSheetError::DirectoryCreation(_)));
}
