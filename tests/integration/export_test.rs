//! Export pipeline integration tests.
//!
//! Checks the bytes of the delimited artifact and the parts of the
//! generated workbook for batches run against the mock executor.

use pretty_assertions::assert_eq;
use sqlsheet::batch::BatchOrchestrator;
use sqlsheet::config::ExportConfig;
use sqlsheet::db::{MockExecutor, TabularResult, Value};
use sqlsheet::export::{ExportFormat, TextEncoding};
use sqlsheet::source::{QueryInput, QuerySource};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

fn read_part(path: &Path, name: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn single_query(name: &str) -> (TempDir, QuerySource) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, "SELECT 1").unwrap();
    let source = QuerySource::new(QueryInput::File(path), "sql");
    (dir, source)
}

async fn run(result: TabularResult, config: &ExportConfig) {
    let (_input, source) = single_query("report.sql");
    let executor = MockExecutor::new().with_result("report.sql", result);
    let report = BatchOrchestrator::new(&executor, config)
        .run(&source)
        .await
        .unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn test_legacy_encoding_bytes() {
    let out = tempfile::tempdir().unwrap();
    let config = ExportConfig::new(out.path(), ExportFormat::Delimited);

    let result = TabularResult::with_rows(
        vec!["city".into(), "note".into()],
        vec![vec![Value::from("Zürich"), Value::from("a;b")]],
    );
    run(result, &config).await;

    let bytes = std::fs::read(out.path().join("QueryResults.csv")).unwrap();
    assert_eq!(bytes, b"city;note\r\nZ\xFCrich;\"a;b\"\r\n".to_vec());
}

#[tokio::test]
async fn test_utf8_bom_encoding() {
    let out = tempfile::tempdir().unwrap();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Delimited);
    config.encoding = "utf-8-bom".parse::<TextEncoding>().unwrap();

    let result = TabularResult::with_rows(vec!["name".into()], vec![vec![Value::from("日本")]]);
    run(result, &config).await;

    let bytes = std::fs::read(out.path().join("QueryResults.csv")).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    assert_eq!(
        String::from_utf8(bytes[3..].to_vec()).unwrap(),
        "name\r\n日本\r\n"
    );
}

#[tokio::test]
async fn test_spreadsheet_keeps_text_and_filters_header() {
    let out = tempfile::tempdir().unwrap();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.sheet_name = Some("Orders".to_string());

    let result = TabularResult::with_rows(
        vec!["code".into(), "amount".into()],
        vec![
            vec![Value::from("00042"), Value::Numeric("1.50".into())],
            vec![Value::from("2024-01-01"), Value::Null],
        ],
    );
    run(result, &config).await;

    let xlsx = out.path().join("QueryResults.xlsx");
    assert!(xlsx.is_file());
    assert!(!out.path().join("QueryResults.csv").exists());

    let sheet = read_part(&xlsx, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<autoFilter ref="A1:B3"/>"#));
    assert!(sheet.contains(r#"state="frozen""#));

    let strings = read_part(&xlsx, "xl/sharedStrings.xml");
    assert!(strings.contains("<t>00042</t>"));
    assert!(strings.contains("<t>2024-01-01</t>"));

    let styles = read_part(&xlsx, "xl/styles.xml");
    assert!(styles.contains(r#"<xf numFmtId="49""#));

    let workbook = read_part(&xlsx, "xl/workbook.xml");
    assert!(workbook.contains(r#"name="Orders""#));
}

#[tokio::test]
async fn test_spreadsheet_header_only() {
    let out = tempfile::tempdir().unwrap();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.keep_intermediate = true;

    run(TabularResult::new(vec!["id".into(), "name".into()]), &config).await;

    let csv = std::fs::read(out.path().join("QueryResults.csv")).unwrap();
    assert_eq!(csv, b"id;name\r\n".to_vec());

    let xlsx = out.path().join("QueryResults.xlsx");
    let sheet = read_part(&xlsx, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<autoFilter ref="A1:B1"/>"#));
    assert!(sheet.contains(r#"state="frozen""#));

    let workbook = read_part(&xlsx, "xl/workbook.xml");
    assert!(workbook.contains(r#"name="QueryResults""#));
}

#[tokio::test]
async fn test_invalid_sheet_name_is_not_fatal() {
    let out = tempfile::tempdir().unwrap();
    let mut config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);
    config.sheet_name = Some("bad/name".to_string());

    let result = TabularResult::with_rows(vec!["a".into()], vec![vec![Value::Int(1)]]);
    run(result, &config).await;

    let workbook = read_part(&out.path().join("QueryResults.xlsx"), "xl/workbook.xml");
    assert!(workbook.contains(r#"name="Sheet1""#));
}

#[tokio::test]
async fn test_rerun_replaces_existing_artifacts() {
    let out = tempfile::tempdir().unwrap();
    let config = ExportConfig::new(out.path(), ExportFormat::Spreadsheet);

    let first = TabularResult::with_rows(vec!["v".into()], vec![vec![Value::from("first")]]);
    run(first, &config).await;
    let second = TabularResult::with_rows(vec!["v".into()], vec![vec![Value::from("second")]]);
    run(second, &config).await;

    let strings = read_part(&out.path().join("QueryResults.xlsx"), "xl/sharedStrings.xml");
    assert!(strings.contains("<t>second</t>"));
    assert!(!strings.contains("<t>first</t>"));
}
