//! Export a table, read the file back and import it into an empty copy

mod common;

use std::sync::Arc;

use common::{MemoryTable, people_rows, people_table, tags_table};
use pretty_assertions::assert_eq;
use rowport_core::{TableSchema, Value};
use rowport_interchange::{
    ColumnMapping, ExportOptions, ExportRequest, Exporter, FileFormat, ImportOptions, Importer,
    ParseHints, parse,
};

async fn round_trip(format: FileFormat, rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    round_trip_table(people_table(), format, rows).await
}

async fn round_trip_table(
    table: TableSchema,
    format: FileFormat,
    rows: Vec<Vec<Value>>,
) -> Vec<Vec<Value>> {
    let origin = Arc::new(MemoryTable::new(table.clone()).with_rows(rows.clone()));
    let artifact = Exporter::new(origin)
        .export(
            &ExportRequest::new(table.clone()),
            &ExportOptions::default().with_format(format),
        )
        .await
        .unwrap();
    assert_eq!(artifact.rows_exported, rows.len() as u64);

    let parsed = parse(&artifact.bytes, &ParseHints::default()).unwrap();
    assert_eq!(parsed.format, format);
    assert_eq!(parsed.source_columns, table.column_names());
    assert_eq!(parsed.row_count(), rows.len());

    let target = Arc::new(MemoryTable::new(table.clone()));
    let mapping = ColumnMapping::identity(&parsed.source_columns);
    let result = Importer::new(target.clone())
        .import(&table, &parsed, &mapping, &ImportOptions::default())
        .await
        .unwrap();
    assert!(result.success, "{:?}", result.errors);
    assert!(result.warnings.is_empty());

    target.stored()
}

#[tokio::test]
async fn test_csv_round_trip_reproduces_rows() {
    let mut rows = people_rows();
    // an empty string must not come back as NULL
    rows[2][2] = Value::from("");

    let stored = round_trip(FileFormat::Csv, rows.clone()).await;
    assert_eq!(stored, rows);
}

#[tokio::test]
async fn test_spreadsheet_round_trip_reproduces_rows() {
    let stored = round_trip(FileFormat::Spreadsheet, people_rows()).await;
    assert_eq!(stored, people_rows());
}

#[tokio::test]
async fn test_single_column_csv_keeps_null_rows() {
    let rows = vec![
        vec![Value::from("a")],
        vec![Value::Null],
        vec![Value::from("b")],
        vec![Value::Null],
    ];
    let stored = round_trip_table(tags_table(), FileFormat::Csv, rows.clone()).await;
    assert_eq!(stored, rows);
}

#[tokio::test]
async fn test_csv_export_quotes_and_formats() {
    let origin = Arc::new(MemoryTable::new(people_table()).with_rows(people_rows()));
    let artifact = Exporter::new(origin)
        .export(
            &ExportRequest::new(people_table()),
            &ExportOptions::default(),
        )
        .await
        .unwrap();

    let text = String::from_utf8(artifact.bytes).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    assert!(text.starts_with("id,name,note,born,balance,active,created_at\r\n"));
    assert!(text.contains(
        "1,\"Ada, Countess of Lovelace\",,1985-12-10,1200.50,true,2026-03-04 10:20:30\r\n"
    ));
    assert!(text.contains("2,\"Alan \"\"Prof\"\" Turing\",\"line one\nline two\",1912-06-23,-3.75,false,\r\n"));
    assert!(text.ends_with("3,Grace Hopper,navy,,,,1999-12-31 23:59:59\r\n"));
}
