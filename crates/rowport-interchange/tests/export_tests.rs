//! Export pipeline tests against an in-memory row source

mod common;

use std::sync::Arc;

use common::{MemoryTable, tag_rows, tags_table, user_rows, users_table};
use pretty_assertions::assert_eq;
use rowport_core::{DisplayType, Value};
use rowport_interchange::{
    ExportError, ExportOptions, ExportProgress, ExportRequest, ExportScope, Exporter, FileFormat,
    MAX_DATA_ROWS, ParseHints, TypeFormatter, parse,
};
use rowport_query::{FilterCriterion, FilterOperator, PageRequest, SortSpec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn drain(rx: &mut mpsc::UnboundedReceiver<ExportProgress>) -> Vec<ExportProgress> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn csv_lines(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    text.split("\r\n")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_export_streams_in_chunks_with_progress() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(2500)));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let options = ExportOptions::default()
        .with_chunk_size(1000)
        .with_progress(tx);

    let artifact = Exporter::new(source.clone())
        .export(&ExportRequest::new(users_table()), &options)
        .await
        .unwrap();

    let percents: Vec<f64> = drain(&mut rx).iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![40.0, 80.0, 100.0]);

    assert_eq!(source.counts(), 1);
    assert_eq!(source.selects(), 3);
    assert_eq!(artifact.rows_exported, 2500);
    assert_eq!(artifact.file_name, "users.csv");
    assert!(artifact.bytes.starts_with(b"\xEF\xBB\xBF"));

    let lines = csv_lines(&artifact.bytes);
    assert_eq!(lines.len(), 2501);
    assert_eq!(lines[0], "id,name,email,age");
    assert_eq!(lines[1], "1,user 1,user1@example.com,21");
    assert_eq!(lines[2500], "2500,user 2500,user2500@example.com,20");
}

#[tokio::test]
async fn test_export_orders_by_primary_key_without_sort() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(10)));
    Exporter::new(source.clone())
        .export(&ExportRequest::new(users_table()), &ExportOptions::default())
        .await
        .unwrap();

    let select = source
        .query_log()
        .into_iter()
        .find(|sql| !sql.contains("COUNT(*)"))
        .unwrap();
    assert!(select.contains("ORDER BY \"id\" ASC"), "{}", select);
    assert!(select.ends_with("LIMIT ? OFFSET ?"));
}

#[tokio::test]
async fn test_export_without_key_orders_by_every_column() {
    let source = Arc::new(MemoryTable::new(tags_table()).with_rows(tag_rows(2500)));
    let artifact = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(tags_table()),
            &ExportOptions::default().with_chunk_size(1000),
        )
        .await
        .unwrap();

    assert_eq!(artifact.rows_exported, 2500);
    let selects: Vec<String> = source
        .query_log()
        .into_iter()
        .filter(|sql| !sql.contains("COUNT(*)"))
        .collect();
    assert_eq!(selects.len(), 3);
    for sql in selects {
        assert_eq!(sql, "SELECT \"tag\" FROM \"tags\" ORDER BY \"tag\" ASC LIMIT ? OFFSET ?");
    }
}

#[tokio::test]
async fn test_export_user_sort_is_tie_broken_by_key() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(10)));
    let request = ExportRequest::new(users_table()).with_sort(SortSpec::desc("age"));
    Exporter::new(source.clone())
        .export(&request, &ExportOptions::default())
        .await
        .unwrap();

    let select = source
        .query_log()
        .into_iter()
        .find(|sql| !sql.contains("COUNT(*)"))
        .unwrap();
    assert!(select.contains("ORDER BY \"age\" DESC, \"id\" ASC"), "{}", select);
}

#[tokio::test]
async fn test_export_page_scope_fetches_one_page() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(2500)));
    let request = ExportRequest::new(users_table())
        .with_sort(SortSpec::asc("id"))
        .with_page(PageRequest::new(2, 50).unwrap());

    let artifact = Exporter::new(source.clone())
        .export(&request, &ExportOptions::default().with_scope(ExportScope::Page))
        .await
        .unwrap();

    assert_eq!(source.selects(), 1);
    assert_eq!(artifact.rows_exported, 50);
    let lines = csv_lines(&artifact.bytes);
    assert_eq!(lines.len(), 51);
    assert!(lines[1].starts_with("51,"));
}

#[tokio::test]
async fn test_export_filtered_scope_keeps_filters() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(5)));
    let request = ExportRequest::new(users_table())
        .with_filters(vec![FilterCriterion::new("name", FilterOperator::StartsWith, "user")]);

    Exporter::new(source.clone())
        .export(&request, &ExportOptions::default().with_scope(ExportScope::Filtered))
        .await
        .unwrap();
    Exporter::new(source.clone())
        .export(&request, &ExportOptions::default().with_scope(ExportScope::All))
        .await
        .unwrap();

    let log = source.query_log();
    assert!(log[0].contains("WHERE \"name\" LIKE ?"));
    assert!(log.iter().skip(2).all(|sql| !sql.contains("WHERE")));
}

#[tokio::test]
async fn test_export_selected_columns_only() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(2)));
    let request =
        ExportRequest::new(users_table()).with_columns(vec!["email".into(), "id".into()]);

    let artifact = Exporter::new(source)
        .export(&request, &ExportOptions::default())
        .await
        .unwrap();

    assert_eq!(
        csv_lines(&artifact.bytes),
        vec!["email,id", "user1@example.com,1", "user2@example.com,2"]
    );
}

#[tokio::test]
async fn test_export_empty_table_reports_completion() {
    let source = Arc::new(MemoryTable::new(users_table()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let artifact = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default().with_progress(tx),
        )
        .await
        .unwrap();

    assert_eq!(artifact.rows_exported, 0);
    assert_eq!(csv_lines(&artifact.bytes), vec!["id,name,email,age"]);
    assert_eq!(source.selects(), 0);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].percent, 100.0);
}

#[tokio::test]
async fn test_export_cancelled_before_start() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(10)));
    let token = CancellationToken::new();
    token.cancel();

    let err = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default().with_cancellation(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    assert!(source.query_log().is_empty());
}

#[tokio::test]
async fn test_export_discards_chunk_in_flight_when_cancelled() {
    let token = CancellationToken::new();
    // call 1 is the count, call 3 the second chunk
    let source = Arc::new(
        MemoryTable::new(users_table())
            .with_rows(user_rows(2500))
            .cancelling_on_call(3, token.clone()),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    let err = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default()
                .with_chunk_size(1000)
                .with_progress(tx)
                .with_cancellation(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Cancelled));
    assert_eq!(source.selects(), 2);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rows_processed, 1000);
}

#[tokio::test]
async fn test_export_short_chunk_is_reported_as_truncated() {
    let source = Arc::new(
        MemoryTable::new(users_table())
            .with_rows(user_rows(1500))
            .with_count(3000),
    );

    let err = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default().with_chunk_size(1000),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExportError::Truncated {
            expected: 3000,
            received: 1500
        }
    ));
    assert_eq!(source.selects(), 2);
}

#[tokio::test]
async fn test_export_unknown_column_fails_before_io() {
    let source = Arc::new(MemoryTable::new(users_table()));
    let request = ExportRequest::new(users_table()).with_columns(vec!["password".into()]);

    let err = Exporter::new(source.clone())
        .export(&request, &ExportOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::Query(_)));
    assert!(source.query_log().is_empty());
}

#[tokio::test]
async fn test_export_spreadsheet_has_typed_cells() {
    let source = Arc::new(MemoryTable::new(users_table()).with_rows(user_rows(3)));

    let artifact = Exporter::new(source)
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default().with_format(FileFormat::Spreadsheet),
        )
        .await
        .unwrap();

    assert_eq!(artifact.file_name, "users.xlsx");
    assert_eq!(FileFormat::detect(&artifact.bytes), FileFormat::Spreadsheet);

    let parsed = parse(&artifact.bytes, &ParseHints::default()).unwrap();
    assert_eq!(parsed.sheet.as_deref(), Some("users"));
    assert_eq!(parsed.source_columns, vec!["id", "name", "email", "age"]);
    assert_eq!(parsed.row_count(), 3);

    let id = &parsed.rows[0][0];
    assert!(!matches!(id, Value::String(_)), "numbers stay numeric: {:?}", id);
    let formatter = TypeFormatter::default();
    let id_column = users_table().columns[0].clone();
    assert_eq!(id_column.display_type, DisplayType::Integer);
    assert_eq!(formatter.coerce(id, &id_column).unwrap().0, Value::Int64(1));
}

#[tokio::test]
async fn test_export_spreadsheet_row_limit() {
    let source = Arc::new(
        MemoryTable::new(users_table()).with_count(MAX_DATA_ROWS as i64 + 1),
    );

    let err = Exporter::new(source.clone())
        .export(
            &ExportRequest::new(users_table()),
            &ExportOptions::default().with_format(FileFormat::Spreadsheet),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::TooManyRows { .. }));
    assert_eq!(source.selects(), 0);
}
