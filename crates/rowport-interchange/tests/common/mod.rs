//! Common test utilities and mocks

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rowport_core::{
    BuiltQuery, ColumnDescriptor, QueryResult, Result, Row, RowSource, RowportError, SqlDialect,
    TableSchema, Value, WriteResult,
};
use tokio_util::sync::CancellationToken;

/// In-memory table standing in for a remote database.
///
/// Understands exactly the statements the pipelines emit: `SELECT COUNT(*)`,
/// paged `SELECT ... LIMIT ? OFFSET ?` and multi-row `INSERT`. Any INSERT
/// containing an `email` without an `@` is rejected as a whole, the way a
/// CHECK constraint would.
pub struct MemoryTable {
    pub schema: TableSchema,
    pub dialect: SqlDialect,
    pub rows: Arc<Mutex<Vec<Vec<Value>>>>,
    /// Log of all SQL executed, for assertion in tests
    pub query_log: Arc<Mutex<Vec<String>>>,
    pub write_count: Arc<Mutex<usize>>,
    /// Reported by COUNT(*) instead of the real row count
    pub count_override: Option<i64>,
    /// Writes after this many succeed time out
    pub fail_writes_after: Option<usize>,
    /// Cancel the token when the n-th call (reads and writes) arrives
    pub cancel_on_call: Option<(usize, CancellationToken)>,
    calls: Arc<Mutex<usize>>,
}

impl MemoryTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            dialect: SqlDialect::Sqlite,
            rows: Arc::new(Mutex::new(Vec::new())),
            query_log: Arc::new(Mutex::new(Vec::new())),
            write_count: Arc::new(Mutex::new(0)),
            count_override: None,
            fail_writes_after: None,
            cancel_on_call: None,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_rows(self, rows: Vec<Vec<Value>>) -> Self {
        *self.rows.lock() = rows;
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count_override = Some(count);
        self
    }

    pub fn failing_writes_after(mut self, writes: usize) -> Self {
        self.fail_writes_after = Some(writes);
        self
    }

    pub fn cancelling_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }

    pub fn stored(&self) -> Vec<Vec<Value>> {
        self.rows.lock().clone()
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn selects(&self) -> usize {
        self.query_log()
            .iter()
            .filter(|sql| sql.starts_with("SELECT") && !sql.contains("COUNT(*)"))
            .count()
    }

    pub fn counts(&self) -> usize {
        self.query_log()
            .iter()
            .filter(|sql| sql.contains("COUNT(*)"))
            .count()
    }

    pub fn write_count(&self) -> usize {
        *self.write_count.lock()
    }

    fn record(&self, sql: &str) {
        self.query_log.lock().push(sql.to_string());
        let mut calls = self.calls.lock();
        *calls += 1;
        if let Some((at, token)) = &self.cancel_on_call {
            if *calls == *at {
                token.cancel();
            }
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.columns.iter().position(|c| c.name == name)
    }
}

/// Column names from a `(a, b)` or `SELECT a, b FROM` list
fn identifiers(list: &str) -> Vec<String> {
    list.split(", ")
        .map(|c| c.trim_matches(|ch| ch == '"' || ch == '[' || ch == ']' || ch == '`').to_string())
        .collect()
}

#[async_trait]
impl RowSource for MemoryTable {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn execute(&self, query: &BuiltQuery) -> Result<QueryResult> {
        let sql = query.sql();
        self.record(sql);

        let rows = self.rows.lock();
        if sql.starts_with("SELECT COUNT(*)") {
            let count = self.count_override.unwrap_or(rows.len() as i64);
            return Ok(QueryResult {
                columns: vec![ColumnDescriptor::new("count", "bigint")],
                rows: vec![Row::new(vec!["count".into()], vec![Value::Int64(count)])],
            });
        }

        let select_list = sql
            .strip_prefix("SELECT ")
            .and_then(|rest| rest.split(" FROM ").next())
            .ok_or_else(|| RowportError::Query(format!("unsupported statement: {}", sql)))?;
        let names = identifiers(select_list);
        let indexes: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n).ok_or_else(|| RowportError::Query(format!("no column {}", n))))
            .collect::<Result<_>>()?;

        let params = query.params();
        let (limit, offset) = match params {
            [.., limit, offset] => (
                limit.as_i64().unwrap_or(i64::MAX) as usize,
                offset.as_i64().unwrap_or(0) as usize,
            ),
            _ => (usize::MAX, 0),
        };

        let result_rows = rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| Row::new(names.clone(), indexes.iter().map(|&i| row[i].clone()).collect()))
            .collect();
        Ok(QueryResult {
            columns: indexes.iter().map(|&i| self.schema.columns[i].clone()).collect(),
            rows: result_rows,
        })
    }

    async fn execute_write(&self, query: &BuiltQuery) -> Result<WriteResult> {
        let sql = query.sql();
        self.record(sql);

        {
            let writes = *self.write_count.lock();
            if let Some(limit) = self.fail_writes_after {
                if writes >= limit {
                    return Err(RowportError::Timeout("write timed out after 30s".into()));
                }
            }
        }

        let list = sql
            .split_once(" (")
            .and_then(|(_, rest)| rest.split_once(") VALUES"))
            .map(|(list, _)| list)
            .ok_or_else(|| RowportError::Query(format!("unsupported statement: {}", sql)))?;
        let names = identifiers(list);
        let indexes: Vec<usize> = names
            .iter()
            .map(|n| self.column_index(n).ok_or_else(|| RowportError::Query(format!("no column {}", n))))
            .collect::<Result<_>>()?;
        let email = self.column_index("email");

        let mut incoming = Vec::new();
        for chunk in query.params().chunks(names.len()) {
            let mut row = vec![Value::Null; self.schema.columns.len()];
            for (value, &idx) in chunk.iter().zip(&indexes) {
                row[idx] = value.clone();
            }
            if let Some(email) = email {
                if matches!(&row[email], Value::String(s) if !s.contains('@')) {
                    return Err(RowportError::Constraint {
                        message: "CHECK constraint failed: email".into(),
                        column: Some("email".into()),
                    });
                }
            }
            incoming.push(row);
        }

        *self.write_count.lock() += 1;
        let affected = incoming.len() as u64;
        self.rows.lock().extend(incoming);
        Ok(WriteResult {
            affected_rows: affected,
        })
    }
}

/// Row source that only counts calls
#[derive(Default)]
pub struct NoopSource {
    pub calls: Arc<Mutex<usize>>,
}

impl NoopSource {
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl RowSource for NoopSource {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn execute(&self, _query: &BuiltQuery) -> Result<QueryResult> {
        *self.calls.lock() += 1;
        Ok(QueryResult::empty())
    }

    async fn execute_write(&self, _query: &BuiltQuery) -> Result<WriteResult> {
        *self.calls.lock() += 1;
        Ok(WriteResult::default())
    }
}

pub fn users_table() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnDescriptor::new("id", "integer").primary_key(),
            ColumnDescriptor::new("name", "varchar(100)").not_null(),
            ColumnDescriptor::new("email", "text"),
            ColumnDescriptor::new("age", "int4"),
        ],
    )
}

/// `count` users with ids starting at 1
pub fn user_rows(count: usize) -> Vec<Vec<Value>> {
    (1..=count)
        .map(|i| {
            vec![
                Value::Int64(i as i64),
                Value::String(format!("user {}", i)),
                Value::String(format!("user{}@example.com", i)),
                Value::Int64(20 + (i % 50) as i64),
            ]
        })
        .collect()
}

/// One nullable text column and no primary key
pub fn tags_table() -> TableSchema {
    TableSchema::new("tags", vec![ColumnDescriptor::new("tag", "text")])
}

pub fn tag_rows(count: usize) -> Vec<Vec<Value>> {
    (1..=count).map(|i| vec![Value::String(format!("tag{}", i))]).collect()
}

/// A table exercising every display type
pub fn people_table() -> TableSchema {
    TableSchema::new(
        "people",
        vec![
            ColumnDescriptor::new("id", "integer").primary_key(),
            ColumnDescriptor::new("name", "text").not_null(),
            ColumnDescriptor::new("note", "text"),
            ColumnDescriptor::new("born", "date"),
            ColumnDescriptor::new("balance", "numeric(10,2)").with_precision(10, 2),
            ColumnDescriptor::new("active", "boolean"),
            ColumnDescriptor::new("created_at", "timestamp"),
        ],
    )
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn timestamp(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, s).unwrap()
}

/// Rows in wire form, as a database would hand them back
pub fn people_rows() -> Vec<Vec<Value>> {
    vec![
        vec![
            Value::Int64(1),
            Value::from("Ada, Countess of Lovelace"),
            Value::Null,
            Value::Date(date(1985, 12, 10)),
            Value::Decimal("1200.50".into()),
            Value::Int64(1),
            Value::DateTime(timestamp(2026, 3, 4, 10, 20, 30)),
        ],
        vec![
            Value::Int64(2),
            Value::from("Alan \"Prof\" Turing"),
            Value::from("line one\nline two"),
            Value::Date(date(1912, 6, 23)),
            Value::Decimal("-3.75".into()),
            Value::Int64(0),
            Value::Null,
        ],
        vec![
            Value::Int64(3),
            Value::from("Grace Hopper"),
            Value::from("navy"),
            Value::Null,
            Value::Null,
            Value::Null,
            Value::DateTime(timestamp(1999, 12, 31, 23, 59, 59)),
        ],
    ]
}
