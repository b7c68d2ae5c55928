//! Error types for the formatter, parser and pipelines

use rowport_core::{DisplayType, RowportError};
use rowport_query::QueryBuildError;
use thiserror::Error;

/// A value could not be converted to a column's type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("'{input}' is not a valid {expected}")]
    Invalid { input: String, expected: DisplayType },

    #[error("'{input}' has {digits} integer digits, at most {allowed} allowed")]
    TooManyDigits {
        input: String,
        digits: usize,
        allowed: u32,
    },

    #[error("a value is required")]
    Required,

    #[error("cannot store a {found} value in a {expected} column")]
    TypeMismatch {
        expected: DisplayType,
        found: &'static str,
    },
}

/// Malformed input file
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("File is empty")]
    Empty,

    #[error("File is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Unterminated quoted field starting at line {line}")]
    UnterminatedQuote { line: usize },

    #[error("Line {line} has {found} fields, expected {expected}")]
    TooManyFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Workbook has several sheets, pick one of: {}", sheets.join(", "))]
    SheetSelectionRequired { sheets: Vec<String> },

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Sheet '{sheet}' row {row} column {column}: {message}")]
    Cell {
        sheet: String,
        row: usize,
        column: usize,
        message: String,
    },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
}

/// The column mapping cannot be used; raised before any row is written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Source column '{0}' is not in the file")]
    UnknownSourceColumn(String),

    #[error("Target column '{0}' does not exist in the table")]
    UnknownTargetColumn(String),

    #[error("Target column '{target}' is mapped from both '{first}' and '{second}'")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    #[error("Required columns are not mapped: {}", .0.join(", "))]
    RequiredColumnsUnmapped(Vec<String>),

    #[error("No source column is mapped to the table")]
    NothingMapped,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Query error: {0}")]
    Query(#[from] QueryBuildError),

    #[error("Row source error: {0}")]
    Source(#[from] RowportError),

    #[error("COUNT(*) query returned no result")]
    MissingCount,

    #[error("Table changed during export: expected {expected} rows, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("{rows} rows exceed the spreadsheet limit of {max}")]
    TooManyRows { rows: u64, max: u64 },

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Export cancelled")]
    Cancelled,
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Spreadsheet(e.to_string())
    }
}

/// Import failures that reject the whole call.
///
/// Per-row failures are reported in
/// [`ImportResult`](crate::ImportResult) instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Query error: {0}")]
    Query(#[from] QueryBuildError),
}
