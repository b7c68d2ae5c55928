//! Turn uploaded CSV or workbook bytes into [`ParsedImportData`]

use std::collections::HashSet;
use std::str::FromStr;

use rowport_core::{DisplayType, Value};
use serde::{Deserialize, Serialize};

use crate::csv::{CsvRecord, detect_delimiter, read_records, strip_bom};
use crate::error::ParseError;
use crate::formatter::TypeFormatter;
use crate::spreadsheet::read_sheet;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// File kinds the engine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Sniff the format from the leading bytes. Anything that is not a ZIP or
    /// OLE container is treated as CSV.
    pub fn detect(raw: &[u8]) -> Self {
        if raw.starts_with(ZIP_MAGIC) || raw.starts_with(OLE_MAGIC) {
            FileFormat::Spreadsheet
        } else {
            FileFormat::Csv
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Spreadsheet => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileFormat::Csv => "text/csv; charset=utf-8",
            FileFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "spreadsheet" | "xlsx" | "excel" => Ok(FileFormat::Spreadsheet),
            other => Err(format!("unknown file format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    /// Candidates in detection preference order
    pub fn all() -> &'static [Delimiter] {
        &[Delimiter::Comma, Delimiter::Semicolon, Delimiter::Tab]
    }

    pub fn as_char(self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Semicolon => ';',
            Delimiter::Tab => '\t',
        }
    }
}

impl FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comma" | "," => Ok(Delimiter::Comma),
            "semicolon" | ";" => Ok(Delimiter::Semicolon),
            "tab" | "\t" => Ok(Delimiter::Tab),
            other => Err(format!("unknown delimiter '{}'", other)),
        }
    }
}

/// How the first row of the file is treated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeaderMode {
    #[default]
    Present,
    Absent,
    /// Decide from the first row. Each entry is the type of the table column
    /// the file column is expected to land in.
    Infer(Vec<DisplayType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    Name(String),
    /// Zero-based position in the workbook
    Index(usize),
}

/// Caller knowledge that overrides detection
#[derive(Debug, Clone, Default)]
pub struct ParseHints {
    pub format: Option<FileFormat>,
    pub delimiter: Option<Delimiter>,
    pub header: HeaderMode,
    pub sheet: Option<SheetSelector>,
    pub formatter: TypeFormatter,
}

impl ParseHints {
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    pub fn with_sheet(mut self, sheet: SheetSelector) -> Self {
        self.sheet = Some(sheet);
        self
    }

    pub fn with_formatter(mut self, formatter: TypeFormatter) -> Self {
        self.formatter = formatter;
        self
    }
}

/// Column names and rows read from an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedImportData {
    pub source_columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub format: FileFormat,
    /// Delimiter used, for CSV input
    pub delimiter: Option<Delimiter>,
    /// Worksheet read, for spreadsheet input
    pub sheet: Option<String>,
}

impl ParsedImportData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First `rows` data rows
    pub fn preview(&self, rows: usize) -> &[Vec<Value>] {
        &self.rows[..rows.min(self.rows.len())]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.source_columns.iter().position(|c| c == name)
    }
}

/// Parse raw file content
pub fn parse(raw: &[u8], hints: &ParseHints) -> Result<ParsedImportData, ParseError> {
    let format = hints.format.unwrap_or_else(|| FileFormat::detect(raw));

    let (records, delimiter, sheet) = match format {
        FileFormat::Csv => {
            let text = std::str::from_utf8(strip_bom(raw))?;
            let delimiter = hints.delimiter.unwrap_or_else(|| detect_delimiter(text));
            let records = drop_blank_lines(read_records(text, delimiter.as_char())?)
                .into_iter()
                .map(csv_values)
                .collect::<Vec<_>>();
            (records, Some(delimiter), None)
        }
        FileFormat::Spreadsheet => {
            let data = read_sheet(raw, hints.sheet.as_ref())?;
            (data.rows, None, Some(data.name))
        }
    };

    let (first_line, first) = records.first().ok_or(ParseError::Empty)?;
    let has_header = match &hints.header {
        HeaderMode::Present => true,
        HeaderMode::Absent => false,
        HeaderMode::Infer(types) => looks_like_header(first, types, &hints.formatter),
    };
    tracing::debug!(?format, ?delimiter, has_header, first_line, "parsing import file");

    let (source_columns, data) = if has_header {
        (header_names(first), &records[1..])
    } else {
        let names = (1..=first.len()).map(|n| format!("column_{}", n)).collect();
        (names, &records[..])
    };

    let width = source_columns.len();
    let rows = data
        .iter()
        .map(|(line, values)| fit_width(values.clone(), width, *line))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedImportData {
        source_columns,
        rows,
        format,
        delimiter,
        sheet,
    })
}

/// Leading empty lines are always skipped. After that, an empty line is a
/// NULL row when the first record has one field and padding otherwise.
fn drop_blank_lines(records: Vec<CsvRecord>) -> Vec<CsvRecord> {
    let mut records = records.into_iter().skip_while(CsvRecord::is_blank).peekable();
    let single_column = records.peek().is_some_and(|first| first.fields.len() == 1);
    if single_column {
        records.collect()
    } else {
        records.filter(|r| !r.is_blank()).collect()
    }
}

fn csv_values(record: CsvRecord) -> (usize, Vec<Value>) {
    let values = record
        .fields
        .into_iter()
        .map(|f| {
            if f.text.is_empty() && !f.quoted {
                Value::Null
            } else {
                Value::String(f.text)
            }
        })
        .collect();
    (record.line, values)
}

/// Pad short rows with NULL. Extra trailing NULLs (a trailing delimiter) are
/// dropped; extra content is an error.
fn fit_width(mut values: Vec<Value>, width: usize, line: usize) -> Result<Vec<Value>, ParseError> {
    if values.len() > width {
        if values[width..].iter().all(Value::is_null) {
            values.truncate(width);
        } else {
            return Err(ParseError::TooManyFields {
                line,
                expected: width,
                found: values.len(),
            });
        }
    }
    values.resize(width, Value::Null);
    Ok(values)
}

/// Best effort: the first row is a header when none of its cells in
/// non-text columns parse as the column's type. With no typed columns to
/// judge by, a header is assumed.
fn looks_like_header(first: &[Value], types: &[DisplayType], formatter: &TypeFormatter) -> bool {
    for (value, display_type) in first.iter().zip(types) {
        if *display_type == DisplayType::Text {
            continue;
        }
        match value {
            Value::Null => {}
            Value::String(s) => {
                if formatter.parses_as(s, *display_type) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

/// Trimmed header names; blanks become `column_N` and case-insensitive
/// duplicates get `_2`, `_3`, ...
fn header_names(first: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            let raw = match value {
                Value::Null => String::new(),
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            let base = if raw.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                raw
            };
            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.to_lowercase()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}
