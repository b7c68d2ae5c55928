//! CSV record reading and writing
//!
//! Quoting follows the usual convention: a field containing the delimiter, a
//! quote or a line break is wrapped in double quotes with embedded quotes
//! doubled. An unquoted empty field is NULL and `""` is the empty string.

use std::borrow::Cow;

use crate::error::ParseError;
use crate::parser::Delimiter;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const SAMPLE_LINES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CsvField {
    pub text: String,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CsvRecord {
    /// Line the record starts on, 1-based
    pub line: usize,
    pub fields: Vec<CsvField>,
}

impl CsvRecord {
    /// An empty line: a single unquoted empty field
    pub fn is_blank(&self) -> bool {
        matches!(self.fields.as_slice(), [only] if !only.quoted && only.text.is_empty())
    }
}

/// Split `text` into records. Empty lines come back as blank records; only
/// the caller knows whether they are NULL rows or padding.
pub(crate) fn read_records(text: &str, delimiter: char) -> Result<Vec<CsvRecord>, ParseError> {
    let mut records = Vec::new();
    let mut fields: Vec<CsvField> = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_line = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
                quote_line = line;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(CsvField {
                    text: std::mem::take(&mut field),
                    quoted,
                });
                quoted = false;
                records.push(CsvRecord {
                    line: record_line,
                    fields: std::mem::take(&mut fields),
                });
                line += 1;
                record_line = line;
            }
            c if c == delimiter => {
                fields.push(CsvField {
                    text: std::mem::take(&mut field),
                    quoted,
                });
                quoted = false;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || quoted || !fields.is_empty() {
        fields.push(CsvField { text: field, quoted });
        records.push(CsvRecord {
            line: record_line,
            fields,
        });
    }

    Ok(records)
}

/// Pick the delimiter that splits the first lines into the same, largest
/// number of fields. Ties go to comma, then semicolon, then tab.
pub(crate) fn detect_delimiter(text: &str) -> Delimiter {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();

    let mut best = Delimiter::Comma;
    let mut best_score = (false, 0usize);
    for candidate in Delimiter::all() {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| count_fields(line, candidate.as_char()))
            .collect();
        let max = counts.iter().copied().max().unwrap_or(1);
        let consistent = max > 1 && counts.iter().all(|&n| n == max);
        let score = (consistent, if max > 1 { max } else { 0 });
        if score > best_score {
            best = *candidate;
            best_score = score;
        }
    }
    best
}

/// Field count of one physical line, ignoring delimiters inside quotes
fn count_fields(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 1;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

pub(crate) fn strip_bom(raw: &[u8]) -> &[u8] {
    raw.strip_prefix(UTF8_BOM).unwrap_or(raw)
}

/// Accumulates CSV output with CRLF record separators
#[derive(Debug)]
pub(crate) struct CsvWriter {
    buf: Vec<u8>,
    delimiter: char,
}

impl CsvWriter {
    pub fn new(delimiter: char, bom: bool) -> Self {
        let mut buf = Vec::new();
        if bom {
            buf.extend_from_slice(UTF8_BOM);
        }
        Self { buf, delimiter }
    }

    /// Write one record; `None` is NULL and is written as an empty field
    pub fn write_record<'a, I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut delimiter = [0u8; 4];
        let delimiter = self.delimiter.encode_utf8(&mut delimiter).as_bytes().to_vec();
        for (idx, field) in fields.into_iter().enumerate() {
            if idx > 0 {
                self.buf.extend_from_slice(&delimiter);
            }
            if let Some(text) = field {
                self.buf
                    .extend_from_slice(qualify_value(text, self.delimiter).as_bytes());
            }
        }
        self.buf.extend_from_slice(b"\r\n");
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Quote a non-NULL value when needed. The empty string is always quoted so
/// it reads back as text rather than NULL.
fn qualify_value(value: &str, delimiter: char) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value.contains(|c| c == delimiter || c == '"' || c == '\r' || c == '\n');
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
