//! Workbook reading (calamine) and writing (rust_xlsxwriter)

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, NaiveDateTime};
use rowport_core::{ColumnDescriptor, DisplayType, Value};
use rust_xlsxwriter::{Format, Worksheet};

use crate::error::{ExportError, ParseError};
use crate::formatter::{CheckState, TypeFormatter};
use crate::parser::SheetSelector;

/// Data rows a worksheet can hold below its header row
pub const MAX_DATA_ROWS: u64 = 1_048_575;

const MAX_SHEET_NAME: usize = 31;

/// Non-blank rows of one worksheet, each tagged with its 1-based row number
#[derive(Debug)]
pub(crate) struct SheetData {
    pub name: String,
    pub rows: Vec<(usize, Vec<Value>)>,
}

/// Sheet names in workbook order
pub fn sheet_names(raw: &[u8]) -> Result<Vec<String>, ParseError> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(raw.to_vec()))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    Ok(workbook.sheet_names())
}

pub(crate) fn read_sheet(
    raw: &[u8],
    selector: Option<&SheetSelector>,
) -> Result<SheetData, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(raw.to_vec()))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    let names = workbook.sheet_names();

    let name = match selector {
        Some(SheetSelector::Name(wanted)) => names
            .iter()
            .find(|n| *n == wanted)
            .or_else(|| names.iter().find(|n| n.eq_ignore_ascii_case(wanted)))
            .cloned()
            .ok_or_else(|| ParseError::SheetNotFound(wanted.clone()))?,
        Some(SheetSelector::Index(idx)) => names
            .get(*idx)
            .cloned()
            .ok_or_else(|| ParseError::SheetNotFound(format!("#{}", idx)))?,
        None => match names.as_slice() {
            [] => return Err(ParseError::Empty),
            [only] => only.clone(),
            _ => {
                return Err(ParseError::SheetSelectionRequired {
                    sheets: names.clone(),
                });
            }
        },
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let mut rows = Vec::new();
    for (idx, cells) in range.rows().enumerate() {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let row_number = start_row as usize + idx + 1;
        let values = cells
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                cell_value(cell).map_err(|message| ParseError::Cell {
                    sheet: name.clone(),
                    row: row_number,
                    column: start_col as usize + col + 1,
                    message,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((row_number, values));
    }

    tracing::debug!(sheet = %name, rows = rows.len(), "read worksheet");
    Ok(SheetData { name, rows })
}

/// Cells keep their type; strings stay strings
fn cell_value(cell: &Data) -> Result<Value, String> {
    Ok(match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if !dt.is_duration() => Value::DateTime(ndt),
            _ => Value::Float64(dt.as_f64()),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(Value::DateTime)
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Value::Date))
            .unwrap_or_else(|_| Value::String(s.clone())),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => return Err(format!("formula error {:?}", e)),
    })
}

/// Worksheet names may not contain `[]:*?/\` and are limited to 31 chars
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    if cleaned.is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Builds a single typed worksheet, one chunk of rows at a time
pub(crate) struct SpreadsheetWriter {
    worksheet: Worksheet,
    next_row: u32,
    header_format: Format,
    date_format: Format,
    time_format: Format,
    timestamp_format: Format,
    decimal_formats: Vec<Option<Format>>,
}

impl SpreadsheetWriter {
    pub fn new(sheet_name: &str, columns: &[&ColumnDescriptor]) -> Result<Self, ExportError> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(sanitize_sheet_name(sheet_name))?;

        let decimal_formats = columns
            .iter()
            .map(|c| match (c.display_type, c.scale) {
                (DisplayType::Decimal, Some(scale)) if scale > 0 => Some(
                    Format::new().set_num_format(format!("0.{}", "0".repeat(scale as usize))),
                ),
                _ => None,
            })
            .collect();

        Ok(Self {
            worksheet,
            next_row: 0,
            header_format: Format::new().set_bold(),
            date_format: Format::new().set_num_format("yyyy-mm-dd"),
            time_format: Format::new().set_num_format("hh:mm:ss"),
            timestamp_format: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            decimal_formats,
        })
    }

    pub fn write_header(&mut self, names: &[String]) -> Result<(), ExportError> {
        for (col, name) in names.iter().enumerate() {
            self.worksheet.write_string_with_format(
                self.next_row,
                column_number(col)?,
                name,
                &self.header_format,
            )?;
        }
        self.next_row += 1;
        Ok(())
    }

    pub fn write_row(
        &mut self,
        values: &[Value],
        columns: &[&ColumnDescriptor],
        formatter: &TypeFormatter,
    ) -> Result<(), ExportError> {
        let row = self.next_row;
        for (idx, (value, column)) in values.iter().zip(columns).enumerate() {
            if value.is_null() {
                continue;
            }
            let col = column_number(idx)?;
            let display = || formatter.to_display(value, column);

            match column.display_type {
                DisplayType::Boolean => match formatter.check_state(value) {
                    CheckState::Checked => {
                        self.worksheet.write_boolean(row, col, true)?;
                    }
                    CheckState::Unchecked => {
                        self.worksheet.write_boolean(row, col, false)?;
                    }
                    CheckState::Indeterminate => {
                        self.worksheet.write_string(row, col, display())?;
                    }
                },
                DisplayType::Integer => match value.as_i64() {
                    Some(i) => {
                        self.worksheet.write_number(row, col, i as f64)?;
                    }
                    None => {
                        self.worksheet.write_string(row, col, display())?;
                    }
                },
                DisplayType::Decimal => {
                    let text = display();
                    match (text.parse::<f64>(), &self.decimal_formats[idx]) {
                        (Ok(number), Some(format)) => {
                            self.worksheet
                                .write_number_with_format(row, col, number, format)?;
                        }
                        (Ok(number), None) => {
                            self.worksheet.write_number(row, col, number)?;
                        }
                        (Err(_), _) => {
                            self.worksheet.write_string(row, col, text)?;
                        }
                    }
                }
                DisplayType::Date | DisplayType::Time | DisplayType::Timestamp => {
                    match formatter.coerce(value, column).map(|(v, _)| v) {
                        Ok(Value::Date(d)) => {
                            self.worksheet
                                .write_datetime_with_format(row, col, &d, &self.date_format)?;
                        }
                        Ok(Value::Time(t)) => {
                            self.worksheet
                                .write_datetime_with_format(row, col, &t, &self.time_format)?;
                        }
                        Ok(Value::DateTime(dt)) => {
                            self.worksheet.write_datetime_with_format(
                                row,
                                col,
                                &dt,
                                &self.timestamp_format,
                            )?;
                        }
                        _ => {
                            self.worksheet.write_string(row, col, display())?;
                        }
                    }
                }
                DisplayType::Text => {
                    self.worksheet.write_string(row, col, display())?;
                }
            }
        }
        self.next_row += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.push_worksheet(self.worksheet);
        Ok(workbook.save_to_buffer()?)
    }
}

fn column_number(idx: usize) -> Result<u16, ExportError> {
    u16::try_from(idx).map_err(|_| ExportError::Spreadsheet(format!("too many columns ({})", idx + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sanitize_sheet_name("orders"), "orders");
        assert_eq!(sanitize_sheet_name("sales/2026:[q1]"), "sales2026q1");
        assert_eq!(sanitize_sheet_name("???"), "Sheet1");
        assert_eq!(
            sanitize_sheet_name("a_table_name_that_is_far_too_long_for_excel").chars().count(),
            31
        );
    }

    #[test]
    fn formula_errors_are_reported() {
        assert!(cell_value(&Data::Error(calamine::CellErrorType::Div0)).is_err());
        assert_eq!(cell_value(&Data::Empty).unwrap(), Value::Null);
        assert_eq!(cell_value(&Data::Int(3)).unwrap(), Value::Int64(3));
    }
}
