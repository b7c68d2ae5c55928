//! Per-column conversion between wire, display and database values
//!
//! Wire booleans are exactly `1`/`0`/NULL. Display strings are what the grid
//! shows and what the CSV export writes, so a value exported and parsed back
//! comes out unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rowport_core::{ColumnDescriptor, DateOrder, DisplayType, Value};
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

const ISO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y"];
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const MONTH_NAME_FORMATS: &[&str] = &["%d %b %Y", "%b %d, %Y", "%b %d %Y", "%d-%b-%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Tri-state checkbox shown for boolean cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Checked,
    Unchecked,
    Indeterminate,
}

/// Non-fatal adjustment made while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatWarning {
    /// A decimal had more fractional digits than the column scale
    Rounded {
        original: String,
        rounded: String,
        scale: u32,
    },
}

impl std::fmt::Display for FormatWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatWarning::Rounded {
                original,
                rounded,
                scale,
            } => write!(
                f,
                "'{}' rounded to '{}' ({} decimal places)",
                original, rounded, scale
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFormatter {
    date_order: DateOrder,
}

impl TypeFormatter {
    pub fn new(date_order: DateOrder) -> Self {
        Self { date_order }
    }

    /// Checkbox state for a boolean cell
    pub fn check_state(&self, value: &Value) -> CheckState {
        match value {
            Value::Bool(true) => CheckState::Checked,
            Value::Bool(false) => CheckState::Unchecked,
            Value::Int64(0) => CheckState::Unchecked,
            Value::Int64(_) => CheckState::Checked,
            Value::String(s) => match parse_bool(s) {
                Some(true) => CheckState::Checked,
                Some(false) => CheckState::Unchecked,
                None => CheckState::Indeterminate,
            },
            _ => CheckState::Indeterminate,
        }
    }

    /// Render a value the way the grid and the CSV export show it.
    ///
    /// NULL renders as the empty string; callers that must tell NULL apart
    /// inspect the value itself.
    pub fn to_display(&self, value: &Value, column: &ColumnDescriptor) -> String {
        if value.is_null() {
            return String::new();
        }
        match column.display_type {
            DisplayType::Boolean => match self.check_state(value) {
                CheckState::Checked => "true".to_string(),
                CheckState::Unchecked => "false".to_string(),
                CheckState::Indeterminate => value.to_string(),
            },
            DisplayType::Decimal => match value {
                Value::Decimal(_) | Value::Float64(_) | Value::Int64(_) | Value::String(_) => {
                    normalize_decimal(&value.to_string(), column.scale, None)
                        .map(|(text, _)| text)
                        .unwrap_or_else(|_| value.to_string())
                }
                other => other.to_string(),
            },
            DisplayType::Date | DisplayType::Time | DisplayType::Timestamp => {
                match self.temporal(value, column.display_type) {
                    Some(parsed) => display_temporal(&parsed),
                    None => value.to_string(),
                }
            }
            DisplayType::Integer | DisplayType::Text => display_temporal(value),
        }
    }

    /// Parse user or file input into a typed value
    pub fn parse(&self, input: &str, column: &ColumnDescriptor) -> Result<Value, FormatError> {
        self.parse_checked(input, column).map(|(value, _)| value)
    }

    /// Like [`parse`](Self::parse), also reporting decimal rounding
    pub fn parse_checked(
        &self,
        input: &str,
        column: &ColumnDescriptor,
    ) -> Result<(Value, Option<FormatWarning>), FormatError> {
        self.parse_typed(input, column.display_type, column.precision, column.scale)
    }

    /// Whether `input` would parse as `display_type`
    pub fn parses_as(&self, input: &str, display_type: DisplayType) -> bool {
        self.parse_typed(input, display_type, None, None).is_ok()
    }

    /// Convert an already typed value, e.g. a spreadsheet cell, to the
    /// column's type. Strings go through [`parse_checked`](Self::parse_checked).
    pub fn coerce(
        &self,
        value: &Value,
        column: &ColumnDescriptor,
    ) -> Result<(Value, Option<FormatWarning>), FormatError> {
        let display_type = column.display_type;
        let mismatch = || FormatError::TypeMismatch {
            expected: display_type,
            found: value.type_name(),
        };

        match value {
            Value::Null if column.is_required() => Err(FormatError::Required),
            Value::Null => Ok((Value::Null, None)),
            Value::String(s) => self.parse_checked(s, column),
            Value::Decimal(s) => match display_type {
                DisplayType::Text => Ok((Value::String(s.clone()), None)),
                DisplayType::Integer | DisplayType::Decimal => self.parse_checked(s, column),
                _ => Err(mismatch()),
            },
            Value::Bool(b) => match display_type {
                DisplayType::Boolean => Ok((Value::Bool(*b), None)),
                DisplayType::Integer => Ok((Value::Int64(i64::from(*b)), None)),
                DisplayType::Text => Ok((Value::String(b.to_string()), None)),
                _ => Err(mismatch()),
            },
            Value::Int64(i) => match display_type {
                DisplayType::Boolean => match i {
                    0 => Ok((Value::Bool(false), None)),
                    1 => Ok((Value::Bool(true), None)),
                    _ => Err(mismatch()),
                },
                DisplayType::Integer => Ok((Value::Int64(*i), None)),
                DisplayType::Decimal => self.parse_checked(&i.to_string(), column),
                DisplayType::Text => Ok((Value::String(i.to_string()), None)),
                _ => Err(mismatch()),
            },
            Value::Float64(f) => match display_type {
                DisplayType::Boolean if *f == 0.0 => Ok((Value::Bool(false), None)),
                DisplayType::Boolean if *f == 1.0 => Ok((Value::Bool(true), None)),
                DisplayType::Integer
                    // i64::MAX as f64 rounds up to 2^63, which is out of range
                    if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
                {
                    Ok((Value::Int64(*f as i64), None))
                }
                DisplayType::Decimal => self.parse_checked(&f.to_string(), column),
                DisplayType::Text => Ok((Value::String(f.to_string()), None)),
                _ => Err(mismatch()),
            },
            Value::Date(d) => match display_type {
                DisplayType::Date => Ok((Value::Date(*d), None)),
                DisplayType::Timestamp => d
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| (Value::DateTime(dt), None))
                    .ok_or_else(mismatch),
                DisplayType::Text => Ok((Value::String(display_temporal(value)), None)),
                _ => Err(mismatch()),
            },
            Value::Time(t) => match display_type {
                DisplayType::Time => Ok((Value::Time(*t), None)),
                DisplayType::Text => Ok((Value::String(display_temporal(value)), None)),
                _ => Err(mismatch()),
            },
            Value::DateTime(dt) => match display_type {
                DisplayType::Timestamp => Ok((Value::DateTime(*dt), None)),
                DisplayType::Date if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 => {
                    Ok((Value::Date(dt.date()), None))
                }
                DisplayType::Time => Ok((Value::Time(dt.time()), None)),
                DisplayType::Text => Ok((Value::String(display_temporal(value)), None)),
                _ => Err(mismatch()),
            },
        }
    }

    /// Value to bind when writing to the column
    pub fn to_database(&self, value: &Value, column: &ColumnDescriptor) -> Result<Value, FormatError> {
        self.to_database_checked(value, column).map(|(value, _)| value)
    }

    /// Like [`to_database`](Self::to_database), also reporting decimal rounding
    pub fn to_database_checked(
        &self,
        value: &Value,
        column: &ColumnDescriptor,
    ) -> Result<(Value, Option<FormatWarning>), FormatError> {
        let (value, warning) = self.coerce(value, column)?;
        let wire = match value {
            Value::Bool(b) => Value::Int64(i64::from(b)),
            other => other,
        };
        Ok((wire, warning))
    }

    fn parse_typed(
        &self,
        input: &str,
        display_type: DisplayType,
        precision: Option<u32>,
        scale: Option<u32>,
    ) -> Result<(Value, Option<FormatWarning>), FormatError> {
        let invalid = || FormatError::Invalid {
            input: input.to_string(),
            expected: display_type,
        };
        let trimmed = input.trim();

        match display_type {
            DisplayType::Text => Ok((Value::String(input.to_string()), None)),
            DisplayType::Boolean => parse_bool(trimmed)
                .map(|b| (Value::Bool(b), None))
                .ok_or_else(invalid),
            DisplayType::Integer => parse_integer(trimmed)
                .map(|i| (Value::Int64(i), None))
                .ok_or_else(invalid),
            DisplayType::Decimal => {
                let (text, rounded) = normalize_decimal(trimmed, scale, precision)?;
                let warning = match (rounded, scale) {
                    (true, Some(scale)) => Some(FormatWarning::Rounded {
                        original: trimmed.to_string(),
                        rounded: text.clone(),
                        scale,
                    }),
                    _ => None,
                };
                Ok((Value::Decimal(text), warning))
            }
            DisplayType::Date => self
                .parse_date(trimmed)
                .map(|d| (Value::Date(d), None))
                .ok_or_else(invalid),
            DisplayType::Time => parse_time(trimmed)
                .map(|t| (Value::Time(t), None))
                .ok_or_else(invalid),
            DisplayType::Timestamp => self
                .parse_timestamp(trimmed)
                .map(|dt| (Value::DateTime(dt), None))
                .ok_or_else(invalid),
        }
    }

    /// Candidate date formats, ISO first, then the configured order
    fn date_formats(&self) -> Vec<&'static str> {
        let (first, second) = match self.date_order {
            DateOrder::MonthFirst => (MONTH_FIRST_FORMATS, DAY_FIRST_FORMATS),
            DateOrder::DayFirst => (DAY_FIRST_FORMATS, MONTH_FIRST_FORMATS),
        };
        ISO_DATE_FORMATS
            .iter()
            .chain(first)
            .chain(second)
            .chain(MONTH_NAME_FORMATS)
            .copied()
            .collect()
    }

    fn parse_date(&self, input: &str) -> Option<NaiveDate> {
        self.date_formats()
            .into_iter()
            .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
    }

    fn parse_timestamp(&self, input: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(dt.naive_utc());
        }
        for date_fmt in self.date_formats() {
            for separator in [" ", "T"] {
                for time_fmt in TIME_FORMATS {
                    let fmt = format!("{}{}{}", date_fmt, separator, time_fmt);
                    if let Ok(dt) = NaiveDateTime::parse_from_str(input, &fmt) {
                        return Some(dt);
                    }
                }
            }
        }
        self.parse_date(input).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Bring a temporal column's value to its typed form for display
    fn temporal(&self, value: &Value, display_type: DisplayType) -> Option<Value> {
        match (value, display_type) {
            (Value::Date(_), DisplayType::Date)
            | (Value::Time(_), DisplayType::Time)
            | (Value::DateTime(_), DisplayType::Timestamp) => Some(value.clone()),
            (Value::DateTime(dt), DisplayType::Date) => Some(Value::Date(dt.date())),
            (Value::String(s), _) => self
                .parse_typed(s, display_type, None, None)
                .ok()
                .map(|(v, _)| v),
            _ => None,
        }
    }
}

fn display_temporal(value: &Value) -> String {
    match value {
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S").to_string(),
        Value::DateTime(dt) if dt.nanosecond() == 0 => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        other => other.to_string(),
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "checked" | "true" | "t" | "yes" | "y" | "1" => Some(true),
        "unchecked" | "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Optional sign followed by ASCII digits only
fn parse_integer(input: &str) -> Option<i64> {
    let digits = input.strip_prefix(['+', '-']).unwrap_or(input);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse::<i64>().ok()
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(input, fmt).ok())
}

/// Validate a plain decimal literal and round it to `scale`, half away from
/// zero. Returns the canonical text and whether non-zero digits were dropped.
fn normalize_decimal(
    input: &str,
    scale: Option<u32>,
    precision: Option<u32>,
) -> Result<(String, bool), FormatError> {
    let invalid = || FormatError::Invalid {
        input: input.to_string(),
        expected: DisplayType::Decimal,
    };

    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part)
    {
        return Err(invalid());
    }

    let mut int_digits: Vec<char> = int_part.trim_start_matches('0').chars().collect();
    let mut frac_digits: Vec<char> = frac_part.chars().collect();
    let mut rounded = false;

    if let Some(scale) = scale {
        let scale = scale as usize;
        if frac_digits.len() > scale {
            let round_up = frac_digits[scale] >= '5';
            rounded = frac_digits[scale..].iter().any(|&c| c != '0');
            frac_digits.truncate(scale);
            if round_up {
                let mut digits: Vec<char> = int_digits.iter().chain(&frac_digits).copied().collect();
                let mut carry = true;
                for digit in digits.iter_mut().rev() {
                    if *digit == '9' {
                        *digit = '0';
                    } else {
                        *digit = char::from(*digit as u8 + 1);
                        carry = false;
                        break;
                    }
                }
                if carry {
                    digits.insert(0, '1');
                }
                let split = digits.len() - scale;
                frac_digits = digits.split_off(split);
                int_digits = digits;
            }
        } else {
            frac_digits.resize(scale, '0');
        }
    }

    let mut int_text: String = int_digits.into_iter().collect();
    let trimmed_len = int_text.trim_start_matches('0').len();
    int_text = int_text.split_off(int_text.len() - trimmed_len);
    if int_text.is_empty() {
        int_text.push('0');
    }

    if let Some(precision) = precision {
        let allowed = precision.saturating_sub(scale.unwrap_or(0));
        let digits = if int_text == "0" { 0 } else { int_text.len() };
        if digits > allowed as usize {
            return Err(FormatError::TooManyDigits {
                input: input.to_string(),
                digits,
                allowed,
            });
        }
    }

    let frac_text: String = frac_digits.into_iter().collect();
    let is_zero = int_text == "0" && frac_text.bytes().all(|b| b == b'0');
    let mut out = String::new();
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(&int_text);
    if !frac_text.is_empty() {
        out.push('.');
        out.push_str(&frac_text);
    }
    Ok((out, rounded))
}
