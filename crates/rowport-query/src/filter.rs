//! Filter criteria and their parameterized SQL fragments

use std::fmt;
use std::str::FromStr;

use rowport_core::{ColumnDescriptor, DisplayType, Value};
use serde::{Deserialize, Serialize};

use crate::builder::Params;
use crate::error::{QueryBuildError, QueryBuildResult};

/// Escape character used in every generated LIKE clause
pub const LIKE_ESCAPE: char = '!';

/// Filter operators for WHERE clause generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
    NotEquals,
    Gt,
    Lt,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    /// Name used by hosts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Equals => "equals",
            Self::NotEquals => "notEquals",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }

    /// Returns true if this operator requires a value input
    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }

    /// Operators that always compile to LIKE
    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    pub fn all() -> &'static [FilterOperator] {
        &[
            Self::Contains,
            Self::StartsWith,
            Self::EndsWith,
            Self::Equals,
            Self::NotEquals,
            Self::Gt,
            Self::Lt,
            Self::IsEmpty,
            Self::IsNotEmpty,
        ]
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryBuildError::invalid_operator(s, "unknown operator"))
    }
}

/// A single filter condition. A list of criteria is combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriterion {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default = "null_value")]
    pub value: Value,
}

fn null_value() -> Value {
    Value::Null
}

impl FilterCriterion {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Criterion for an operator that takes no value
    pub fn unary(column: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Value::Null,
        }
    }

    /// Check the operator against the column type and the supplied value
    pub(crate) fn validate(&self, column: &ColumnDescriptor) -> QueryBuildResult<()> {
        let op = self.operator;
        if op.requires_value() && self.value.is_null() {
            return Err(QueryBuildError::invalid_operator(
                op.name(),
                format!("a value is required for column '{}'", column.name),
            ));
        }
        if column.display_type == DisplayType::Boolean
            && (op.is_pattern() || matches!(op, FilterOperator::Gt | FilterOperator::Lt))
        {
            return Err(QueryBuildError::invalid_operator(
                op.name(),
                format!("column '{}' is boolean", column.name),
            ));
        }
        Ok(())
    }

    /// Render this criterion, binding its value through `params`.
    ///
    /// `column_sql` is the already quoted identifier.
    pub(crate) fn to_sql(
        &self,
        column_sql: &str,
        column: &ColumnDescriptor,
        params: &mut Params,
    ) -> String {
        let text_column = column.display_type == DisplayType::Text;
        let like_target = if text_column {
            column_sql.to_string()
        } else {
            params.dialect().text_cast(column_sql)
        };

        match self.operator {
            FilterOperator::Contains => {
                let pattern = format!("%{}%", translate_wildcards(&value_text(&self.value)));
                like(&like_target, false, pattern, params)
            }
            FilterOperator::StartsWith => {
                let pattern = format!("{}%", translate_wildcards(&value_text(&self.value)));
                like(&like_target, false, pattern, params)
            }
            FilterOperator::EndsWith => {
                let pattern = format!("%{}", translate_wildcards(&value_text(&self.value)));
                like(&like_target, false, pattern, params)
            }
            FilterOperator::Equals | FilterOperator::NotEquals => {
                let negated = self.operator == FilterOperator::NotEquals;
                match self.value.as_str() {
                    Some(text) if has_wildcards(text) => {
                        like(&like_target, negated, translate_wildcards(text), params)
                    }
                    _ => {
                        let placeholder = params.bind(self.value.clone());
                        let op = if negated { "<>" } else { "=" };
                        format!("{} {} {}", column_sql, op, placeholder)
                    }
                }
            }
            FilterOperator::Gt => format!("{} > {}", column_sql, params.bind(self.value.clone())),
            FilterOperator::Lt => format!("{} < {}", column_sql, params.bind(self.value.clone())),
            FilterOperator::IsEmpty => {
                if text_column {
                    format!("({0} IS NULL OR {0} = '')", column_sql)
                } else {
                    format!("{} IS NULL", column_sql)
                }
            }
            FilterOperator::IsNotEmpty => {
                if text_column {
                    format!("({0} IS NOT NULL AND {0} <> '')", column_sql)
                } else {
                    format!("{} IS NOT NULL", column_sql)
                }
            }
        }
    }
}

fn like(target: &str, negated: bool, pattern: String, params: &mut Params) -> String {
    let placeholder = params.bind(Value::String(pattern));
    format!(
        "{} {}LIKE {} ESCAPE '{}'",
        target,
        if negated { "NOT " } else { "" },
        placeholder,
        LIKE_ESCAPE
    )
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether the user typed a `*` or `?` wildcard
pub fn has_wildcards(input: &str) -> bool {
    input.contains(['*', '?'])
}

/// Turn user input into a LIKE pattern body.
///
/// Literal `%`, `_` and the escape character are escaped first, then `*`
/// becomes `%` and `?` becomes `_`.
pub fn translate_wildcards(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | LIKE_ESCAPE => {
                out.push(LIKE_ESCAPE);
                out.push(ch);
            }
            '*' => out.push('%'),
            '?' => out.push('_'),
            _ => out.push(ch),
        }
    }
    out
}
