//! SQL dialect syntax rules
//!
//! Only the pieces the query builder cannot express portably live here:
//! identifier quoting, bind placeholders, pagination and the per-statement
//! bind parameter limit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RowportError;

/// Target database dialect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    Postgres,
    MySql,
    MsSql,
}

impl SqlDialect {
    /// Quote an identifier, doubling any embedded closing quote
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", identifier.replace('`', "``")),
            SqlDialect::MsSql => format!("[{}]", identifier.replace(']', "]]")),
            SqlDialect::Sqlite | SqlDialect::Postgres => {
                format!("\"{}\"", identifier.replace('"', "\"\""))
            }
        }
    }

    /// Build a possibly schema-qualified table reference
    pub fn qualified_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(s) => format!(
                "{}.{}",
                self.quote_identifier(s),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${}", index),
            SqlDialect::MsSql => format!("@P{}", index),
            SqlDialect::Sqlite | SqlDialect::MySql => "?".to_string(),
        }
    }

    /// Pagination clause using parameters `first_index` and `first_index + 1`.
    ///
    /// See [`binds_offset_first`](Self::binds_offset_first) for which value
    /// goes where.
    pub fn pagination_clause(&self, first_index: usize) -> String {
        let first = self.placeholder(first_index);
        let second = self.placeholder(first_index + 1);
        match self {
            SqlDialect::MsSql => format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", first, second),
            _ => format!("LIMIT {} OFFSET {}", first, second),
        }
    }

    /// Cast an expression to text so it can be matched with LIKE
    pub fn text_cast(&self, expr: &str) -> String {
        match self {
            SqlDialect::MySql => format!("CAST({} AS CHAR)", expr),
            SqlDialect::MsSql => format!("CAST({} AS NVARCHAR(MAX))", expr),
            SqlDialect::Sqlite | SqlDialect::Postgres => format!("CAST({} AS TEXT)", expr),
        }
    }

    /// Whether the offset is bound before the row count
    pub fn binds_offset_first(&self) -> bool {
        matches!(self, SqlDialect::MsSql)
    }

    /// Whether pagination is only valid after an ORDER BY
    pub fn requires_order_for_pagination(&self) -> bool {
        matches!(self, SqlDialect::MsSql)
    }

    /// Maximum bind parameters accepted in one statement
    pub fn max_parameters(&self) -> usize {
        match self {
            SqlDialect::Sqlite => 32_766,
            SqlDialect::Postgres | SqlDialect::MySql => 65_535,
            SqlDialect::MsSql => 2_100,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Postgres => "postgres",
            SqlDialect::MySql => "mysql",
            SqlDialect::MsSql => "mssql",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlDialect {
    type Err = RowportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(SqlDialect::Sqlite),
            "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "mssql" | "sqlserver" => Ok(SqlDialect::MsSql),
            other => Err(RowportError::NotSupported(format!(
                "unknown SQL dialect '{}'",
                other
            ))),
        }
    }
}
