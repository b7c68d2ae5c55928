//! Built queries and the row source collaborator

use std::fmt;

use async_trait::async_trait;

use crate::{QueryResult, Result, SqlDialect, Value, WriteResult};

/// Query text with positional placeholders plus its aligned parameters.
///
/// The text never contains a user value. `Debug` prints the text and the
/// parameter count only, so a built query can be logged safely.
#[derive(Clone, PartialEq)]
pub struct BuiltQuery {
    sql: String,
    params: Vec<Value>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl fmt::Debug for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltQuery")
            .field("sql", &self.sql)
            .field("param_count", &self.params.len())
            .finish()
    }
}

/// Executes built queries against the remote table.
///
/// Implementations must report rejected rows as
/// [`RowportError::Constraint`](crate::RowportError::Constraint) or
/// [`RowportError::Query`](crate::RowportError::Query) and transport failures
/// as any other variant.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Dialect the built queries must be rendered in
    fn dialect(&self) -> SqlDialect;

    /// Execute a query that returns rows (SELECT)
    async fn execute(&self, query: &BuiltQuery) -> Result<QueryResult>;

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    async fn execute_write(&self, query: &BuiltQuery) -> Result<WriteResult>;
}
