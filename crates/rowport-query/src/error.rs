use thiserror::Error;

pub type QueryBuildResult<T> = Result<T, QueryBuildError>;

/// Query construction errors.
///
/// All of them are raised before any SQL text is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryBuildError {
    #[error("Column '{column}' does not exist in table '{table}'")]
    InvalidColumn { table: String, column: String },

    #[error("Operator '{operator}' cannot be used here: {reason}")]
    InvalidOperator { operator: String, reason: String },

    #[error("Page {page} is out of range (1..={max_page})")]
    PageOutOfRange { page: u64, max_page: u64 },

    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error("No columns or rows given for insert")]
    EmptyInsert,

    #[error("Row {row} has {found} values, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("No columns given for update")]
    EmptyUpdate,

    #[error("A non-empty key is required to identify the row")]
    MissingKey,

    #[error("Statement needs {count} parameters, the {dialect} limit is {max}")]
    TooManyParameters {
        count: usize,
        max: usize,
        dialect: String,
    },
}

impl QueryBuildError {
    pub(crate) fn invalid_operator(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperator {
            operator: operator.into(),
            reason: reason.into(),
        }
    }
}
