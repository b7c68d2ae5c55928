//! Rowport Query
//!
//! Turns structural filter, sort and page descriptors into parameterized SQL.
//! Nothing here performs I/O.
//!
//! # Example
//!
//! ```
//! use rowport_core::{ColumnDescriptor, SqlDialect, TableSchema};
//! use rowport_query::{FilterCriterion, FilterOperator, QueryBuilder};
//!
//! let table = TableSchema::new(
//!     "people",
//!     vec![
//!         ColumnDescriptor::new("id", "integer").primary_key(),
//!         ColumnDescriptor::new("name", "text"),
//!     ],
//! );
//! let filters = vec![FilterCriterion::new("name", FilterOperator::Equals, "John*")];
//! let query = QueryBuilder::new(SqlDialect::Postgres)
//!     .build(&table, &[], &filters, None, None)
//!     .unwrap();
//! assert_eq!(
//!     query.sql(),
//!     "SELECT \"id\", \"name\" FROM \"people\" WHERE \"name\" LIKE $1 ESCAPE '!'"
//! );
//! ```

mod builder;
mod error;
mod filter;
mod page;
mod sort;

pub use builder::QueryBuilder;
pub use error::{QueryBuildError, QueryBuildResult};
pub use filter::{FilterCriterion, FilterOperator, LIKE_ESCAPE, has_wildcards, translate_wildcards};
pub use page::{PageRequest, Pagination};
pub use sort::{SortDirection, SortSpec, SortState};
