//! Rowport Core - shared abstractions for the bulk data exchange engine
//!
//! This crate provides the fundamental types and traits that the query
//! builder and the import/export pipelines depend on. It defines:
//!
//! - `RowSource` - Trait for the collaborator that executes built queries
//! - `SchemaProvider` - Trait for the authoritative per-table column metadata
//! - `SqlDialect` - Identifier quoting, placeholders and pagination syntax
//! - Common types like `Value`, `Row`, `ColumnDescriptor`, `BuiltQuery`, etc.

mod dialect;
mod error;
mod schema;
pub mod settings;
mod source;
mod types;

pub use dialect::*;
pub use error::*;
pub use schema::*;
pub use settings::{DateOrder, ExportSettings, FormatSettings, ImportSettings, OnError, RowportSettings};
pub use source::*;
pub use types::*;
