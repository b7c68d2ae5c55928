//! Rowport Interchange
//!
//! Moves rows between a remote table and flat files.
//!
//! # Architecture
//!
//! ```text
//! export:  RowSource → chunked SELECT → TypeFormatter → CSV / workbook bytes
//! import:  file bytes → parser → ColumnMapping → TypeFormatter → batched INSERT → RowSource
//! ```
//!
//! Both pipelines stream [`ExportProgress`] / [`ImportProgress`] events over an
//! unbounded channel and stop cooperatively on a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! # Example
//!
//! ```rust,ignore
//! let parsed = parse(&bytes, &ParseHints::default())?;
//! let mapping = ColumnMapping::by_name(&parsed.source_columns, &table);
//! let result = Importer::new(source)
//!     .import(&table, &parsed, &mapping, &ImportOptions::default())
//!     .await?;
//! println!("{} imported, {} failed", result.rows_imported, result.rows_failed);
//! ```

mod csv;
mod error;
mod export;
mod formatter;
mod import;
mod parser;
mod progress;
mod spreadsheet;

pub use error::{ExportError, FormatError, ImportError, MappingError, ParseError};
pub use export::{ExportArtifact, ExportOptions, ExportRequest, ExportScope, Exporter};
pub use formatter::{CheckState, FormatWarning, TypeFormatter};
pub use import::{
    ColumnMapping, ImportOptions, ImportResult, ImportRowError, Importer, MappingEntry, RowIssue,
    ValidationError, ValidationWarning,
};
pub use parser::{
    Delimiter, FileFormat, HeaderMode, ParseHints, ParsedImportData, SheetSelector, parse,
};
pub use progress::{ExportProgress, ImportProgress, ProgressSender};
pub use spreadsheet::{MAX_DATA_ROWS, sanitize_sheet_name, sheet_names};
