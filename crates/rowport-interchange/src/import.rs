//! Validated, batched import of parsed rows into a table

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use rowport_core::{
    ColumnDescriptor, ImportSettings, OnError, RowSource, RowportError, TableSchema, Value,
};
use rowport_query::QueryBuilder;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{FormatError, ImportError, MappingError};
use crate::formatter::{FormatWarning, TypeFormatter};
use crate::parser::ParsedImportData;
use crate::progress::{self, ImportProgress, ProgressSender};

/// One source column and where it goes; `None` skips it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// Ordered source → target assignments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    entries: Vec<MappingEntry>,
}

/// A mapped column after validation
#[derive(Debug, Clone, Copy)]
pub(crate) struct MappedColumn<'a> {
    pub source_index: usize,
    pub column: &'a ColumnDescriptor,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.push(MappingEntry {
            source: source.into(),
            target: Some(target.into()),
        });
        self
    }

    pub fn skip(mut self, source: impl Into<String>) -> Self {
        self.entries.push(MappingEntry {
            source: source.into(),
            target: None,
        });
        self
    }

    /// Map every source column to the table column with the same name,
    /// ignoring case; the rest are skipped.
    pub fn by_name(source_columns: &[String], table: &TableSchema) -> Self {
        let entries = source_columns
            .iter()
            .map(|source| MappingEntry {
                source: source.clone(),
                target: table
                    .columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(source))
                    .map(|c| c.name.clone()),
            })
            .collect();
        Self { entries }
    }

    /// Map each source column to a target of the same name
    pub fn identity(source_columns: &[String]) -> Self {
        let entries = source_columns
            .iter()
            .map(|source| MappingEntry {
                source: source.clone(),
                target: Some(source.clone()),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Check the mapping against the file and the table without importing
    pub fn validate(&self, source_columns: &[String], table: &TableSchema) -> Result<(), MappingError> {
        self.resolve(source_columns, table).map(|_| ())
    }

    pub(crate) fn resolve<'a>(
        &self,
        source_columns: &[String],
        table: &'a TableSchema,
    ) -> Result<Vec<MappedColumn<'a>>, MappingError> {
        let mut mapped = Vec::new();
        let mut sources_by_target: HashMap<&str, &str> = HashMap::new();

        for entry in &self.entries {
            let source_index = source_columns
                .iter()
                .position(|c| *c == entry.source)
                .ok_or_else(|| MappingError::UnknownSourceColumn(entry.source.clone()))?;
            let Some(target) = &entry.target else {
                continue;
            };
            let column = table
                .column(target)
                .ok_or_else(|| MappingError::UnknownTargetColumn(target.clone()))?;
            if let Some(first) = sources_by_target.insert(&column.name, &entry.source) {
                return Err(MappingError::DuplicateTarget {
                    target: column.name.clone(),
                    first: first.to_string(),
                    second: entry.source.clone(),
                });
            }
            mapped.push(MappedColumn {
                source_index,
                column,
            });
        }

        let unmapped: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.is_required() && !sources_by_target.contains_key(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        if !unmapped.is_empty() {
            return Err(MappingError::RequiredColumnsUnmapped(unmapped));
        }
        if mapped.is_empty() {
            return Err(MappingError::NothingMapped);
        }
        Ok(mapped)
    }
}

/// A problem with one source row.
///
/// `row_number` is the 1-based position among data rows; `source_data`
/// holds the row as it was read from the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row_number: usize,
    pub source_data: IndexMap<String, Value>,
    pub message: String,
    pub column: Option<String>,
}

/// A row the write phase could not store
pub type ImportRowError = RowIssue;
/// A row that failed local type checking
pub type ValidationError = RowIssue;
/// A row that was stored after a lossless-enough adjustment
pub type ValidationWarning = RowIssue;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub success: bool,
    pub rows_imported: u64,
    pub rows_failed: u64,
    pub errors: Vec<ImportRowError>,
    pub validation_errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub cancelled: bool,
}

impl ImportResult {
    fn finish(mut self) -> Self {
        self.success =
            self.errors.is_empty() && self.validation_errors.is_empty() && !self.cancelled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub validate_first: bool,
    pub on_error: OnError,
    pub batch_size: usize,
    pub progress: Option<ProgressSender<ImportProgress>>,
    pub cancel: CancellationToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::from_settings(&ImportSettings::default())
    }
}

impl ImportOptions {
    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self {
            validate_first: settings.validate_first,
            on_error: settings.on_error,
            batch_size: settings.batch_size,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn validate_first(mut self, validate_first: bool) -> Self {
        self.validate_first = validate_first;
        self
    }

    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress(mut self, sender: ProgressSender<ImportProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Continue,
    Stop,
}

/// A converted row ready to bind, tagged with its row number
type PendingRow = (usize, Vec<Value>);

/// Writes parsed rows into a table through a [`RowSource`]
pub struct Importer {
    source: Arc<dyn RowSource>,
    builder: QueryBuilder,
    formatter: TypeFormatter,
}

impl Importer {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        let builder = QueryBuilder::new(source.dialect());
        Self {
            source,
            builder,
            formatter: TypeFormatter::default(),
        }
    }

    pub fn with_formatter(mut self, formatter: TypeFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Mapping validation plus full pre-validation, without a row source
    pub fn validate(
        formatter: &TypeFormatter,
        table: &TableSchema,
        parsed: &ParsedImportData,
        mapping: &ColumnMapping,
    ) -> Result<ImportResult, MappingError> {
        let mapped = mapping.resolve(&parsed.source_columns, table)?;
        let (errors, warnings) = pre_validate(formatter, parsed, &mapped);
        Ok(ImportResult {
            rows_failed: distinct_rows(&errors),
            validation_errors: errors,
            warnings,
            ..ImportResult::default()
        }
        .finish())
    }

    /// Import `parsed` into `table`.
    ///
    /// Mapping problems reject the call before anything is written. Row
    /// failures, cancellation and transport errors are reported in the
    /// returned [`ImportResult`]; rows written before a stop stay written.
    #[tracing::instrument(
        skip_all,
        fields(table = %table.name, rows = parsed.rows.len(), validate_first = options.validate_first)
    )]
    pub async fn import(
        &self,
        table: &TableSchema,
        parsed: &ParsedImportData,
        mapping: &ColumnMapping,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let mapped = mapping.resolve(&parsed.source_columns, table)?;
        let total = parsed.rows.len() as u64;
        let mut result = ImportResult::default();

        if options.validate_first {
            let (errors, warnings) = pre_validate(&self.formatter, parsed, &mapped);
            result.warnings = warnings;
            if !errors.is_empty() {
                result.rows_failed = distinct_rows(&errors);
                result.validation_errors = errors;
                tracing::info!(
                    invalid_rows = result.rows_failed,
                    "import rejected by pre-validation, nothing written"
                );
                return Ok(result.finish());
            }
        }

        let targets: Vec<String> = mapped.iter().map(|m| m.column.name.clone()).collect();
        let server_filled: Vec<bool> = mapped.iter().map(|m| m.column.fills_when_omitted()).collect();
        let max_rows = (self.builder.dialect().max_parameters() / mapped.len()).max(1);
        let batch_size = options.batch_size.max(1).min(max_rows);
        tracing::debug!(batch_size, columns = targets.len(), "starting import");

        for (batch_idx, batch) in parsed.rows.chunks(batch_size).enumerate() {
            if options.cancel.is_cancelled() {
                tracing::info!(rows_imported = result.rows_imported, "import cancelled");
                result.cancelled = true;
                break;
            }

            let first_row = batch_idx * batch_size + 1;
            let mut pending: Vec<PendingRow> = Vec::with_capacity(batch.len());
            let mut stop = false;

            for (offset, raw) in batch.iter().enumerate() {
                let row_number = first_row + offset;
                match self.convert_row(raw, &mapped) {
                    Ok((values, warnings)) => {
                        if !options.validate_first {
                            for (column, warning) in warnings {
                                result.warnings.push(issue(
                                    parsed,
                                    row_number,
                                    warning.to_string(),
                                    Some(column),
                                ));
                            }
                        }
                        pending.push((row_number, values));
                    }
                    Err((column, err)) => {
                        result.errors.push(issue(
                            parsed,
                            row_number,
                            err.to_string(),
                            Some(column),
                        ));
                        result.rows_failed += 1;
                        if options.on_error == OnError::Abort {
                            stop = true;
                            break;
                        }
                    }
                }
            }

            let outcome = self
                .write_runs(
                    table,
                    &targets,
                    &server_filled,
                    pending,
                    parsed,
                    options.on_error,
                    &mut result,
                )
                .await?;

            let processed = (first_row - 1 + batch.len()) as u64;
            progress::send(
                options.progress.as_ref(),
                ImportProgress {
                    percent: progress::percent(processed, total),
                    rows_imported: result.rows_imported,
                    rows_failed: result.rows_failed,
                    rows_processed: processed,
                    total_rows: total,
                },
            );

            if stop || outcome == BatchOutcome::Stop {
                tracing::info!(row = first_row, "import stopped early");
                break;
            }
        }

        if total == 0 {
            progress::send(
                options.progress.as_ref(),
                ImportProgress {
                    percent: 100.0,
                    rows_imported: 0,
                    rows_failed: 0,
                    rows_processed: 0,
                    total_rows: 0,
                },
            );
        }

        let result = result.finish();
        tracing::info!(
            rows_imported = result.rows_imported,
            rows_failed = result.rows_failed,
            cancelled = result.cancelled,
            "import finished"
        );
        Ok(result)
    }

    /// Wire values for one source row, or the first column that failed
    fn convert_row(
        &self,
        raw: &[Value],
        mapped: &[MappedColumn<'_>],
    ) -> Result<(Vec<Value>, Vec<(String, FormatWarning)>), (String, FormatError)> {
        let mut values = Vec::with_capacity(mapped.len());
        let mut warnings = Vec::new();
        for m in mapped {
            let value = raw.get(m.source_index).unwrap_or(&Value::Null);
            let (wire, warning) = self
                .formatter
                .to_database_checked(value, m.column)
                .map_err(|e| (m.column.name.clone(), e))?;
            if let Some(warning) = warning {
                warnings.push((m.column.name.clone(), warning));
            }
            values.push(wire);
        }
        Ok((values, warnings))
    }

    /// Write converted rows as consecutive runs sharing one column list.
    ///
    /// A NULL headed for a column the server fills itself is left out of
    /// that row's INSERT so the default or generated value applies.
    #[allow(clippy::too_many_arguments)]
    async fn write_runs(
        &self,
        table: &TableSchema,
        targets: &[String],
        server_filled: &[bool],
        rows: Vec<PendingRow>,
        parsed: &ParsedImportData,
        on_error: OnError,
        result: &mut ImportResult,
    ) -> Result<BatchOutcome, ImportError> {
        let mut rows = rows.into_iter().peekable();
        while let Some(first) = rows.next() {
            let keep = kept_columns(server_filled, &first.1);
            let mut run = vec![project(first, &keep)];
            while let Some(next) =
                rows.next_if(|(_, values)| kept_columns(server_filled, values) == keep)
            {
                run.push(project(next, &keep));
            }

            let columns: Vec<String> = targets
                .iter()
                .zip(&keep)
                .filter(|(_, kept)| **kept)
                .map(|(name, _)| name.clone())
                .collect();
            if columns.len() < targets.len() {
                tracing::debug!(
                    omitted = targets.len() - columns.len(),
                    rows = run.len(),
                    "leaving server-filled columns out"
                );
            }

            let outcome = self
                .write_batch(table, &columns, &run, parsed, on_error, result)
                .await?;
            if outcome == BatchOutcome::Stop {
                return Ok(BatchOutcome::Stop);
            }
        }
        Ok(BatchOutcome::Continue)
    }

    /// Write one batch as a single INSERT, falling back to one INSERT per row
    /// when the server rejects a row of it.
    async fn write_batch(
        &self,
        table: &TableSchema,
        targets: &[String],
        rows: &[PendingRow],
        parsed: &ParsedImportData,
        on_error: OnError,
        result: &mut ImportResult,
    ) -> Result<BatchOutcome, ImportError> {
        let Some((first_row, _)) = rows.first() else {
            return Ok(BatchOutcome::Continue);
        };

        let values: Vec<Vec<Value>> = rows.iter().map(|(_, v)| v.clone()).collect();
        let query = self.builder.build_insert_many(table, targets, &values)?;
        tracing::debug!(sql = query.sql(), rows = rows.len(), "writing import batch");

        match self.source.execute_write(&query).await {
            Ok(_) => {
                result.rows_imported += rows.len() as u64;
                Ok(BatchOutcome::Continue)
            }
            Err(e) if e.is_row_level() && rows.len() > 1 => {
                tracing::warn!(error = %e, rows = rows.len(), "batch rejected, retrying row by row");
                for (row_number, values) in rows {
                    let query = self.builder.build_insert(table, targets, values)?;
                    match self.source.execute_write(&query).await {
                        Ok(_) => result.rows_imported += 1,
                        Err(e) => {
                            let row_level = e.is_row_level();
                            record_write_error(result, parsed, *row_number, &e);
                            if !row_level || on_error == OnError::Abort {
                                return Ok(BatchOutcome::Stop);
                            }
                        }
                    }
                }
                Ok(BatchOutcome::Continue)
            }
            Err(e) => {
                let row_level = e.is_row_level();
                if !row_level {
                    tracing::warn!(error = %e, row = first_row, "transport failure, stopping import");
                }
                record_write_error(result, parsed, *first_row, &e);
                if !row_level || on_error == OnError::Abort {
                    Ok(BatchOutcome::Stop)
                } else {
                    Ok(BatchOutcome::Continue)
                }
            }
        }
    }
}

/// Which mapped columns a row binds. When every column would be left out
/// the row binds them all, since an INSERT needs at least one column.
fn kept_columns(server_filled: &[bool], values: &[Value]) -> Vec<bool> {
    let keep: Vec<bool> = server_filled
        .iter()
        .zip(values)
        .map(|(filled, value)| !(*filled && value.is_null()))
        .collect();
    if keep.contains(&true) {
        keep
    } else {
        vec![true; keep.len()]
    }
}

fn project((row_number, values): PendingRow, keep: &[bool]) -> PendingRow {
    let values = values
        .into_iter()
        .zip(keep)
        .filter(|(_, kept)| **kept)
        .map(|(value, _)| value)
        .collect();
    (row_number, values)
}

fn record_write_error(
    result: &mut ImportResult,
    parsed: &ParsedImportData,
    row_number: usize,
    error: &RowportError,
) {
    result.errors.push(issue(
        parsed,
        row_number,
        error.to_string(),
        error.column().map(str::to_string),
    ));
    result.rows_failed += 1;
}

/// Type-check every mapped cell of every row
fn pre_validate(
    formatter: &TypeFormatter,
    parsed: &ParsedImportData,
    mapped: &[MappedColumn<'_>],
) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for (idx, raw) in parsed.rows.iter().enumerate() {
        let row_number = idx + 1;
        for m in mapped {
            let value = raw.get(m.source_index).unwrap_or(&Value::Null);
            match formatter.coerce(value, m.column) {
                Ok((_, Some(warning))) => warnings.push(issue(
                    parsed,
                    row_number,
                    warning.to_string(),
                    Some(m.column.name.clone()),
                )),
                Ok((_, None)) => {}
                Err(e) => errors.push(issue(
                    parsed,
                    row_number,
                    e.to_string(),
                    Some(m.column.name.clone()),
                )),
            }
        }
    }
    (errors, warnings)
}

fn distinct_rows(issues: &[RowIssue]) -> u64 {
    issues
        .iter()
        .map(|i| i.row_number)
        .collect::<BTreeSet<_>>()
        .len() as u64
}

fn issue(
    parsed: &ParsedImportData,
    row_number: usize,
    message: String,
    column: Option<String>,
) -> RowIssue {
    let source_data = parsed
        .rows
        .get(row_number - 1)
        .map(|row| {
            parsed
                .source_columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .unwrap_or_default();
    RowIssue {
        row_number,
        source_data,
        message,
        column,
    }
}
