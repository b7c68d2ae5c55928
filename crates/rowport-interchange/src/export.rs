//! Chunked export of a table to CSV or a workbook

use std::fmt;
use std::sync::Arc;

use rowport_core::{ColumnDescriptor, ExportSettings, RowSource, TableSchema, Value};
use rowport_query::{FilterCriterion, PageRequest, QueryBuildError, QueryBuilder, SortSpec};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::csv::CsvWriter;
use crate::error::ExportError;
use crate::formatter::TypeFormatter;
use crate::parser::{Delimiter, FileFormat};
use crate::progress::{self, ExportProgress, ProgressSender};
use crate::spreadsheet::{MAX_DATA_ROWS, SpreadsheetWriter};

/// Which rows of the table an export covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    /// The page currently shown, with its filters
    Page,
    /// Every row; filters and page are ignored
    #[default]
    All,
    /// Every row matching the filters
    Filtered,
}

/// What the grid currently shows
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub table: TableSchema,
    /// Empty means every column in schema order
    pub columns: Vec<String>,
    pub filters: Vec<FilterCriterion>,
    pub sort: Option<SortSpec>,
    pub page: Option<PageRequest>,
}

impl ExportRequest {
    pub fn new(table: TableSchema) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            sort: None,
            page: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterCriterion>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub scope: ExportScope,
    pub format: FileFormat,
    pub chunk_size: usize,
    pub csv_bom: bool,
    pub progress: Option<ProgressSender<ExportProgress>>,
    pub cancel: CancellationToken,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_settings(&ExportSettings::default())
    }
}

impl ExportOptions {
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            scope: ExportScope::default(),
            format: FileFormat::Csv,
            chunk_size: settings.chunk_size,
            csv_bom: settings.csv_bom,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_scope(mut self, scope: ExportScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, sender: ProgressSender<ExportProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// A finished export, ready to be saved or downloaded
#[derive(Clone)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub format: FileFormat,
    pub rows_exported: u64,
    pub file_name: String,
    pub mime_type: &'static str,
}

impl fmt::Debug for ExportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportArtifact")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("rows_exported", &self.rows_exported)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

enum ArtifactWriter {
    Csv(CsvWriter),
    Spreadsheet(SpreadsheetWriter),
}

impl ArtifactWriter {
    fn write_header(&mut self, names: &[String]) -> Result<(), ExportError> {
        match self {
            ArtifactWriter::Csv(writer) => {
                writer.write_record(names.iter().map(|n| Some(n.as_str())));
                Ok(())
            }
            ArtifactWriter::Spreadsheet(writer) => writer.write_header(names),
        }
    }

    fn write_row(
        &mut self,
        values: &[Value],
        columns: &[&ColumnDescriptor],
        formatter: &TypeFormatter,
    ) -> Result<(), ExportError> {
        match self {
            ArtifactWriter::Csv(writer) => {
                let fields: Vec<Option<String>> = values
                    .iter()
                    .zip(columns)
                    .map(|(value, column)| {
                        (!value.is_null()).then(|| formatter.to_display(value, column))
                    })
                    .collect();
                writer.write_record(fields.iter().map(Option::as_deref));
                Ok(())
            }
            ArtifactWriter::Spreadsheet(writer) => writer.write_row(values, columns, formatter),
        }
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        match self {
            ArtifactWriter::Csv(writer) => Ok(writer.finish()),
            ArtifactWriter::Spreadsheet(writer) => writer.finish(),
        }
    }
}

/// Streams a table out through a [`RowSource`] one chunk at a time
pub struct Exporter {
    source: Arc<dyn RowSource>,
    builder: QueryBuilder,
    formatter: TypeFormatter,
}

impl Exporter {
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

    /// Run the export.
    ///
    /// The row total is counted once up front. Cancellation is checked
    /// before each chunk and once more after it arrives; a cancelled export
    /// returns [`ExportError::Cancelled`] and no artifact.
    #[tracing::instrument(
        skip_all,
        fields(table = %request.table.name, scope = ?options.scope, format = ?options.format)
    )]
    pub async fn export(
        &self,
        request: &ExportRequest,
        options: &ExportOptions,
    ) -> Result<ExportArtifact, ExportError> {
        let table = &request.table;
        let chunk_size = options.chunk_size.max(1) as u64;
        let filters: &[FilterCriterion] = match options.scope {
            ExportScope::All => &[],
            ExportScope::Filtered | ExportScope::Page => &request.filters,
        };
        let columns = resolve_columns(table, &request.columns)?;
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let order = chunk_order(table, request.sort.as_ref());

        self.check_cancelled(options)?;
        let count_query = self.builder.build_count(table, filters)?;
        tracing::debug!(sql = count_query.sql(), "counting rows to export");
        let counted = self
            .source
            .execute(&count_query)
            .await?
            .scalar_i64()
            .ok_or(ExportError::MissingCount)?
            .max(0) as u64;
        self.check_cancelled(options)?;

        let page_window = match options.scope {
            ExportScope::Page => Some(match &request.page {
                Some(page) => *page,
                None => PageRequest::new(1, chunk_size)?,
            }),
            _ => None,
        };
        let total = match &page_window {
            Some(page) => counted.saturating_sub(page.offset()).min(page.limit()),
            None => counted,
        };

        if options.format == FileFormat::Spreadsheet && total > MAX_DATA_ROWS {
            return Err(ExportError::TooManyRows {
                rows: total,
                max: MAX_DATA_ROWS,
            });
        }

        let mut writer = match options.format {
            FileFormat::Csv => {
                ArtifactWriter::Csv(CsvWriter::new(Delimiter::Comma.as_char(), options.csv_bom))
            }
            FileFormat::Spreadsheet => {
                ArtifactWriter::Spreadsheet(SpreadsheetWriter::new(&table.name, &columns)?)
            }
        };
        writer.write_header(&names)?;

        let mut processed = 0u64;
        while processed < total {
            self.check_cancelled(options)?;

            let (page, expected) = match &page_window {
                Some(page) => (*page, total),
                None => (
                    PageRequest::new(processed / chunk_size + 1, chunk_size)?,
                    chunk_size.min(total - processed),
                ),
            };
            let query = self
                .builder
                .build_ordered(table, &names, filters, &order, Some(&page))?;
            tracing::debug!(sql = query.sql(), "fetching export chunk");
            let chunk = self.source.execute(&query).await?;
            self.check_cancelled(options)?;

            let take = (chunk.rows.len() as u64).min(total - processed);
            for row in chunk.rows.iter().take(take as usize) {
                writer.write_row(&row.values, &columns, &self.formatter)?;
            }
            processed += take;

            progress::send(
                options.progress.as_ref(),
                ExportProgress {
                    percent: progress::percent(processed, total),
                    rows_processed: processed,
                    total_rows: total,
                },
            );

            if take < expected {
                tracing::warn!(
                    expected,
                    received = take,
                    processed,
                    total,
                    "short chunk, table changed during export"
                );
                return Err(ExportError::Truncated {
                    expected: total,
                    received: processed,
                });
            }
            if page_window.is_some() {
                break;
            }
        }

        if total == 0 {
            progress::send(
                options.progress.as_ref(),
                ExportProgress {
                    percent: 100.0,
                    rows_processed: 0,
                    total_rows: 0,
                },
            );
        }

        let bytes = writer.finish()?;
        tracing::info!(rows = processed, bytes = bytes.len(), "export finished");
        Ok(ExportArtifact {
            bytes,
            format: options.format,
            rows_exported: processed,
            file_name: format!("{}.{}", file_stem(&table.name), options.format.extension()),
            mime_type: options.format.mime_type(),
        })
    }

    fn check_cancelled(&self, options: &ExportOptions) -> Result<(), ExportError> {
        if options.cancel.is_cancelled() {
            tracing::info!("export cancelled, discarding partial artifact");
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }
}

/// A total order for chunk windows: the requested sort, else the primary
/// key, else every column. Ties under a user sort are broken by the key.
fn chunk_order(table: &TableSchema, sort: Option<&SortSpec>) -> Vec<SortSpec> {
    let key = table.primary_key();
    let tiebreak: Vec<&ColumnDescriptor> = if key.is_empty() {
        table.columns.iter().collect()
    } else {
        key
    };
    sort.into_iter()
        .cloned()
        .chain(
            tiebreak
                .into_iter()
                .filter(|c| sort.is_none_or(|s| s.column != c.name))
                .map(|c| SortSpec::asc(c.name.clone())),
        )
        .collect()
}

fn resolve_columns<'a>(
    table: &'a TableSchema,
    columns: &[String],
) -> Result<Vec<&'a ColumnDescriptor>, QueryBuildError> {
    if columns.is_empty() {
        return Ok(table.columns.iter().collect());
    }
    columns
        .iter()
        .map(|name| {
            table.column(name).ok_or_else(|| QueryBuildError::InvalidColumn {
                table: table.name.clone(),
                column: name.clone(),
            })
        })
        .collect()
}

fn file_stem(table: &str) -> String {
    let stem: String = table
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('.').to_string();
    if stem.is_empty() {
        "export".to_string()
    } else {
        stem
    }
}
