//! Subcommand implementations

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, anyhow, bail};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use rowport_core::{RowportSettings, SqlDialect, TableSchema, Value};
use rowport_interchange::{
    ColumnMapping, HeaderMode, Importer, ParseHints, ParsedImportData, RowIssue, SheetSelector,
    TypeFormatter, parse,
};
use rowport_query::{FilterCriterion, FilterOperator, PageRequest, QueryBuilder, SortDirection, SortSpec};

use crate::{FileArgs, InspectArgs, QueryArgs, ValidateArgs};

pub fn query(args: &QueryArgs) -> anyhow::Result<ExitCode> {
    let table = read_schema(&args.schema)?;
    let dialect: SqlDialect = args.dialect.parse()?;
    let formatter = TypeFormatter::default();

    let filters = args
        .filters
        .iter()
        .map(|spec| parse_filter(spec, &table, &formatter))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let sort = args.sort.as_deref().map(parse_sort).transpose()?;
    let page = match (args.page, args.page_size) {
        (Some(page), Some(size)) => Some(PageRequest::new(page, size)?),
        (None, Some(size)) => Some(PageRequest::new(1, size)?),
        _ => None,
    };

    let builder = QueryBuilder::new(dialect);
    let built = if args.count {
        builder.build_count(&table, &filters)?
    } else {
        builder.build(&table, &args.columns, &filters, sort.as_ref(), page.as_ref())?
    };
    tracing::debug!(sql = built.sql(), params = built.params().len(), "built query");

    let output = serde_json::json!({
        "sql": built.sql(),
        "params": built.params(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

pub fn inspect(args: &InspectArgs, settings: &RowportSettings) -> anyhow::Result<ExitCode> {
    let parsed = read_file(&args.file, HeaderMode::default(), settings)?;

    match (&parsed.sheet, parsed.delimiter) {
        (Some(sheet), _) => println!("Sheet: {}", sheet),
        (None, Some(delimiter)) => println!("Delimiter: {:?}", delimiter),
        (None, None) => {}
    }
    println!("Rows: {}", parsed.row_count());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(parsed.source_columns.clone());
    for row in parsed.preview(args.rows) {
        table.add_row(row.iter().map(cell_text).collect::<Vec<_>>());
    }
    println!("{table}");
    Ok(ExitCode::SUCCESS)
}

pub fn validate(args: &ValidateArgs, settings: &RowportSettings) -> anyhow::Result<ExitCode> {
    let table = read_schema(&args.schema)?;
    let header = if args.infer_header {
        HeaderMode::Infer(table.columns.iter().map(|c| c.display_type).collect())
    } else {
        HeaderMode::Present
    };
    let parsed = read_file(&args.file, header, settings)?;

    let mapping = match &args.mapping {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mapping {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid mapping file {}", path.display()))?
        }
        None => ColumnMapping::by_name(&parsed.source_columns, &table),
    };

    let formatter = TypeFormatter::new(settings.formats.date_order);
    let result = Importer::validate(&formatter, &table, &parsed, &mapping)?;

    if !result.validation_errors.is_empty() {
        println!("{}", issue_table(&result.validation_errors));
    }
    if !result.warnings.is_empty() {
        println!("Warnings:");
        println!("{}", issue_table(&result.warnings));
    }
    println!(
        "{} rows checked, {} invalid, {} warnings",
        parsed.row_count(),
        result.rows_failed,
        result.warnings.len()
    );

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn read_schema(path: &Path) -> anyhow::Result<TableSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid schema file {}", path.display()))
}

fn read_file(
    args: &FileArgs,
    header: HeaderMode,
    settings: &RowportSettings,
) -> anyhow::Result<ParsedImportData> {
    let raw = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut hints = ParseHints::default()
        .with_header(if args.no_header { HeaderMode::Absent } else { header })
        .with_formatter(TypeFormatter::new(settings.formats.date_order));
    if let Some(delimiter) = args.delimiter {
        hints = hints.with_delimiter(delimiter.into());
    }
    if let Some(sheet) = &args.sheet {
        hints = hints.with_sheet(match sheet.parse::<usize>() {
            Ok(idx) => SheetSelector::Index(idx),
            Err(_) => SheetSelector::Name(sheet.clone()),
        });
    }

    parse(&raw, &hints).with_context(|| format!("Failed to parse {}", args.file.display()))
}

/// `column:operator[:value]`; the value may itself contain colons
fn parse_filter(
    spec: &str,
    table: &TableSchema,
    formatter: &TypeFormatter,
) -> anyhow::Result<FilterCriterion> {
    let mut parts = spec.splitn(3, ':');
    let (Some(column), Some(operator)) = (parts.next(), parts.next()) else {
        bail!("Filter '{}' must look like column:operator[:value]", spec);
    };
    let operator: FilterOperator = operator.parse()?;

    let Some(raw) = parts.next() else {
        return Ok(FilterCriterion::unary(column, operator));
    };
    // pattern operators match text, so their values stay strings
    let value = match table.column(column) {
        Some(descriptor) if !operator.is_pattern() => formatter
            .parse(raw, descriptor)
            .unwrap_or_else(|_| Value::from(raw)),
        _ => Value::from(raw),
    };
    Ok(FilterCriterion::new(column, operator, value))
}

fn parse_sort(spec: &str) -> anyhow::Result<SortSpec> {
    let (column, direction) = spec.split_once(':').unwrap_or((spec, "asc"));
    let direction: SortDirection = direction.parse().map_err(|e: String| anyhow!(e))?;
    Ok(SortSpec {
        column: column.to_string(),
        direction,
    })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn issue_table(issues: &[RowIssue]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Row", "Column", "Message"]);
    for issue in issues {
        table.add_row(vec![
            issue.row_number.to_string(),
            issue.column.clone().unwrap_or_default(),
            issue.message.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowport_core::ColumnDescriptor;

    fn table() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                ColumnDescriptor::new("name", "text"),
                ColumnDescriptor::new("age", "integer"),
            ],
        )
    }

    #[test]
    fn filters_parse_from_the_command_line() {
        let formatter = TypeFormatter::default();
        let f = parse_filter("name:startsWith:Jo*", &table(), &formatter).unwrap();
        assert_eq!(f.operator, FilterOperator::StartsWith);
        assert_eq!(f.value, Value::from("Jo*"));

        let f = parse_filter("age:gt:30", &table(), &formatter).unwrap();
        assert_eq!(f.value, Value::Int64(30));

        let f = parse_filter("name:isEmpty", &table(), &formatter).unwrap();
        assert_eq!(f.value, Value::Null);

        let f = parse_filter("name:equals:a:b", &table(), &formatter).unwrap();
        assert_eq!(f.value, Value::from("a:b"));

        assert!(parse_filter("name", &table(), &formatter).is_err());
        assert!(parse_filter("name:like:x", &table(), &formatter).is_err());
    }

    #[test]
    fn sort_defaults_to_ascending() {
        assert_eq!(parse_sort("age").unwrap(), SortSpec::asc("age"));
        assert_eq!(parse_sort("age:desc").unwrap(), SortSpec::desc("age"));
        assert!(parse_sort("age:sideways").is_err());
    }
}
