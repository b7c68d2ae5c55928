//! Parameterized statement construction
//!
//! Identifiers are checked against the table's descriptor set before any
//! text is produced. Values only ever reach the statement as bound
//! parameters.

use rowport_core::{BuiltQuery, ColumnDescriptor, SqlDialect, TableSchema, Value};

use crate::error::{QueryBuildError, QueryBuildResult};
use crate::filter::FilterCriterion;
use crate::page::PageRequest;
use crate::sort::SortSpec;

/// Collects bound values and hands out their placeholders
#[derive(Debug)]
pub(crate) struct Params {
    dialect: SqlDialect,
    values: Vec<Value>,
}

impl Params {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    pub(crate) fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Bind a value and return its placeholder
    pub(crate) fn bind(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    fn next_index(&self) -> usize {
        self.values.len() + 1
    }

    fn into_query(self, sql: String) -> BuiltQuery {
        BuiltQuery::new(sql, self.values)
    }
}

/// Builds SELECT/COUNT/INSERT/UPDATE/DELETE statements for one dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    dialect: SqlDialect,
}

impl QueryBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Build a paged SELECT.
    ///
    /// An empty `columns` list selects every column of `table` in schema
    /// order.
    pub fn build(
        &self,
        table: &TableSchema,
        columns: &[String],
        filters: &[FilterCriterion],
        sort: Option<&SortSpec>,
        page: Option<&PageRequest>,
    ) -> QueryBuildResult<BuiltQuery> {
        let order = sort.map(std::slice::from_ref).unwrap_or_default();
        self.build_ordered(table, columns, filters, order, page)
    }

    /// Like [`build`](Self::build) but ordered by several keys in turn.
    ///
    /// Chunked reads pass a total order here so consecutive windows neither
    /// overlap nor skip rows.
    pub fn build_ordered(
        &self,
        table: &TableSchema,
        columns: &[String],
        filters: &[FilterCriterion],
        order: &[SortSpec],
        page: Option<&PageRequest>,
    ) -> QueryBuildResult<BuiltQuery> {
        let selected = self.resolve_columns(table, columns)?;
        let filter_columns = self.validate_filters(table, filters)?;
        let order_columns = order
            .iter()
            .map(|spec| Self::lookup(table, &spec.column))
            .collect::<QueryBuildResult<Vec<_>>>()?;

        let select_list = selected
            .iter()
            .map(|c| self.dialect.quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut params = Params::new(self.dialect);
        let mut sql = format!("SELECT {} FROM {}", select_list, self.table_ref(table));
        self.push_where(&mut sql, filters, &filter_columns, &mut params);

        if !order.is_empty() {
            let keys = order
                .iter()
                .zip(&order_columns)
                .map(|(spec, column)| {
                    format!(
                        "{} {}",
                        self.dialect.quote_identifier(&column.name),
                        spec.direction.to_sql()
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys);
        } else if page.is_some() && self.dialect.requires_order_for_pagination() {
            sql.push_str(" ORDER BY (SELECT NULL)");
        }

        if let Some(page) = page {
            sql.push(' ');
            sql.push_str(&self.dialect.pagination_clause(params.next_index()));
            let limit = Value::Int64(to_i64(page.limit()));
            let offset = Value::Int64(to_i64(page.offset()));
            if self.dialect.binds_offset_first() {
                params.bind(offset);
                params.bind(limit);
            } else {
                params.bind(limit);
                params.bind(offset);
            }
        }

        Ok(params.into_query(sql))
    }

    /// Build `SELECT COUNT(*)` over the same filters as [`build`](Self::build)
    pub fn build_count(
        &self,
        table: &TableSchema,
        filters: &[FilterCriterion],
    ) -> QueryBuildResult<BuiltQuery> {
        let filter_columns = self.validate_filters(table, filters)?;
        let mut params = Params::new(self.dialect);
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table_ref(table));
        self.push_where(&mut sql, filters, &filter_columns, &mut params);
        Ok(params.into_query(sql))
    }

    /// Build a single-row INSERT
    pub fn build_insert(
        &self,
        table: &TableSchema,
        columns: &[String],
        values: &[Value],
    ) -> QueryBuildResult<BuiltQuery> {
        self.build_insert_many(table, columns, &[values.to_vec()])
    }

    /// Build one multi-row INSERT for a batch
    pub fn build_insert_many(
        &self,
        table: &TableSchema,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> QueryBuildResult<BuiltQuery> {
        if columns.is_empty() || rows.is_empty() {
            return Err(QueryBuildError::EmptyInsert);
        }
        for column in columns {
            Self::lookup(table, column)?;
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(QueryBuildError::RowWidthMismatch {
                    row: idx + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        let count = columns.len() * rows.len();
        self.check_parameter_count(count)?;

        let column_list = columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut params = Params::new(self.dialect);
        let tuples = rows
            .iter()
            .map(|row| {
                let placeholders = row
                    .iter()
                    .map(|value| params.bind(value.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", placeholders)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table_ref(table),
            column_list,
            tuples
        );
        Ok(params.into_query(sql))
    }

    /// Build an UPDATE of `changes` on the row identified by `key`
    pub fn build_update(
        &self,
        table: &TableSchema,
        key: &[(String, Value)],
        changes: &[(String, Value)],
    ) -> QueryBuildResult<BuiltQuery> {
        if changes.is_empty() {
            return Err(QueryBuildError::EmptyUpdate);
        }
        self.validate_key(table, key)?;
        for (column, _) in changes {
            Self::lookup(table, column)?;
        }

        let mut params = Params::new(self.dialect);
        let assignments = changes
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    self.dialect.quote_identifier(column),
                    params.bind(value.clone())
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let predicate = self.key_predicate(key, &mut params);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table_ref(table),
            assignments,
            predicate
        );
        Ok(params.into_query(sql))
    }

    /// Build a DELETE of the row identified by `key`
    pub fn build_delete(
        &self,
        table: &TableSchema,
        key: &[(String, Value)],
    ) -> QueryBuildResult<BuiltQuery> {
        self.validate_key(table, key)?;
        let mut params = Params::new(self.dialect);
        let predicate = self.key_predicate(key, &mut params);
        let sql = format!("DELETE FROM {} WHERE {}", self.table_ref(table), predicate);
        Ok(params.into_query(sql))
    }

    fn table_ref(&self, table: &TableSchema) -> String {
        self.dialect
            .qualified_table(table.schema.as_deref(), &table.name)
    }

    fn lookup<'a>(table: &'a TableSchema, column: &str) -> QueryBuildResult<&'a ColumnDescriptor> {
        table
            .column(column)
            .ok_or_else(|| QueryBuildError::InvalidColumn {
                table: table.name.clone(),
                column: column.to_string(),
            })
    }

    fn resolve_columns<'a>(
        &self,
        table: &'a TableSchema,
        columns: &[String],
    ) -> QueryBuildResult<Vec<&'a ColumnDescriptor>> {
        if columns.is_empty() {
            return Ok(table.columns.iter().collect());
        }
        columns.iter().map(|c| Self::lookup(table, c)).collect()
    }

    fn validate_filters<'a>(
        &self,
        table: &'a TableSchema,
        filters: &[FilterCriterion],
    ) -> QueryBuildResult<Vec<&'a ColumnDescriptor>> {
        filters
            .iter()
            .map(|criterion| {
                let column = Self::lookup(table, &criterion.column)?;
                criterion.validate(column)?;
                Ok(column)
            })
            .collect()
    }

    fn validate_key(&self, table: &TableSchema, key: &[(String, Value)]) -> QueryBuildResult<()> {
        if key.is_empty() {
            return Err(QueryBuildError::MissingKey);
        }
        for (column, _) in key {
            Self::lookup(table, column)?;
        }
        Ok(())
    }

    fn push_where(
        &self,
        sql: &mut String,
        filters: &[FilterCriterion],
        columns: &[&ColumnDescriptor],
        params: &mut Params,
    ) {
        if filters.is_empty() {
            return;
        }
        let conditions = filters
            .iter()
            .zip(columns)
            .map(|(criterion, column)| {
                let column_sql = self.dialect.quote_identifier(&column.name);
                criterion.to_sql(&column_sql, column, params)
            })
            .collect::<Vec<_>>();
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    fn key_predicate(&self, key: &[(String, Value)], params: &mut Params) -> String {
        key.iter()
            .map(|(column, value)| {
                let column_sql = self.dialect.quote_identifier(column);
                if value.is_null() {
                    format!("{} IS NULL", column_sql)
                } else {
                    format!("{} = {}", column_sql, params.bind(value.clone()))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn check_parameter_count(&self, count: usize) -> QueryBuildResult<()> {
        let max = self.dialect.max_parameters();
        if count > max {
            return Err(QueryBuildError::TooManyParameters {
                count,
                max,
                dialect: self.dialect.to_string(),
            });
        }
        Ok(())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
