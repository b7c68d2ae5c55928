//! Column metadata and the schema collaborator trait

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Supplies the authoritative column set of a table.
///
/// The query builder uses it as its identifier allowlist and the type
/// formatter reads per-column types from it.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Get the descriptor set for a table
    async fn table_schema(&self, schema: Option<&str>, table: &str) -> Result<TableSchema>;
}

/// Normalized column type used for display and conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Boolean,
    Date,
    Time,
    Timestamp,
    Integer,
    Decimal,
    Text,
}

impl DisplayType {
    /// Normalize a vendor SQL type name.
    ///
    /// Length/precision suffixes and `unsigned` are ignored, except that
    /// MySQL's `tinyint(1)` is a boolean. Unknown types map to `Text`.
    pub fn from_sql_type(sql_type: &str) -> Self {
        let lower = sql_type.trim().to_lowercase();
        if lower.replace(' ', "") == "tinyint(1)" {
            return DisplayType::Boolean;
        }

        let base = lower
            .split('(')
            .next()
            .unwrap_or_default()
            .trim_end_matches(" unsigned")
            .trim();

        match base {
            "bool" | "boolean" | "bit" => DisplayType::Boolean,
            "date" => DisplayType::Date,
            "time" | "timetz" | "time with time zone" | "time without time zone" => {
                DisplayType::Time
            }
            "timestamp"
            | "timestamptz"
            | "timestamp with time zone"
            | "timestamp without time zone"
            | "datetime"
            | "datetime2"
            | "smalldatetime"
            | "datetimeoffset" => DisplayType::Timestamp,
            "int2" | "int4" | "int8" | "smallint" | "integer" | "bigint" | "int"
            | "mediumint" | "tinyint" | "serial" | "bigserial" | "smallserial" => {
                DisplayType::Integer
            }
            "float4" | "float8" | "real" | "double precision" | "double" | "float" | "numeric"
            | "decimal" | "money" | "smallmoney" => DisplayType::Decimal,
            _ => DisplayType::Text,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayType::Boolean => "boolean",
            DisplayType::Date => "date",
            DisplayType::Time => "time",
            DisplayType::Timestamp => "timestamp",
            DisplayType::Integer => "integer",
            DisplayType::Decimal => "decimal",
            DisplayType::Text => "text",
        }
    }
}

impl std::fmt::Display for DisplayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata for one table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColumnDescriptorDef")]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type name as reported by the server
    pub data_type: String,
    pub display_type: DisplayType,
    pub nullable: bool,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
}

impl ColumnDescriptor {
    /// Create a nullable column, deriving the display type from `data_type`
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            display_type: DisplayType::from_sql_type(&data_type),
            data_type,
            nullable: true,
            precision: None,
            scale: None,
            default_value: None,
            is_primary_key: false,
            is_auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// NOT NULL, no default and not generated by the server
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default_value.is_none() && !self.is_auto_increment
    }

    /// The server supplies a value when an INSERT leaves this column out,
    /// and an explicit NULL would be rejected or stored instead.
    pub fn fills_when_omitted(&self) -> bool {
        self.is_auto_increment || (!self.nullable && self.default_value.is_some())
    }
}

/// On-disk shape of a column; `display_type` is derived when omitted
#[derive(Deserialize)]
struct ColumnDescriptorDef {
    name: String,
    data_type: String,
    #[serde(default)]
    display_type: Option<DisplayType>,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    precision: Option<u32>,
    #[serde(default)]
    scale: Option<u32>,
    #[serde(default)]
    default_value: Option<String>,
    #[serde(default)]
    is_primary_key: bool,
    #[serde(default)]
    is_auto_increment: bool,
}

fn default_nullable() -> bool {
    true
}

impl From<ColumnDescriptorDef> for ColumnDescriptor {
    fn from(def: ColumnDescriptorDef) -> Self {
        Self {
            display_type: def
                .display_type
                .unwrap_or_else(|| DisplayType::from_sql_type(&def.data_type)),
            name: def.name,
            data_type: def.data_type,
            nullable: def.nullable,
            precision: def.precision,
            scale: def.scale,
            default_value: def.default_value,
            is_primary_key: def.is_primary_key,
            is_auto_increment: def.is_auto_increment,
        }
    }
}

/// The descriptor set of one table, in ordinal order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            columns,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary key columns in ordinal order
    pub fn primary_key(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_vendor_types() {
        assert_eq!(DisplayType::from_sql_type("int4"), DisplayType::Integer);
        assert_eq!(DisplayType::from_sql_type("BIGINT"), DisplayType::Integer);
        assert_eq!(DisplayType::from_sql_type("int unsigned"), DisplayType::Integer);
        assert_eq!(DisplayType::from_sql_type("tinyint(1)"), DisplayType::Boolean);
        assert_eq!(DisplayType::from_sql_type("tinyint(4)"), DisplayType::Integer);
        assert_eq!(DisplayType::from_sql_type("numeric(10,2)"), DisplayType::Decimal);
        assert_eq!(DisplayType::from_sql_type("timestamptz"), DisplayType::Timestamp);
        assert_eq!(DisplayType::from_sql_type("datetime"), DisplayType::Timestamp);
        assert_eq!(DisplayType::from_sql_type("varchar(255)"), DisplayType::Text);
        assert_eq!(DisplayType::from_sql_type("jsonb"), DisplayType::Text);
    }

    #[test]
    fn required_columns() {
        assert!(ColumnDescriptor::new("email", "text").not_null().is_required());
        assert!(!ColumnDescriptor::new("note", "text").is_required());
        assert!(
            !ColumnDescriptor::new("id", "integer")
                .primary_key()
                .auto_increment()
                .is_required()
        );
        assert!(
            !ColumnDescriptor::new("active", "boolean")
                .not_null()
                .with_default("1")
                .is_required()
        );
    }

    #[test]
    fn server_filled_columns() {
        assert!(ColumnDescriptor::new("id", "integer").auto_increment().fills_when_omitted());
        assert!(
            ColumnDescriptor::new("status", "text")
                .not_null()
                .with_default("'new'")
                .fills_when_omitted()
        );
        assert!(!ColumnDescriptor::new("note", "text").with_default("''").fills_when_omitted());
        assert!(!ColumnDescriptor::new("name", "text").not_null().fills_when_omitted());
    }

    #[test]
    fn deserializes_with_derived_display_type() {
        let json = r#"{
            "name": "users",
            "columns": [
                {"name": "id", "data_type": "integer", "nullable": false, "is_primary_key": true},
                {"name": "balance", "data_type": "numeric(10,2)", "precision": 10, "scale": 2}
            ]
        }"#;
        let table: TableSchema = serde_json::from_str(json).unwrap();
        assert_eq!(table.schema, None);
        assert_eq!(table.column("id").unwrap().display_type, DisplayType::Integer);
        assert_eq!(table.column("balance").unwrap().scale, Some(2));
        assert!(table.column("balance").unwrap().nullable);
        assert_eq!(table.primary_key().len(), 1);
        assert!(!table.contains("missing"));
    }
}
