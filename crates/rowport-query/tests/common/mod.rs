//! Common test fixtures

#![allow(dead_code)]

use rowport_core::{ColumnDescriptor, TableSchema};

/// A `users` table covering every display type
pub fn users_table() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnDescriptor::new("id", "integer").primary_key().auto_increment(),
            ColumnDescriptor::new("name", "varchar(100)").not_null(),
            ColumnDescriptor::new("email", "text"),
            ColumnDescriptor::new("age", "int4"),
            ColumnDescriptor::new("balance", "numeric(10,2)").with_precision(10, 2),
            ColumnDescriptor::new("active", "boolean"),
            ColumnDescriptor::new("created_at", "timestamp"),
        ],
    )
}

/// Values that must never show up verbatim in generated SQL text
pub fn hostile_values() -> Vec<&'static str> {
    vec![
        "alice",
        "O'Brien",
        "'; DROP TABLE users; --",
        "Robert\"); DELETE FROM users",
        "50% off",
        "under_score",
        "bang!",
        "John*",
        "J?hn",
    ]
}
