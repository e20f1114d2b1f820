//! Schema-related data models.

use crate::models::query::Row;
use serde::{Deserialize, Serialize};

/// Schema of one table as reported by the engine's `DESCRIBE`.
///
/// Column rows are kept exactly as returned (`Field`, `Type`, `Null`, `Key`,
/// `Default`, `Extra` on MySQL); the gateway does not reinterpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub columns: Vec<Row>,
}

impl TableDescriptor {
    pub fn new(table_name: impl Into<String>, columns: Vec<Row>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Number of column descriptor rows.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in declaration order, read from the `Field` entry.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|row| row.get("Field").and_then(|v| v.as_str()))
            .collect()
    }
}
