//! Table implementation: named columns sharing one row count

use std::fmt;
use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::schema::Schema;

/// An ordered collection of equal-length columns
#[derive(Debug, Clone)]
pub struct Table {
    /// Schema describing the columns
    schema: Arc<Schema>,

    /// Columns in schema order
    columns: Vec<Column>,

    /// Number of rows
    row_count: usize,
}

impl Table {
    /// Create a new table with the given schema and columns
    pub fn new(schema: Arc<Schema>, columns: Vec<Column>) -> Result<Self> {
        if columns.len() != schema.fields().len() {
            return Err(Error::InvalidArgument(
                "Number of columns does not match schema".into(),
            ));
        }

        for (i, field) in schema.fields().iter().enumerate() {
            let column = &columns[i];

            if column.name() != field.name() {
                return Err(Error::InvalidArgument(format!(
                    "Column name mismatch: expected '{}', got '{}'",
                    field.name(),
                    column.name()
                )));
            }

            if column.data_type() != field.data_type() {
                return Err(Error::SchemaMismatch(format!(
                    "Column type mismatch for '{}': expected {}, got {}",
                    field.name(),
                    field.data_type(),
                    column.data_type()
                )));
            }
        }

        let row_count = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != row_count {
                return Err(Error::InvalidArgument(
                    "All columns must have the same length".into(),
                ));
            }
        }

        Ok(Self {
            schema,
            columns,
            row_count,
        })
    }

    /// Create an empty table with the given schema
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            columns: Vec::new(),
            row_count: 0,
        }
    }

    /// Get the schema of this table
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Get the number of rows
    pub fn num_rows(&self) -> usize {
        self.row_count
    }

    /// Get the number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Check if this table has no rows
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a column by index
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or(Error::IndexOutOfBounds)
    }

    /// Get a column by name
    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        let index = self.schema.index_of(name)?;
        Ok(&self.columns[index])
    }

    /// Get all columns
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Concatenate tables row-wise, in the given order
    ///
    /// All tables must share an identical schema.
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let first = tables
            .first()
            .ok_or_else(|| Error::InvalidArgument("Cannot concat zero tables".into()))?;

        for table in &tables[1..] {
            if table.schema.as_ref() != first.schema.as_ref() {
                return Err(Error::SchemaMismatch(
                    "Cannot concat tables with different schemas".into(),
                ));
            }
        }

        if tables.len() == 1 {
            return Ok(first.clone());
        }

        let mut columns = Vec::with_capacity(first.num_columns());
        for column_index in 0..first.num_columns() {
            let parts: Result<Vec<&Column>> =
                tables.iter().map(|t| t.column(column_index)).collect();
            columns.push(Column::concat(&parts?)?);
        }

        Table::new(first.schema.clone(), columns)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Table: {} rows x {} columns",
            self.row_count,
            self.columns.len()
        )?;
        for column in &self.columns {
            writeln!(f, "  {column}")?;
        }
        Ok(())
    }
}
