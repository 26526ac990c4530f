use thiserror::Error;

use crate::record::Record;
use crate::schema::{FieldSchema, FieldValue};

pub type Row = Vec<Option<FieldValue>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaMismatch {
    #[error("Column sets differ: expected {expected:?}, found {found:?}")]
    Columns { expected: Vec<String>, found: Vec<String> },
    #[error("Row has {found} cells but the table has {expected} columns")]
    RowWidth { expected: usize, found: usize },
}

/// Rows of records over a fixed, ordered set of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularUnit {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl TabularUnit {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn for_schema(schema: &FieldSchema) -> Self {
        Self::new(schema.field_names().map(str::to_string).collect())
    }

    /// Wrap one record as a single-row unit.
    pub fn from_record(record: &Record) -> Self {
        let mut unit = Self::for_schema(record.schema());
        unit.rows.push(record.values().to_vec());
        unit
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), SchemaMismatch> {
        if row.len() != self.columns.len() {
            return Err(SchemaMismatch::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Same column names, in any order.
    pub fn has_same_columns(&self, other: &[String]) -> bool {
        self.columns.len() == other.len() && other.iter().all(|c| self.columns.contains(c))
    }

    /// Append `other`'s rows after this unit's rows, matching columns by name.
    pub fn append(&mut self, other: TabularUnit) -> Result<(), SchemaMismatch> {
        if !self.has_same_columns(&other.columns) {
            return Err(SchemaMismatch::Columns {
                expected: self.columns.clone(),
                found: other.columns,
            });
        }
        // Position of each of our columns inside `other`.
        let mapping: Vec<usize> = self
            .columns
            .iter()
            .filter_map(|c| other.column_index(c))
            .collect();
        for mut row in other.rows {
            let aligned = mapping.iter().map(|&i| row[i].take()).collect();
            self.rows.push(aligned);
        }
        Ok(())
    }

    /// Concatenate units in input order. The first unit fixes the column
    /// order; `None` when `units` is empty.
    pub fn concat(
        units: impl IntoIterator<Item = TabularUnit>,
    ) -> Result<Option<TabularUnit>, SchemaMismatch> {
        let mut units = units.into_iter();
        let Some(mut head) = units.next() else {
            return Ok(None);
        };
        for unit in units {
            head.append(unit)?;
        }
        Ok(Some(head))
    }

    /// Rewrite every present cell in `column`. Returning `None` clears the cell.
    pub fn map_column<F>(&mut self, column: &str, mut f: F)
    where
        F: FnMut(FieldValue) -> Option<FieldValue>,
    {
        let Some(idx) = self.column_index(column) else {
            return;
        };
        for row in &mut self.rows {
            if let Some(value) = row[idx].take() {
                row[idx] = f(value);
            }
        }
    }
}
