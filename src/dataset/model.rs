use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

use super::sanitizer::is_identifier;
use super::LoadError;

/// A single spreadsheet cell, typed as the spreadsheet reported it.
///
/// Values stay typed until they reach the normalizer; nothing upstream of
/// [`super::normalize_record`] turns them into strings.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Missing,
}

impl CellValue {
    /// True for empty cells, error cells and NaN.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Number(v) => v.is_nan(),
            _ => false,
        }
    }
}

/// One renamed column, reported once per load so users can fix their templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRename {
    pub original: String,
    pub sanitized: String,
}

impl ColumnRename {
    pub fn warning(&self) -> String {
        format!(
            "Column renamed: \"{}\" -> \"{}\"; use \"{{{{ {} }}}}\" in templates.",
            self.original, self.sanitized, self.sanitized
        )
    }
}

/// Ordered records sharing one set of sanitized column names.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    /// Build a dataset, padding short rows with [`CellValue::Missing`] and
    /// dropping cells past the last column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self, LoadError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !is_identifier(column) {
                return Err(LoadError::InvalidColumns(format!(
                    "'{}' is not a valid identifier",
                    column
                )));
            }
            if !seen.insert(column.as_str()) {
                return Err(LoadError::InvalidColumns(format!(
                    "duplicate column '{}'",
                    column
                )));
            }
        }

        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Missing);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn first_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }
}

/// Borrowed view of one dataset row as a column-name to value mapping.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let values: &'a [CellValue] = self.values;
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| values.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + 'a {
        let columns: &'a [String] = self.columns;
        let values: &'a [CellValue] = self.values;
        columns.iter().map(String::as_str).zip(values.iter())
    }
}
