//! Spreadsheet loading.
//!
//! The first worksheet's first used row is the header; every following
//! non-blank row becomes one record. Headers are sanitized here, once per
//! load, and the renames are handed back for the caller to surface.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

use super::model::{CellValue, ColumnRename, Dataset};
use super::normalizer::display_value;
use super::sanitizer::sanitize_columns;
use super::LoadError;

/// A freshly parsed dataset together with its column rename report.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub renames: Vec<ColumnRename>,
}

/// Parse an xlsx/xls/xlsb/ods blob into a [`Dataset`].
pub fn load_dataset(bytes: &[u8]) -> Result<LoadedDataset, LoadError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::NoWorksheet)?
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(LoadError::NoHeader)?;
    let labels: Vec<String> = header
        .iter()
        .map(|cell| display_value(&cell_value(cell)))
        .collect();

    let sanitized = sanitize_columns(&labels);
    for rename in &sanitized.renames {
        log::warn!("{}", rename.warning());
    }

    let records: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(CellValue::is_missing))
        .collect();

    log::info!(
        "Parsed spreadsheet with {} columns and {} rows",
        sanitized.names.len(),
        records.len()
    );

    let dataset = Dataset::new(sanitized.names, records)?;
    Ok(LoadedDataset {
        dataset,
        renames: sanitized.renames,
    })
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Missing,
        Data::Error(_) => CellValue::Missing,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
