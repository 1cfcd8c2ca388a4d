//! Dataset module - tabular records loaded from an uploaded spreadsheet.
//!
//! - `model` - cell values, the in-memory dataset and rename reports
//! - `sanitizer` - column label to template variable name conversion
//! - `normalizer` - per-record conversion to display strings
//! - `loader` - spreadsheet blob parsing

pub mod loader;
pub mod model;
pub mod normalizer;
pub mod sanitizer;

pub use loader::{load_dataset, LoadedDataset};
pub use model::{CellValue, ColumnRename, Dataset, Record};
pub use normalizer::{normalize_record, NormalizedRecord};
pub use sanitizer::{sanitize_columns, SanitizedColumns};

use thiserror::Error;

/// Errors raised while turning an uploaded spreadsheet into a [`Dataset`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error("spreadsheet contains no worksheets")]
    NoWorksheet,
    #[error("worksheet has no header row")]
    NoHeader,
    #[error("invalid column set: {0}")]
    InvalidColumns(String),
    #[error("invalid template '{name}': {reason}")]
    Template { name: String, reason: String },
}
