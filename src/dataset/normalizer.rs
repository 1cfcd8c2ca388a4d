use chrono::Timelike;
use serde::Serialize;
use std::collections::BTreeMap;

use super::model::{CellValue, Record};

/// A record flattened to display strings, in column order.
///
/// Built fresh for every generation run; it is the only form of a record the
/// renderer and the filename templater ever see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    fields: Vec<(String, String)>,
}

impl NormalizedRecord {
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First column's value, used by the filename fallback.
    pub fn first_value(&self) -> Option<&str> {
        self.fields.first().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Template context for the document renderer.
    pub fn to_context(&self) -> BTreeMap<&str, &str> {
        self.iter().collect()
    }
}

/// Convert one dataset row into display strings. Never fails.
pub fn normalize_record(record: &Record<'_>) -> NormalizedRecord {
    NormalizedRecord {
        fields: record
            .iter()
            .map(|(column, value)| (column.to_string(), display_value(value)))
            .collect(),
    }
}

/// Canonical display string of a single cell.
pub fn display_value(value: &CellValue) -> String {
    if value.is_missing() {
        return String::new();
    }

    match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Number(f) => format_number(*f),
        CellValue::Boolean(true) => "True".to_string(),
        CellValue::Boolean(false) => "False".to_string(),
        CellValue::DateTime(dt) => {
            if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 {
                dt.format("%Y-%m-%d").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
        CellValue::Missing => String::new(),
    }
}

fn format_number(value: f64) -> String {
    // Whole numbers print without a fractional part.
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
