//! Output filename templating.
//!
//! Naming patterns are plain text with `{{ column }}` placeholders. This is a
//! literal substitution pass, not a template engine: no filters, no
//! conditionals, and a value containing braces is never expanded again.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

use crate::dataset::NormalizedRecord;

const FALLBACK_PREFIX: &str = "document";
const FALLBACK_VALUE: &str = "output";
const FALLBACK_COLUMN: &str = "id";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap();
}

/// Build the output filename for one record.
///
/// Placeholders naming a record key are replaced by the key's value; unknown
/// placeholders are left for the cleanup pass. The extension is appended if
/// missing, then everything except letters, digits, space, `_`, `-` and `.`
/// is stripped. Never fails: an unusable result falls back to
/// `document_<first value><extension>`.
pub fn output_filename(pattern: &str, record: &NormalizedRecord, extension: &str) -> String {
    let extension = normalize_extension(extension);
    match substitute(pattern, record, &extension) {
        Some(name) => name,
        None => {
            log::debug!(
                "Naming pattern '{}' produced no usable filename, using fallback",
                pattern
            );
            fallback_filename(record, &extension)
        }
    }
}

/// Default naming pattern for a freshly uploaded template:
/// `<template stem>_{{ <first column> }}`.
pub fn default_naming_pattern(template_filename: &str, first_column: Option<&str>) -> String {
    let stem = Path::new(template_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| template_filename.to_string());
    format!(
        "{}_{{{{ {} }}}}",
        stem,
        first_column.unwrap_or(FALLBACK_COLUMN)
    )
}

fn substitute(pattern: &str, record: &NormalizedRecord, extension: &str) -> Option<String> {
    let mut filename = PLACEHOLDER
        .replace_all(pattern, |caps: &Captures<'_>| match record.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned();

    if !filename.ends_with(extension) {
        filename.push_str(extension);
    }

    let cleaned = clean_filename(&filename);
    let stem = cleaned.strip_suffix(extension).unwrap_or(&cleaned);
    if !cleaned.ends_with(extension) || !stem.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(cleaned)
}

fn fallback_filename(record: &NormalizedRecord, extension: &str) -> String {
    let value = record.first_value().map(clean_filename).unwrap_or_default();
    let value = if value.chars().any(char::is_alphanumeric) {
        value
    } else {
        FALLBACK_VALUE.to_string()
    };
    format!("{}_{}{}", FALLBACK_PREFIX, value, clean_filename(extension))
}

/// Keep letters, digits, space, `_`, `-` and `.`.
pub fn clean_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.'))
        .collect()
}

fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}
