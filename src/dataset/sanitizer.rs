//! Column label sanitizing.
//!
//! Spreadsheet headers are arbitrary text; template placeholders are not.
//! Every label is turned into an identifier (`[letter|_][letter|digit|_]*`)
//! and duplicates are disambiguated with numeric suffixes. Names the template
//! engine reads as literals get a trailing `_`.

use std::collections::{HashMap, HashSet};

use super::model::ColumnRename;

/// Identifiers that templates parse as literals rather than variable lookups.
pub const RESERVED_NAMES: [&str; 6] = ["true", "false", "none", "True", "False", "None"];

/// Output of [`sanitize_columns`]: one name per input label, plus a rename
/// entry for every label that did not survive unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedColumns {
    pub names: Vec<String>,
    pub renames: Vec<ColumnRename>,
}

/// Sanitize a header row into unique template variable names.
///
/// The first occurrence of a sanitized name keeps it bare; later occurrences
/// get `_1`, `_2`, ... in first-seen order. Suffixes never reuse a name that
/// another label sanitizes to, so the output is always unique.
pub fn sanitize_columns<S: AsRef<str>>(labels: &[S]) -> SanitizedColumns {
    let bases: Vec<String> = labels
        .iter()
        .enumerate()
        .map(|(index, label)| sanitize_label(label.as_ref(), index))
        .collect();

    let reserved: HashSet<&str> = bases.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(bases.len());
    let mut counters: HashMap<&str, usize> = HashMap::new();
    let mut names = Vec::with_capacity(bases.len());

    for base in &bases {
        let name = if used.contains(base) {
            let counter = counters.entry(base.as_str()).or_insert(0);
            loop {
                *counter += 1;
                let candidate = format!("{}_{}", base, counter);
                if !reserved.contains(candidate.as_str()) && !used.contains(&candidate) {
                    break candidate;
                }
            }
        } else {
            base.clone()
        };
        used.insert(name.clone());
        names.push(name);
    }

    let renames = labels
        .iter()
        .zip(names.iter())
        .filter(|(label, name)| label.as_ref() != name.as_str())
        .map(|(label, name)| ColumnRename {
            original: label.as_ref().to_string(),
            sanitized: name.clone(),
        })
        .collect();

    SanitizedColumns { names, renames }
}

/// Sanitize one label without collision handling.
///
/// Labels with no letter or digit left (empty, whitespace, pure punctuation)
/// fall back to `column_<n>` with `n` the 1-based column position. A result
/// in [`RESERVED_NAMES`] gets a trailing `_`.
pub fn sanitize_label(label: &str, index: usize) -> String {
    let replaced: String = label
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect();

    let mut result = String::with_capacity(replaced.len() + 1);
    if replaced
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() && !c.is_alphabetic())
    {
        result.push('_');
    }
    result.extend(
        replaced
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }),
    );

    if !result.chars().any(char::is_alphanumeric) {
        return format!("column_{}", index + 1);
    }

    if RESERVED_NAMES.contains(&result.as_str()) {
        result.push('_');
    }
    result
}

/// Whether `name` already satisfies the identifier grammar.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label_rules() {
        assert_eq!(sanitize_label("  Customer Name ", 0), "Customer_Name");
        assert_eq!(sanitize_label("e-mail", 0), "e_mail");
        assert_eq!(sanitize_label("2023 Revenue", 0), "_2023_Revenue");
        assert_eq!(sanitize_label("Price ($)", 0), "Price____");
        assert_eq!(sanitize_label("Größe", 0), "Größe");
    }

    #[test]
    fn test_sanitize_label_fallback() {
        assert_eq!(sanitize_label("", 0), "column_1");
        assert_eq!(sanitize_label("   ", 2), "column_3");
        assert_eq!(sanitize_label("#!?", 4), "column_5");
    }

    #[test]
    fn test_literal_names_are_suffixed() {
        assert_eq!(sanitize_label("True", 0), "True_");
        assert_eq!(sanitize_label(" none ", 0), "none_");
        assert_eq!(sanitize_label("False_", 0), "False_");
        assert_eq!(sanitize_label("Truth", 0), "Truth");
        assert_eq!(sanitize_label("in", 0), "in");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("name"));
        assert!(is_identifier("_2023"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2023"));
        assert!(!is_identifier("a b"));
    }

    #[test]
    fn test_suffix_skips_reserved_names() {
        let result = sanitize_columns(&["a", "a", "a_1"]);
        assert_eq!(result.names, vec!["a", "a_2", "a_1"]);
    }
}
