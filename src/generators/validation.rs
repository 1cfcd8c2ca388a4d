//! Run precondition checks.
//!
//! A run needs loaded data, at least one template and a non-empty row
//! selection. Missing pieces are collected into one readable message.

use std::fmt;

/// A single unmet precondition.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The piece of session state that is missing
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn no_data() -> Self {
        Self::new("dataset", "No spreadsheet data loaded")
            .with_suggestion("Upload an Excel file with a header row and at least one data row")
    }

    pub fn no_templates() -> Self {
        Self::new("templates", "No templates loaded")
            .with_suggestion("Upload one or more .docx templates")
    }

    pub fn no_selection() -> Self {
        Self::new("selection", "No rows selected")
            .with_suggestion("Select the rows to generate documents for")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn message(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Cannot start generation: {} precondition(s) not met",
            self.errors.len()
        )];
        for (i, error) in self.errors.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, error));
        }
        parts.join("\n")
    }

    /// Ok if no errors, Err with the formatted message otherwise.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.message())
        }
    }
}

/// Check everything a run needs before any work starts.
pub fn validate_preconditions(
    record_count: usize,
    template_count: usize,
    selection_count: usize,
) -> Result<(), String> {
    let mut errors = ValidationErrors::new();

    if record_count == 0 {
        errors.add(ValidationError::no_data());
    }
    if template_count == 0 {
        errors.add(ValidationError::no_templates());
    }
    if selection_count == 0 {
        errors.add(ValidationError::no_selection());
    }

    errors.into_result()
}
