//! Session state: the loaded dataset, the accumulated templates and the
//! current row selection.
//!
//! There is one session per process. It is replaced piecewise by the load
//! operations below and read by the batch orchestrator at run time.

use sanitize_filename::sanitize;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::dataset::{self, ColumnRename, Dataset, LoadError};
use crate::generators::naming::default_naming_pattern;
use crate::generators::renderer::validate_template;

const FALLBACK_TEMPLATE_NAME: &str = "template.docx";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no dataset loaded")]
    NoDataset,
    #[error("row index {index} is out of range for a dataset of {len} rows")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("template index {0} does not exist")]
    TemplateNotFound(usize),
    #[error("naming pattern must not be empty")]
    EmptyNamingPattern,
}

/// One uploaded document template.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub content: Arc<Vec<u8>>,
    pub naming_pattern: String,
}

impl Template {
    pub fn new(name: impl Into<String>, content: Vec<u8>, naming_pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Arc::new(content),
            naming_pattern: naming_pattern.into(),
        }
    }
}

/// What a run would have to work with right now.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Readiness {
    pub has_data: bool,
    pub has_templates: bool,
    pub has_selection: bool,
}

impl Readiness {
    pub fn can_generate(&self) -> bool {
        self.has_data && self.has_templates && self.has_selection
    }
}

#[derive(Debug, Default)]
pub struct Session {
    dataset: Option<Arc<Dataset>>,
    templates: Vec<Template>,
    selection: Vec<usize>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    /// Parse `bytes` and replace the current dataset with the result.
    ///
    /// On error the previous dataset and selection stay as they were. On
    /// success the selection is cleared; templates are kept.
    pub fn load_dataset(&mut self, bytes: &[u8]) -> Result<Vec<ColumnRename>, LoadError> {
        let loaded = dataset::load_dataset(bytes)?;
        self.replace_dataset(loaded.dataset);
        Ok(loaded.renames)
    }

    /// Install an already-built dataset.
    pub fn replace_dataset(&mut self, dataset: Dataset) {
        log::info!(
            "Dataset replaced: {} rows, {} columns",
            dataset.len(),
            dataset.columns().len()
        );
        self.dataset = Some(Arc::new(dataset));
        self.selection.clear();
    }

    /// Append templates in the given order.
    ///
    /// Every blob is checked before any is appended, so a single bad upload
    /// leaves the list unchanged.
    pub fn add_templates(&mut self, uploads: Vec<(String, Vec<u8>)>) -> Result<(), LoadError> {
        let first_column = self
            .dataset
            .as_ref()
            .and_then(|d| d.first_column().map(str::to_string));

        let mut accepted = Vec::with_capacity(uploads.len());
        for (filename, content) in uploads {
            let mut name = sanitize(&filename);
            if name.is_empty() {
                name = FALLBACK_TEMPLATE_NAME.to_string();
            }
            validate_template(&content).map_err(|reason| LoadError::Template {
                name: name.clone(),
                reason,
            })?;
            let pattern = default_naming_pattern(&name, first_column.as_deref());
            accepted.push(Template::new(name, content, pattern));
        }

        for template in &accepted {
            log::info!(
                "Template '{}' added with naming pattern '{}'",
                template.name,
                template.naming_pattern
            );
        }
        self.templates.extend(accepted);
        Ok(())
    }

    pub fn clear_templates(&mut self) {
        log::info!("Clearing {} templates", self.templates.len());
        self.templates.clear();
    }

    pub fn set_naming_pattern(
        &mut self,
        index: usize,
        pattern: &str,
    ) -> Result<&Template, SessionError> {
        if pattern.trim().is_empty() {
            return Err(SessionError::EmptyNamingPattern);
        }
        let template = self
            .templates
            .get_mut(index)
            .ok_or(SessionError::TemplateNotFound(index))?;
        template.naming_pattern = pattern.to_string();
        Ok(template)
    }

    /// Replace the selection. Indices are deduplicated and kept in dataset
    /// order; nothing changes if any index is out of range.
    pub fn set_selection(&mut self, indices: &[usize]) -> Result<&[usize], SelectionError> {
        let len = self
            .dataset
            .as_ref()
            .map(|d| d.len())
            .ok_or(SelectionError::NoDataset)?;

        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(SelectionError::OutOfRange { index, len });
        }

        let mut selection = indices.to_vec();
        selection.sort_unstable();
        selection.dedup();
        self.selection = selection;
        Ok(&self.selection)
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            has_data: self.dataset.as_ref().is_some_and(|d| !d.is_empty()),
            has_templates: !self.templates.is_empty(),
            has_selection: !self.selection.is_empty(),
        }
    }
}
