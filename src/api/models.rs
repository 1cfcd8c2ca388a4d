use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::batch::{GeneratedDocument, PairFailure, RunReport};
use crate::dataset::ColumnRename;
use crate::session::{Readiness, Template};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RenameInfo {
    pub original: String,
    pub sanitized: String,
    pub warning: String,
}

impl From<&ColumnRename> for RenameInfo {
    fn from(rename: &ColumnRename) -> Self {
        Self {
            original: rename.original.clone(),
            sanitized: rename.sanitized.clone(),
            warning: rename.warning(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub renames: Vec<RenameInfo>,
    pub status: String,
}

/// Loaded rows as display strings, for the selection table.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub selection: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectionRequest {
    pub indices: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectionResponse {
    pub selection: Vec<usize>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateInfo {
    pub index: usize,
    pub name: String,
    pub naming_pattern: String,
    pub size_bytes: usize,
}

impl TemplateInfo {
    pub fn from_template(index: usize, template: &Template) -> Self {
        Self {
            index,
            name: template.name.clone(),
            naming_pattern: template.naming_pattern.clone(),
            size_bytes: template.content.len(),
        }
    }

    pub fn list(templates: &[Template]) -> Vec<Self> {
        templates
            .iter()
            .enumerate()
            .map(|(i, t)| Self::from_template(i, t))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NamingPatternRequest {
    pub naming_pattern: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub has_data: bool,
    pub has_templates: bool,
    pub has_selection: bool,
    pub can_generate: bool,
    pub running: bool,
    pub rows: usize,
    pub templates: usize,
    pub selected: usize,
}

impl SessionStatus {
    pub fn new(readiness: &Readiness, running: bool, rows: usize, templates: usize, selected: usize) -> Self {
        Self {
            has_data: readiness.has_data,
            has_templates: readiness.has_templates,
            has_selection: readiness.has_selection,
            can_generate: readiness.can_generate(),
            running,
            rows,
            templates,
            selected,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PairFailureInfo {
    pub template: String,
    pub record_index: usize,
    pub filename: String,
    pub category: String,
    pub message: String,
}

impl From<&PairFailure> for PairFailureInfo {
    fn from(failure: &PairFailure) -> Self {
        Self {
            template: failure.template.clone(),
            record_index: failure.record_index,
            filename: failure.filename.clone(),
            category: failure.category.clone(),
            message: failure.message.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewItem {
    pub filename: String,
    pub template: String,
    pub record_index: usize,
    pub content_base64: String,
}

impl PreviewItem {
    pub fn from_document(document: &GeneratedDocument) -> Self {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        Self {
            filename: document.filename.clone(),
            template: document.template.clone(),
            record_index: document.record_index,
            content_base64: BASE64.encode(&document.bytes),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PreviewResponse {
    pub run_id: Uuid,
    pub status: String,
    pub generated: usize,
    pub skipped: usize,
    pub previews: Vec<PreviewItem>,
    pub failures: Vec<PairFailureInfo>,
}

impl PreviewResponse {
    pub fn new(report: &RunReport, previews: &[GeneratedDocument]) -> Self {
        Self {
            run_id: report.run_id,
            status: report.status.clone(),
            generated: report.generated,
            skipped: report.skipped(),
            previews: previews.iter().map(PreviewItem::from_document).collect(),
            failures: report.failures.iter().map(PairFailureInfo::from).collect(),
        }
    }
}
