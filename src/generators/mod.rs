//! Generators module - per-pair document production.
//!
//! One (template, record) pair goes through:
//! - `naming` - output filename from the template's naming pattern
//! - `renderer` - docx template filled with the record
//! - `engine` - optional external conversion to PDF
//!
//! Every failure in here is a [`GeneratorError`] and stays scoped to the pair.

pub mod engine;
pub mod naming;
pub mod renderer;
pub mod traits;
pub mod validation;

pub use engine::LibreOfficeEngine;
pub use naming::{default_naming_pattern, output_filename};
pub use renderer::render_document;
pub use traits::DocumentConverter;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DOCX_EXTENSION: &str = ".docx";
pub const PDF_EXTENSION: &str = ".pdf";
pub const PDF_FORMAT: &str = "pdf";

/// Errors that can occur while generating a single document.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to create temporary file: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("template is not a valid docx package: {0}")]
    InvalidTemplate(String),
    #[error("unresolved placeholder: {0}")]
    UnresolvedPlaceholder(String),
    #[error("template syntax error: {0}")]
    TemplateSyntax(String),
    #[error("template rendering failed: {0}")]
    TemplateRender(String),
    #[error("failed to save rendered document: {0}")]
    SaveDocument(#[source] std::io::Error),
    #[error("conversion process could not be started: {0}")]
    ConversionIo(#[source] std::io::Error),
    #[error("conversion process exited with status {code}: {stderr}")]
    ConversionFailed { code: i32, stderr: String },
    #[error("conversion process did not finish within {0:?}")]
    ConversionTimeout(Duration),
    #[error("converted file was not produced: {0}")]
    ArtifactNotProduced(PathBuf),
    #[error("failed to read converted file: {0}")]
    ReadArtifact(#[source] std::io::Error),
    #[error("generation task aborted: {0}")]
    Task(String),
}

impl GeneratorError {
    /// Category name used in run reports and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnresolvedPlaceholder(_) => "TemplateResolutionError",
            Self::TemplateSyntax(_) | Self::TemplateRender(_) | Self::InvalidTemplate(_) => {
                "TemplateSyntaxError"
            }
            Self::ConversionIo(_) | Self::ConversionFailed { .. } => "ConversionProcessError",
            Self::ConversionTimeout(_) | Self::ArtifactNotProduced(_) => "ConversionTimeoutError",
            Self::TempFile(_)
            | Self::TempDir(_)
            | Self::SaveDocument(_)
            | Self::ReadArtifact(_)
            | Self::Task(_) => "RenderIoError",
        }
    }
}
