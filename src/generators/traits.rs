//! Traits for generator system standardization.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::GeneratorError;

/// Converts a rendered document into another format.
///
/// Implementations write the converted file next to `input` and return its
/// path. Each call must be safe to run concurrently with other calls on
/// different input directories.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, input: &Path, target_format: &str) -> Result<PathBuf, GeneratorError>;
}
