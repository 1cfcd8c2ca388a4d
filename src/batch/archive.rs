//! In-memory deliverable archive.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const ARCHIVE_FILENAME: &str = "documents.zip";

/// Deflate-compressed zip built entirely in memory.
///
/// Entry names are unique: a name that is already present gets `_1`, `_2`,
/// ... inserted before its extension.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            names: HashSet::new(),
        }
    }

    /// Add one entry and return the name it was stored under.
    pub fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<String, String> {
        let name = self.unique_name(filename);
        self.writer
            .start_file(name.as_str(), self.options)
            .map_err(|e| format!("failed to start entry {}: {}", name, e))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| format!("failed to write entry {}: {}", name, e))?;
        self.names.insert(name.clone());
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, String> {
        self.writer
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| format!("failed to finalize archive: {}", e))
    }

    fn unique_name(&self, filename: &str) -> String {
        if !self.names.contains(filename) {
            return filename.to_string();
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        (1..)
            .map(|n| format!("{}_{}{}", stem, n, extension))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| filename.to_string())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
