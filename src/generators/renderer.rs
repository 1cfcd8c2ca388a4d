//! Docx template rendering.
//!
//! A docx file is a zip package of XML parts. The parts that carry text
//! (body, headers, footers, notes) are rendered as Jinja templates against
//! the normalized record; every other part is copied through untouched.

use lazy_static::lazy_static;
use minijinja::{AutoEscape, Environment, ErrorKind, UndefinedBehavior};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use tempfile::Builder;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::GeneratorError;
use crate::dataset::NormalizedRecord;

const MAIN_PART: &str = "word/document.xml";

lazy_static! {
    static ref TEMPLATE_PART: Regex =
        Regex::new(r"^word/(document|header\d*|footer\d*|footnotes|endnotes)\.xml$").unwrap();
    static ref SPLIT_EXPRESSION: Regex =
        Regex::new(r"(?s)\{(?:<[^>]*>)*\{(.*?)\}(?:<[^>]*>)*\}").unwrap();
    static ref SPLIT_STATEMENT: Regex =
        Regex::new(r"(?s)\{(?:<[^>]*>)*%(.*?)%(?:<[^>]*>)*\}").unwrap();
    static ref XML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Fill `template` with `record` and write the resulting docx to `destination`.
///
/// The template bytes are materialized to a temporary file for the duration
/// of the call; the file is removed on every return path.
pub fn render_document(
    template: &[u8],
    record: &NormalizedRecord,
    destination: &Path,
) -> Result<(), GeneratorError> {
    render_document_with_scratch(template, record, destination, &std::env::temp_dir())
}

/// Same as [`render_document`], with the temporary template file placed in
/// `scratch_dir`.
pub fn render_document_with_scratch(
    template: &[u8],
    record: &NormalizedRecord,
    destination: &Path,
    scratch_dir: &Path,
) -> Result<(), GeneratorError> {
    let mut template_file = Builder::new()
        .prefix("template-")
        .suffix(".docx")
        .tempfile_in(scratch_dir)
        .map_err(GeneratorError::TempFile)?;
    template_file
        .write_all(template)
        .map_err(GeneratorError::TempFile)?;
    template_file.flush().map_err(GeneratorError::TempFile)?;

    let source = File::open(template_file.path()).map_err(GeneratorError::TempFile)?;
    let mut archive = ZipArchive::new(BufReader::new(source))
        .map_err(|e| GeneratorError::InvalidTemplate(e.to_string()))?;

    let rendered = render_package(&mut archive, record)?;
    fs::write(destination, rendered).map_err(GeneratorError::SaveDocument)?;

    log::debug!(
        "Rendered {} ({} fields)",
        destination.display(),
        record.len()
    );
    Ok(())
}

/// Check that `bytes` look like a docx package with a main document part.
pub fn validate_template(bytes: &[u8]) -> Result<(), String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    if archive.file_names().any(|name| name == MAIN_PART) {
        Ok(())
    } else {
        Err(format!("missing {}", MAIN_PART))
    }
}

fn render_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    record: &NormalizedRecord,
) -> Result<Vec<u8>, GeneratorError> {
    if !archive.file_names().any(|name| name == MAIN_PART) {
        return Err(GeneratorError::InvalidTemplate(format!(
            "missing {}",
            MAIN_PART
        )));
    }

    let env = template_environment();
    let context = record.to_context();
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| GeneratorError::InvalidTemplate(e.to_string()))?;
        let name = entry.name().to_string();

        if TEMPLATE_PART.is_match(&name) {
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|e| GeneratorError::InvalidTemplate(format!("{}: {}", name, e)))?;
            let rendered = render_part(&env, &name, &xml, &context)?;

            writer
                .start_file(name.as_str(), options)
                .map_err(|e| GeneratorError::SaveDocument(e.into()))?;
            writer
                .write_all(rendered.as_bytes())
                .map_err(GeneratorError::SaveDocument)?;
        } else {
            writer
                .raw_copy_file(entry)
                .map_err(|e| GeneratorError::SaveDocument(e.into()))?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| GeneratorError::SaveDocument(e.into()))?;
    Ok(cursor.into_inner())
}

fn template_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.set_keep_trailing_newline(true);
    env
}

fn render_part(
    env: &Environment<'static>,
    name: &str,
    xml: &str,
    context: &BTreeMap<&str, &str>,
) -> Result<String, GeneratorError> {
    let source = merge_split_tags(xml);
    env.render_named_str(name, &source, context)
        .map_err(|e| match e.kind() {
            ErrorKind::UndefinedError => GeneratorError::UnresolvedPlaceholder(format!(
                "{} ({})",
                e.detail().unwrap_or("undefined value"),
                name
            )),
            ErrorKind::SyntaxError => GeneratorError::TemplateSyntax(e.to_string()),
            _ => GeneratorError::TemplateRender(e.to_string()),
        })
}

/// Word splits typed text into runs at arbitrary points, so `{{ name }}` may
/// arrive as `{{</w:t></w:r><w:r><w:t> name }}`. Drop the markup inside tag
/// delimiters and undo XML escaping so the expression parses.
fn merge_split_tags(xml: &str) -> String {
    let merged = SPLIT_EXPRESSION.replace_all(xml, |caps: &Captures<'_>| {
        format!("{{{{{}}}}}", clean_tag_body(&caps[1]))
    });
    SPLIT_STATEMENT
        .replace_all(&merged, |caps: &Captures<'_>| {
            format!("{{%{}%}}", clean_tag_body(&caps[1]))
        })
        .into_owned()
}

fn clean_tag_body(body: &str) -> String {
    XML_TAG
        .replace_all(body, "")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_split_expression() {
        let xml = "<w:t>{{</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t> name }}</w:t>";
        assert_eq!(merge_split_tags(xml), "<w:t>{{ name }}</w:t>");
    }

    #[test]
    fn test_merge_split_statement_and_entities() {
        let xml = "<w:t>{%</w:t><w:t> if a &gt; 1 %}</w:t>";
        assert_eq!(merge_split_tags(xml), "<w:t>{% if a > 1 %}</w:t>");
    }

    #[test]
    fn test_plain_text_untouched() {
        let xml = "<w:t>no tags { here }</w:t>";
        assert_eq!(merge_split_tags(xml), xml);
    }

    #[test]
    fn test_template_part_names() {
        assert!(TEMPLATE_PART.is_match("word/document.xml"));
        assert!(TEMPLATE_PART.is_match("word/header2.xml"));
        assert!(TEMPLATE_PART.is_match("word/footnotes.xml"));
        assert!(!TEMPLATE_PART.is_match("word/styles.xml"));
        assert!(!TEMPLATE_PART.is_match("word/media/image1.png"));
    }

    #[test]
    fn test_validate_template_rejects_non_zip() {
        assert!(validate_template(b"plain text").is_err());
    }
}
