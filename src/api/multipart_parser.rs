use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use sanitize_filename::sanitize;

use crate::ErrorResponse;

/// One uploaded file: original (sanitized) filename and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Upload exceeds the limit of {0} bytes")]
    TooLarge(usize),
    #[error("No file field in multipart payload")]
    NoFile,
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::IoError(_) => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&format!("{}", error))),
            MultipartParseError::TooLarge(_) => HttpResponse::PayloadTooLarge()
                .json(ErrorResponse::new("PayloadTooLarge", &format!("{}", error))),
            _ => HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!("{}", error))),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Collect every field whose name starts with `file`, in upload order.
    /// `max_bytes` caps the combined size of all files.
    pub async fn parse_files(
        mut multipart: Multipart,
        max_bytes: usize,
    ) -> Result<Vec<UploadedFile>, MultipartParseError> {
        let mut files = Vec::new();
        let mut total = 0usize;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| MultipartParseError::FieldError("Field name not found".to_string()))?
                .to_string();
            if !name.starts_with("file") {
                continue;
            }

            let filename = match content_disposition.get_filename() {
                Some(fname) => sanitize(fname),
                None => format!("file_{}", files.len()),
            };

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                total += chunk.len();
                if total > max_bytes {
                    return Err(MultipartParseError::TooLarge(max_bytes));
                }
                data.extend_from_slice(&chunk);
            }

            log::debug!("Received upload '{}' ({} bytes)", filename, data.len());
            files.push(UploadedFile { filename, data });
        }

        if files.is_empty() {
            return Err(MultipartParseError::NoFile);
        }
        Ok(files)
    }
}
