use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};

use super::models::{
    DatasetSummary, DatasetView, NamingPatternRequest, PreviewResponse, RenameInfo,
    SelectionRequest, SelectionResponse, SessionStatus, TemplateInfo,
};
use super::multipart_parser::MultipartParser;
use super::AppState;
use crate::batch::{RunError, ARCHIVE_FILENAME};
use crate::dataset::normalize_record;
use crate::session::SessionError;
use crate::{metrics, ErrorResponse};

fn run_error_response(error: RunError) -> HttpResponse {
    match error {
        RunError::Precondition(message) => HttpResponse::UnprocessableEntity()
            .json(ErrorResponse::new("PreconditionError", &message)),
        RunError::RunInProgress => HttpResponse::Conflict()
            .json(ErrorResponse::new("RunInProgress", &error.to_string())),
        RunError::Aggregation(_) => HttpResponse::InternalServerError()
            .json(ErrorResponse::new("AggregationError", &error.to_string())),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Dataset",
    post,
    path = "/dataset",
    request_body(content_type = "multipart/form-data", description = "Spreadsheet in a `file` field"),
    responses(
        (status = 200, description = "Dataset loaded", body = DatasetSummary),
        (status = 400, description = "Spreadsheet could not be loaded", body = ErrorResponse)
    )
)]
pub async fn upload_dataset(payload: Multipart, state: web::Data<AppState>) -> impl Responder {
    let files = match MultipartParser::parse_files(payload, state.config.max_upload_bytes).await {
        Ok(files) => files,
        Err(e) => return HttpResponse::from(e),
    };
    let Some(upload) = files.into_iter().next() else {
        return HttpResponse::BadRequest().json(ErrorResponse::bad_request("No file uploaded"));
    };

    log::info!("Loading dataset from '{}'", upload.filename);
    let mut session = state.session.write();
    match session.load_dataset(&upload.data) {
        Ok(renames) => {
            let dataset = match session.dataset() {
                Some(dataset) => dataset,
                None => {
                    return HttpResponse::InternalServerError()
                        .json(ErrorResponse::internal_error("Dataset missing after load"))
                }
            };
            let mut status = format!("Loaded {} rows", dataset.len());
            for rename in &renames {
                status.push_str(&format!("\n- Warning: {}", rename.warning()));
            }
            HttpResponse::Ok().json(DatasetSummary {
                rows: dataset.len(),
                columns: dataset.columns().to_vec(),
                renames: renames.iter().map(RenameInfo::from).collect(),
                status,
            })
        }
        Err(e) => {
            log::error!("Failed to load dataset '{}': {}", upload.filename, e);
            HttpResponse::BadRequest().json(ErrorResponse::new("LoadError", &e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Dataset",
    get,
    path = "/dataset",
    responses(
        (status = 200, description = "Loaded rows as display strings", body = DatasetView),
        (status = 404, description = "No dataset loaded", body = ErrorResponse)
    )
)]
pub async fn get_dataset(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.read();
    let Some(dataset) = session.dataset() else {
        return HttpResponse::NotFound().json(ErrorResponse::not_found("No dataset loaded"));
    };

    let rows: Vec<Vec<String>> = dataset
        .records()
        .map(|record| {
            normalize_record(&record)
                .iter()
                .map(|(_, value)| value.to_string())
                .collect()
        })
        .collect();

    HttpResponse::Ok().json(DatasetView {
        columns: dataset.columns().to_vec(),
        rows,
        selection: session.selection().to_vec(),
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Dataset",
    put,
    path = "/selection",
    request_body = SelectionRequest,
    responses(
        (status = 200, description = "Selection replaced", body = SelectionResponse),
        (status = 400, description = "Index out of range or no dataset", body = ErrorResponse)
    )
)]
pub async fn set_selection(
    req: web::Json<SelectionRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let mut session = state.session.write();
    match session.set_selection(&req.indices) {
        Ok(selection) => {
            log::info!("Selected {} row(s)", selection.len());
            HttpResponse::Ok().json(SelectionResponse {
                selection: selection.to_vec(),
                count: selection.len(),
            })
        }
        Err(e) => {
            HttpResponse::BadRequest().json(ErrorResponse::new("SelectionError", &e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    post,
    path = "/templates",
    request_body(content_type = "multipart/form-data", description = "One or more .docx files in `file*` fields"),
    responses(
        (status = 200, description = "Templates appended; full list returned", body = [TemplateInfo]),
        (status = 400, description = "A file is not a docx template; nothing appended", body = ErrorResponse)
    )
)]
pub async fn upload_templates(payload: Multipart, state: web::Data<AppState>) -> impl Responder {
    let files = match MultipartParser::parse_files(payload, state.config.max_upload_bytes).await {
        Ok(files) => files,
        Err(e) => return HttpResponse::from(e),
    };

    let uploads = files.into_iter().map(|f| (f.filename, f.data)).collect();
    let mut session = state.session.write();
    match session.add_templates(uploads) {
        Ok(()) => {
            log::info!("{} template(s) loaded", session.templates().len());
            HttpResponse::Ok().json(TemplateInfo::list(session.templates()))
        }
        Err(e) => {
            log::error!("Error loading templates: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse::new("LoadError", &e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Loaded templates in upload order", body = [TemplateInfo])
    )
)]
pub async fn list_templates(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.read();
    HttpResponse::Ok().json(TemplateInfo::list(session.templates()))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    delete,
    path = "/templates",
    responses(
        (status = 200, description = "Templates cleared", body = [TemplateInfo])
    )
)]
pub async fn clear_templates(state: web::Data<AppState>) -> impl Responder {
    let mut session = state.session.write();
    session.clear_templates();
    HttpResponse::Ok().json(TemplateInfo::list(session.templates()))
}

#[utoipa::path(
    context_path = "/api",
    tag = "Templates",
    put,
    path = "/templates/{index}/naming-pattern",
    request_body = NamingPatternRequest,
    responses(
        (status = 200, description = "Naming pattern updated", body = TemplateInfo),
        (status = 400, description = "Empty pattern", body = ErrorResponse),
        (status = 404, description = "No template at this index", body = ErrorResponse)
    ),
    params(
        ("index" = usize, Path, description = "Position of the template in upload order")
    )
)]
pub async fn set_naming_pattern(
    index: web::Path<usize>,
    req: web::Json<NamingPatternRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let index = index.into_inner();
    let mut session = state.session.write();
    match session.set_naming_pattern(index, &req.naming_pattern) {
        Ok(template) => {
            log::info!(
                "Naming pattern for '{}' set to '{}'",
                template.name,
                template.naming_pattern
            );
            HttpResponse::Ok().json(TemplateInfo::from_template(index, template))
        }
        Err(e @ SessionError::TemplateNotFound(_)) => {
            HttpResponse::NotFound().json(ErrorResponse::not_found(&e.to_string()))
        }
        Err(e @ SessionError::EmptyNamingPattern) => {
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generation",
    get,
    path = "/status",
    responses(
        (status = 200, description = "What a run would have to work with", body = SessionStatus)
    )
)]
pub async fn get_status(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.read();
    let status = SessionStatus::new(
        &session.readiness(),
        state.orchestrator.is_running(),
        session.dataset().map(|d| d.len()).unwrap_or(0),
        session.templates().len(),
        session.selection().len(),
    );
    HttpResponse::Ok().json(status)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generation",
    post,
    path = "/preview",
    responses(
        (status = 200, description = "Converted previews plus per-pair failures", body = PreviewResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
        (status = 422, description = "Data, templates or selection missing", body = ErrorResponse)
    )
)]
pub async fn generate_previews(state: web::Data<AppState>) -> impl Responder {
    log::info!("Generating previews");
    match state.orchestrator.preview(&state.session).await {
        Ok(run) => HttpResponse::Ok().json(PreviewResponse::new(&run.report, &run.previews)),
        Err(e) => run_error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generation",
    post,
    path = "/documents",
    responses(
        (status = 200, description = "Zip archive of rendered documents"),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
        (status = 422, description = "Data, templates or selection missing", body = ErrorResponse),
        (status = 500, description = "Archive could not be built", body = ErrorResponse)
    )
)]
pub async fn download_documents(state: web::Data<AppState>) -> impl Responder {
    log::info!("Preparing download");
    match state.orchestrator.package(&state.session).await {
        Ok(run) => HttpResponse::Ok()
            .content_type("application/zip")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", ARCHIVE_FILENAME),
            ))
            .insert_header(("X-Generated-Count", run.report.generated.to_string()))
            .insert_header(("X-Skipped-Count", run.report.skipped().to_string()))
            .insert_header(("X-Generation-Status", run.report.status.replace('\n', " ")))
            .body(run.archive),
        Err(e) => run_error_response(e),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generation",
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Generation metrics in Prometheus text format")
    )
)]
pub async fn domain_metrics() -> impl Responder {
    match metrics::gather_text() {
        Ok(text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(text),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e)),
    }
}
