use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod batch;
pub mod config;
pub mod dataset;
pub mod generators;
pub mod metrics;
pub mod session;

pub use crate::api::AppState;
pub use crate::config::AppConfig;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

pub async fn run() -> std::io::Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::api::handlers::upload_dataset,
            crate::api::handlers::get_dataset,
            crate::api::handlers::set_selection,
            crate::api::handlers::upload_templates,
            crate::api::handlers::list_templates,
            crate::api::handlers::clear_templates,
            crate::api::handlers::set_naming_pattern,
            crate::api::handlers::get_status,
            crate::api::handlers::generate_previews,
            crate::api::handlers::download_documents,
            crate::api::handlers::domain_metrics
        ),
        components(
            schemas(
                api::models::RenameInfo,
                api::models::DatasetSummary,
                api::models::DatasetView,
                api::models::SelectionRequest,
                api::models::SelectionResponse,
                api::models::TemplateInfo,
                api::models::NamingPatternRequest,
                api::models::SessionStatus,
                api::models::PairFailureInfo,
                api::models::PreviewItem,
                api::models::PreviewResponse,
                ErrorResponse,
            )
        ),
        tags(
            (name = "Dataset", description = "Spreadsheet upload and row selection."),
            (name = "Templates", description = "Document template upload and naming patterns."),
            (name = "Generation", description = "Preview and package runs.")
        )
    )]
    struct ApiDoc;

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };
    log::info!(
        "Converter: {} (timeout {:?}, {} concurrent)",
        config.libreoffice_path.display(),
        config.conversion_timeout,
        config.conversion_concurrency
    );

    let bind = (config.bind_address.clone(), config.port);
    let app_state = web::Data::new(AppState::new(config));

    let prometheus = PrometheusMetricsBuilder::new("mailmerge_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5010")
            .allowed_origin("http://127.0.0.1:5010")
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![
                "content-disposition",
                "x-generated-count",
                "x-skipped-count",
                "x-generation-status",
            ])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(web::scope("/api").configure(api::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind(bind)?
    .run()
    .await
}
