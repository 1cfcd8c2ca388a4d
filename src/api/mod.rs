//! HTTP surface: upload, select, preview and download.

pub mod handlers;
pub mod models;
pub mod multipart_parser;

use actix_web::web;
use parking_lot::RwLock;

use crate::batch::BatchOrchestrator;
use crate::config::AppConfig;
use crate::session::Session;

pub struct AppState {
    pub session: RwLock<Session>,
    pub orchestrator: BatchOrchestrator,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let orchestrator = BatchOrchestrator::from_config(&config);
        Self::with_orchestrator(config, orchestrator)
    }

    pub fn with_orchestrator(config: AppConfig, orchestrator: BatchOrchestrator) -> Self {
        Self {
            session: RwLock::new(Session::new()),
            orchestrator,
            config,
        }
    }
}

/// Routes under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/dataset")
            .route(web::get().to(handlers::get_dataset))
            .route(web::post().to(handlers::upload_dataset)),
    )
    .service(web::resource("/selection").route(web::put().to(handlers::set_selection)))
    .service(
        web::resource("/templates")
            .route(web::get().to(handlers::list_templates))
            .route(web::post().to(handlers::upload_templates))
            .route(web::delete().to(handlers::clear_templates)),
    )
    .service(
        web::resource("/templates/{index}/naming-pattern")
            .route(web::put().to(handlers::set_naming_pattern)),
    )
    .service(web::resource("/status").route(web::get().to(handlers::get_status)))
    .service(web::resource("/preview").route(web::post().to(handlers::generate_previews)))
    .service(web::resource("/documents").route(web::post().to(handlers::download_documents)))
    .service(web::resource("/metrics").route(web::get().to(handlers::domain_metrics)));
}
