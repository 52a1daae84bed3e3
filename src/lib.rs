use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};

use crate::domain::FolderName;
use crate::drive::DriveProvider;
use crate::drive::google::GoogleDrive;
use crate::drive::memory::InMemoryDrive;
use crate::models::config::{DriveBackend, DriveConfig, ServerConfig};
use crate::services::upload::UploadService;

pub mod client;
pub mod domain;
pub mod drive;
pub mod dto;
pub mod forms;
pub mod models;
pub mod routes;
pub mod services;

/// Build the upload service for the configured drive backend.
pub async fn build_upload_service(config: &DriveConfig) -> std::io::Result<UploadService> {
    let root_folder =
        FolderName::try_new(config.root_folder.clone()).map_err(std::io::Error::other)?;
    let drive: Arc<dyn DriveProvider> = match config.backend {
        DriveBackend::Google => Arc::new(
            GoogleDrive::new(config.google.clone())
                .await
                .map_err(|err| std::io::Error::other(err.to_string()))?,
        ),
        DriveBackend::Memory => {
            log::warn!(
                "Using in-memory drive: every uploaded file stays in process memory until restart"
            );
            Arc::new(InMemoryDrive::new())
        }
    };
    Ok(UploadService::new(drive, root_folder))
}

fn build_cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allow_any_header()
        .max_age(3600)
}

pub async fn run(server_config: ServerConfig) -> std::io::Result<()> {
    let upload_service = web::Data::new(build_upload_service(&server_config.drive).await?);
    let allowed_origins = server_config.allowed_origins.clone();

    log::info!(
        "Starting server on {}:{} (root folder: {})",
        server_config.address,
        server_config.port,
        upload_service.root_folder()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&allowed_origins))
            .wrap(Logger::default())
            .app_data(upload_service.clone())
            .service(routes::main::index)
            .service(routes::main::upload_files)
    })
    .bind((server_config.address.as_str(), server_config.port))?
    .run()
    .await
}
