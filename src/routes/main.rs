use actix_multipart::{Multipart, MultipartError};
use actix_web::{HttpResponse, Responder, get, post, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use tera::Context;
use thiserror::Error;

use crate::client::FILE_FIELD_PREFIX;
use crate::domain::{FileName, UploadFile};
use crate::dto::{FILES_MISSING, UPLOAD_FAILED, UploadResponse};
use crate::forms::upload::{
    FILE_TOO_LARGE, IMAGES_ONLY, MAX_FILE_SIZE, SELECT_FILES, UPLOAD_ERROR, UPLOAD_SUCCEEDED,
};
use crate::routes::render_template;
use crate::services::upload::UploadService;

pub const UPLOAD_ENDPOINT: &str = "/api/upload";

/// Largest single file part the server buffers, in bytes.
pub const MAX_PART_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
enum UploadFormError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("file part `{0}` exceeds the upload size limit")]
    PartTooLarge(FileName),
}

#[get("/")]
pub async fn index() -> impl Responder {
    let mut context = Context::new();
    context.insert("current_page", "index");
    context.insert("upload_url", UPLOAD_ENDPOINT);
    context.insert("accept", "image/*");
    context.insert("max_file_size", &MAX_FILE_SIZE);
    context.insert("max_file_size_mb", &(MAX_FILE_SIZE / (1024 * 1024)));
    context.insert("file_field_prefix", FILE_FIELD_PREFIX);
    context.insert("select_files", SELECT_FILES);
    context.insert("images_only", IMAGES_ONLY);
    context.insert("file_too_large", FILE_TOO_LARGE);
    context.insert("upload_succeeded", UPLOAD_SUCCEEDED);
    context.insert("upload_error", UPLOAD_ERROR);

    render_template("main/index.html", &context)
}

#[post("/api/upload")]
pub async fn upload_files(
    service: web::Data<UploadService>,
    payload: Multipart,
) -> impl Responder {
    let files = match read_file_parts(payload).await {
        Ok(files) => files,
        Err(e) => {
            log::error!("Error reading upload form: {e:?}");
            return HttpResponse::InternalServerError().json(UploadResponse::failure(UPLOAD_FAILED));
        }
    };

    match service.handle_upload(files).await {
        Ok(outcome) => HttpResponse::Ok().json(UploadResponse::from(outcome)),
        Err(e) if e.is_client_error() => {
            HttpResponse::BadRequest().json(UploadResponse::failure(FILES_MISSING))
        }
        Err(e) => {
            log::error!("Error uploading files: {e:?}");
            HttpResponse::InternalServerError().json(UploadResponse::failure(UPLOAD_FAILED))
        }
    }
}

/// Collect every part whose field name starts with `file`, in arrival order.
async fn read_file_parts(mut payload: Multipart) -> Result<Vec<UploadFile>, UploadFormError> {
    let mut files = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let is_file = field
            .name()
            .is_some_and(|name| name.starts_with(FILE_FIELD_PREFIX));
        if !is_file {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .and_then(|name| FileName::try_from_str(name).ok())
            .unwrap_or_else(FileName::generated);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut content = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            if content.len() + chunk.len() > MAX_PART_SIZE {
                return Err(UploadFormError::PartTooLarge(file_name));
            }
            content.extend_from_slice(&chunk);
        }

        files.push(UploadFile::new(file_name, content_type, content.freeze()));
    }

    Ok(files)
}
