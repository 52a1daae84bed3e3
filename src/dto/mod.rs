use serde::{Deserialize, Serialize};

use crate::domain::UploadedFile;
use crate::services::upload::UploadOutcome;

pub const UPLOAD_SUCCEEDED: &str = "Files uploaded successfully";
pub const FILES_MISSING: &str = "Files are missing";
pub const UPLOAD_FAILED: &str = "File upload failed";

/// JSON body returned by the upload endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<UploadedFileDto>>,
}

impl UploadResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            files: None,
        }
    }
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            success: true,
            message: UPLOAD_SUCCEEDED.to_string(),
            files: Some(outcome.files.into_iter().map(UploadedFileDto::from).collect()),
        }
    }
}

/// One uploaded file in the success payload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileDto {
    pub file_id: String,
    pub file_name: String,
}

impl From<UploadedFile> for UploadedFileDto {
    fn from(file: UploadedFile) -> Self {
        let (id, name) = file.into_parts();
        Self {
            file_id: id.into_string(),
            file_name: name.into_string(),
        }
    }
}
