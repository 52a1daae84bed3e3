use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use validator::{Validate, ValidationError};

use crate::client::{ClientError, UploadPayload, UploadTransport};
use crate::dto::UploadResponse;

/// Largest file the form lets through (5 MiB).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub const SELECT_FILES: &str = "Please select files to upload";
pub const IMAGES_ONLY: &str = "Please upload image files only";
pub const FILE_TOO_LARGE: &str = "File size should not exceed 5MB";
pub const UPLOAD_IN_PROGRESS: &str = "An upload is already in progress";
pub const UPLOAD_SUCCEEDED: &str = "Files uploaded successfully";
pub const UPLOAD_ERROR: &str = "An error occurred during file upload";

/// File picked by the user, as the browser reports it.
#[derive(Clone, Debug, Validate)]
pub struct SelectedFile {
    pub name: String,
    #[validate(custom(function = "validate_image_type"))]
    pub mime_type: String,
    #[validate(range(max = MAX_FILE_SIZE))]
    pub size: u64,
    pub content: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: content.len() as u64,
            content,
        }
    }
}

fn validate_image_type(mime_type: &str) -> Result<(), ValidationError> {
    if mime_type.starts_with("image/") {
        Ok(())
    } else {
        Err(ValidationError::new("image_only"))
    }
}

/// Inline preview of a selected file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn for_file(file: &SelectedFile) -> Self {
        Self(format!(
            "data:{};base64,{}",
            file.mime_type,
            STANDARD.encode(&file.content)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AlertLevel {
    Success,
    Error,
}

/// Message shown to the user after a submit attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FormState {
    #[default]
    Idle,
    Submitting,
}

/// Selection, previews and busy flag of the image upload form.
#[derive(Clone, Debug, Default)]
pub struct UploadForm {
    files: Vec<SelectedFile>,
    previews: Vec<PreviewUrl>,
    state: FormState,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current selection and its previews.
    pub fn select_files(&mut self, files: Vec<SelectedFile>) {
        self.previews = files.iter().map(PreviewUrl::for_file).collect();
        self.files = files;
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn previews(&self) -> &[PreviewUrl] {
        &self.previews
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    /// Whether the submit control is disabled.
    pub fn is_uploading(&self) -> bool {
        self.state == FormState::Submitting
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_uploading() {
            "Uploading..."
        } else {
            "Upload"
        }
    }

    /// Validate the selection and enter the submitting state.
    ///
    /// On rejection nothing changes and the alert explains why.
    pub fn begin_submit(&mut self) -> Result<UploadPayload, Alert> {
        if self.is_uploading() {
            return Err(Alert::error(UPLOAD_IN_PROGRESS));
        }
        validate_selection(&self.files)?;

        self.state = FormState::Submitting;
        Ok(UploadPayload::from_files(&self.files))
    }

    /// Leave the submitting state with the endpoint's answer.
    pub fn finish_submit(&mut self, result: Result<UploadResponse, ClientError>) -> Alert {
        self.state = FormState::Idle;
        match result {
            Ok(response) if response.success => {
                self.files.clear();
                self.previews.clear();
                Alert::success(UPLOAD_SUCCEEDED)
            }
            Ok(response) => Alert::error(format!("Failed to upload files: {}", response.message)),
            Err(err) => {
                log::error!("Upload request failed: {err:?}");
                Alert::error(UPLOAD_ERROR)
            }
        }
    }

    /// Validate, send and settle in one step.
    pub async fn submit<T>(&mut self, transport: &T) -> Alert
    where
        T: UploadTransport + ?Sized,
    {
        let payload = match self.begin_submit() {
            Ok(payload) => payload,
            Err(alert) => return alert,
        };
        let result = transport.send(payload).await;
        self.finish_submit(result)
    }
}

fn validate_selection(files: &[SelectedFile]) -> Result<(), Alert> {
    if files.is_empty() {
        return Err(Alert::error(SELECT_FILES));
    }

    for file in files {
        if let Err(errors) = file.validate() {
            let fields = errors.field_errors();
            return Err(if fields.contains_key("mime_type") {
                Alert::error(IMAGES_ONLY)
            } else {
                Alert::error(FILE_TOO_LARGE)
            });
        }
    }
    Ok(())
}
