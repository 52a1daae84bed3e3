//! Application services orchestrating domain logic and side effects.
pub mod upload;

use crate::drive::DriveError;

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no files submitted")]
    NoFiles,
    #[error("drive authentication failed")]
    Authentication(#[source] DriveError),
    #[error("failed to resolve folder {name}")]
    ResolveFolder {
        name: String,
        #[source]
        source: DriveError,
    },
    #[error("failed to upload {file_name}")]
    UploadFile {
        file_name: String,
        #[source]
        source: DriveError,
    },
}

impl ServiceError {
    /// Whether the caller, rather than the server or the drive, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::NoFiles)
    }
}
