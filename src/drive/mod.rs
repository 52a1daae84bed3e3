//! Remote drive access.
//!
//! [`DriveProvider`] is the seam between the upload service and the storage
//! provider. [`google::GoogleDrive`] talks to Drive v3 through `google_drive3` and
//! [`memory::InMemoryDrive`] keeps everything in process.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{FileId, FolderId, FolderName, UploadFile};

pub mod google;
pub mod memory;

/// Convenience alias for provider results.
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors surfaced by a drive provider.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("token refresh failed")]
    Auth(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("token refresh returned no access token")]
    MissingToken,
    #[error("drive api request failed")]
    Api(#[from] google_drive3::Error),
    #[error("failed to set up drive client")]
    Setup(#[source] std::io::Error),
    #[error("drive unavailable: {0}")]
    Unavailable(String),
}

/// Short-lived bearer token obtained from [`DriveProvider::authenticate`].
#[derive(Clone, Eq, PartialEq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Operations the upload service needs from a storage provider.
///
/// Lookups and creations are separate calls, so find-or-create built on top
/// of them is not atomic.
#[async_trait]
pub trait DriveProvider: Send + Sync {
    /// Exchange the configured long-lived credentials for an access token.
    async fn authenticate(&self) -> DriveResult<AccessToken>;

    /// First folder named exactly `name`, restricted to children of `parent`
    /// when one is given.
    async fn find_folder(
        &self,
        token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<Option<FolderId>>;

    /// Create a folder, at the drive root when `parent` is `None`.
    async fn create_folder(
        &self,
        token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<FolderId>;

    /// Names of every folder directly under `parent`.
    async fn list_child_folder_names(
        &self,
        token: &AccessToken,
        parent: &FolderId,
    ) -> DriveResult<Vec<String>>;

    /// Store `file` inside `parent` and return its identifier.
    async fn create_file(
        &self,
        token: &AccessToken,
        file: &UploadFile,
        parent: &FolderId,
    ) -> DriveResult<FileId>;
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_query_value_handles_quotes() {
        assert_eq!(escape_query_value("Bob's"), "Bob\\'s");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
        assert_eq!(escape_query_value("0001"), "0001");
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert_eq!(format!("{token:?}"), "AccessToken(***)");
    }
}
