use std::sync::Arc;

use crate::domain::{FolderId, FolderName, FolderRef, UploadFile, UploadedFile};
use crate::drive::{AccessToken, DriveProvider};
use crate::services::{ServiceError, ServiceResult};

/// Result of a completed upload batch.
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub folder: FolderRef,
    pub files: Vec<UploadedFile>,
}

/// Service placing upload batches into numbered folders on the drive.
#[derive(Clone)]
pub struct UploadService {
    drive: Arc<dyn DriveProvider>,
    root_folder: FolderName,
}

impl UploadService {
    pub fn new(drive: Arc<dyn DriveProvider>, root_folder: FolderName) -> Self {
        Self { drive, root_folder }
    }

    pub fn root_folder(&self) -> &FolderName {
        &self.root_folder
    }

    /// Obtain a fresh access token for this request.
    pub async fn authenticate(&self) -> ServiceResult<AccessToken> {
        self.drive
            .authenticate()
            .await
            .map_err(ServiceError::Authentication)
    }

    /// Return the folder named `name` (under `parent` if given), creating it
    /// when the lookup comes back empty.
    ///
    /// Lookup and creation are two provider calls. Two requests racing on the
    /// same name can both miss and both create.
    pub async fn resolve_or_create_folder(
        &self,
        token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> ServiceResult<FolderId> {
        let resolve_err = |source| ServiceError::ResolveFolder {
            name: name.to_string(),
            source,
        };

        if let Some(existing) = self
            .drive
            .find_folder(token, name, parent)
            .await
            .map_err(resolve_err)?
        {
            log::debug!("Reusing folder {name} ({existing})");
            return Ok(existing);
        }

        let created = self
            .drive
            .create_folder(token, name, parent)
            .await
            .map_err(resolve_err)?;
        log::info!("Created folder {name} ({created})");
        Ok(created)
    }

    /// Name for the next batch folder under `parent`.
    pub async fn next_sequential_folder_name(
        &self,
        token: &AccessToken,
        parent: &FolderId,
    ) -> ServiceResult<FolderName> {
        let names = self
            .drive
            .list_child_folder_names(token, parent)
            .await
            .map_err(|source| ServiceError::ResolveFolder {
                name: format!("children of {parent}"),
                source,
            })?;
        Ok(FolderName::next_in_sequence(&names))
    }

    /// Resolve the root folder, then the next numbered folder inside it.
    pub async fn resolve_batch_folder(&self, token: &AccessToken) -> ServiceResult<FolderRef> {
        let root_id = self
            .resolve_or_create_folder(token, &self.root_folder, None)
            .await?;
        let name = self.next_sequential_folder_name(token, &root_id).await?;
        let id = self
            .resolve_or_create_folder(token, &name, Some(&root_id))
            .await?;
        Ok(FolderRef { id, name })
    }

    /// Upload every file, in order, into a fresh batch folder.
    ///
    /// Authentication runs before anything else, so broken credentials fail
    /// the request even when it carries no files. The first failed upload
    /// stops the batch. Files uploaded before it stay on the drive.
    pub async fn handle_upload(&self, files: Vec<UploadFile>) -> ServiceResult<UploadOutcome> {
        let token = self.authenticate().await?;
        if files.is_empty() {
            return Err(ServiceError::NoFiles);
        }

        let folder = self.resolve_batch_folder(&token).await?;

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let id = self
                .drive
                .create_file(&token, &file, &folder.id)
                .await
                .map_err(|source| ServiceError::UploadFile {
                    file_name: file.name().to_string(),
                    source,
                })?;
            log::info!(
                "Uploaded {} ({} bytes) to {}/{} as {id}",
                file.name(),
                file.size(),
                self.root_folder,
                folder.name
            );
            uploaded.push(UploadedFile::new(id, file.name().clone()));
        }

        Ok(UploadOutcome {
            folder,
            files: uploaded,
        })
    }
}
