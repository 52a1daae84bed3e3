//! In-process drive used for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{AccessToken, DriveError, DriveProvider, DriveResult};
use crate::domain::{FOLDER_MIME_TYPE, FileId, FolderId, FolderName, UploadFile};

/// Node stored by [`InMemoryDrive`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredNode {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    pub content: Bytes,
}

impl StoredNode {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Default)]
struct DriveState {
    /// Creation order, so lookups return the oldest match like a listing would.
    order: Vec<String>,
    nodes: HashMap<String, StoredNode>,
    uploads_attempted: usize,
}

impl DriveState {
    fn iter(&self) -> impl Iterator<Item = &StoredNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    fn insert(&mut self, node: StoredNode) -> String {
        let id = node.id.clone();
        self.order.push(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }
}

/// Drive kept entirely in memory.
///
/// Failures can be injected for authentication and for the n-th file upload.
#[derive(Debug, Default)]
pub struct InMemoryDrive {
    state: Mutex<DriveState>,
    fail_authentication: bool,
    fail_upload_at: Option<usize>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every [`DriveProvider::authenticate`] call.
    pub fn with_failing_authentication(mut self) -> Self {
        self.fail_authentication = true;
        self
    }

    /// Fail the `attempt`-th call to [`DriveProvider::create_file`] (1-based).
    pub fn with_failing_upload(mut self, attempt: usize) -> Self {
        self.fail_upload_at = Some(attempt);
        self
    }

    /// Create a folder directly, bypassing authentication.
    pub fn seed_folder(&self, name: &str, parent: Option<&FolderId>) -> FolderId {
        let node = folder_node(name, parent);
        FolderId::new(self.state.lock().insert(node))
    }

    /// Folders named `name`, anywhere in the drive.
    pub fn folders_named(&self, name: &str) -> Vec<StoredNode> {
        self.state
            .lock()
            .iter()
            .filter(|node| node.is_folder() && node.name == name)
            .cloned()
            .collect()
    }

    /// Non-folder nodes whose parent is `parent`, in creation order.
    pub fn files_in(&self, parent: &FolderId) -> Vec<StoredNode> {
        self.state
            .lock()
            .iter()
            .filter(|node| !node.is_folder() && has_parent(node, Some(parent)))
            .cloned()
            .collect()
    }

    /// Number of `create_file` calls seen so far, failed ones included.
    pub fn uploads_attempted(&self) -> usize {
        self.state.lock().uploads_attempted
    }
}

fn folder_node(name: &str, parent: Option<&FolderId>) -> StoredNode {
    StoredNode {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        mime_type: FOLDER_MIME_TYPE.to_string(),
        parents: parent.map(|p| p.as_str().to_string()).into_iter().collect(),
        content: Bytes::new(),
    }
}

fn has_parent(node: &StoredNode, parent: Option<&FolderId>) -> bool {
    match parent {
        Some(parent) => node.parents.iter().any(|p| p == parent.as_str()),
        None => true,
    }
}

#[async_trait]
impl DriveProvider for InMemoryDrive {
    async fn authenticate(&self) -> DriveResult<AccessToken> {
        if self.fail_authentication {
            return Err(DriveError::Unavailable("refresh token rejected".into()));
        }
        Ok(AccessToken::new(format!("memory-{}", Uuid::new_v4())))
    }

    async fn find_folder(
        &self,
        _token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<Option<FolderId>> {
        let state = self.state.lock();
        Ok(state
            .iter()
            .find(|node| node.is_folder() && node.name == name.as_str() && has_parent(node, parent))
            .map(|node| FolderId::new(node.id.clone())))
    }

    async fn create_folder(
        &self,
        _token: &AccessToken,
        name: &FolderName,
        parent: Option<&FolderId>,
    ) -> DriveResult<FolderId> {
        let node = folder_node(name.as_str(), parent);
        Ok(FolderId::new(self.state.lock().insert(node)))
    }

    async fn list_child_folder_names(
        &self,
        _token: &AccessToken,
        parent: &FolderId,
    ) -> DriveResult<Vec<String>> {
        let state = self.state.lock();
        Ok(state
            .iter()
            .filter(|node| node.is_folder() && has_parent(node, Some(parent)))
            .map(|node| node.name.clone())
            .collect())
    }

    async fn create_file(
        &self,
        _token: &AccessToken,
        file: &UploadFile,
        parent: &FolderId,
    ) -> DriveResult<FileId> {
        let mut state = self.state.lock();
        state.uploads_attempted += 1;
        if self.fail_upload_at == Some(state.uploads_attempted) {
            return Err(DriveError::Unavailable(format!(
                "upload of {} interrupted",
                file.name()
            )));
        }

        let node = StoredNode {
            id: Uuid::new_v4().to_string(),
            name: file.name().as_str().to_string(),
            mime_type: file.content_type().to_string(),
            parents: vec![parent.as_str().to_string()],
            content: file.content().clone(),
        };
        Ok(FileId::new(state.insert(node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileName;

    fn image(name: &str) -> UploadFile {
        UploadFile::new(
            FileName::try_from_str(name).unwrap(),
            Some("image/png".into()),
            Bytes::from_static(b"png"),
        )
    }

    #[tokio::test]
    async fn find_folder_without_parent_matches_anywhere() {
        let drive = InMemoryDrive::new();
        let outer = drive.seed_folder("outer", None);
        let nested = drive.seed_folder("Customer Upload", Some(&outer));
        let token = drive.authenticate().await.unwrap();
        let name = FolderName::try_new("Customer Upload").unwrap();

        let found = drive.find_folder(&token, &name, None).await.unwrap();
        assert_eq!(found, Some(nested));

        let scoped = drive
            .find_folder(&token, &name, Some(&FolderId::new("elsewhere")))
            .await
            .unwrap();
        assert!(scoped.is_none());
    }

    #[tokio::test]
    async fn list_child_folder_names_skips_files_and_other_parents() {
        let drive = InMemoryDrive::new();
        let root = drive.seed_folder("root", None);
        let other = drive.seed_folder("other", None);
        drive.seed_folder("0001", Some(&root));
        drive.seed_folder("0009", Some(&other));
        let token = drive.authenticate().await.unwrap();
        drive
            .create_file(&token, &image("a.png"), &root)
            .await
            .unwrap();

        let names = drive.list_child_folder_names(&token, &root).await.unwrap();
        assert_eq!(names, vec!["0001"]);
    }

    #[tokio::test]
    async fn injected_upload_failure_hits_only_that_attempt() {
        let drive = InMemoryDrive::new().with_failing_upload(2);
        let folder = drive.seed_folder("batch", None);
        let token = drive.authenticate().await.unwrap();

        assert!(drive.create_file(&token, &image("1.png"), &folder).await.is_ok());
        assert!(drive.create_file(&token, &image("2.png"), &folder).await.is_err());
        assert!(drive.create_file(&token, &image("3.png"), &folder).await.is_ok());

        let names: Vec<String> = drive.files_in(&folder).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["1.png", "3.png"]);
        assert_eq!(drive.uploads_attempted(), 3);
    }

    #[tokio::test]
    async fn failing_authentication_is_reported() {
        let drive = InMemoryDrive::new().with_failing_authentication();
        assert!(matches!(
            drive.authenticate().await,
            Err(DriveError::Unavailable(_))
        ));
    }
}
