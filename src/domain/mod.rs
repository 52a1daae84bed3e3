//! Strongly-typed domain structures for drive uploads.
use std::fmt;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// MIME type the provider uses to mark a node as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Content type used when a file part does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Width of the zero-padded batch folder names.
const SEQUENCE_WIDTH: usize = 4;

/// Identifier of a folder node on the remote drive.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FolderId(String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of an uploaded file on the remote drive.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Non-empty folder name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FolderName(String);

impl FolderName {
    pub fn try_new(value: impl Into<String>) -> Result<Self, TypeConstraintError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(TypeConstraintError::EmptyFolderName);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the batch folder following `existing` siblings.
    ///
    /// Takes the lexicographic maximum, reads its leading decimal digits and
    /// adds one. A maximum without leading digits restarts the counter at 1,
    /// which can reuse an existing `0001` folder. Past `9999` the names grow
    /// to five digits and stop sorting after `9999`.
    pub fn next_in_sequence<S: AsRef<str>>(existing: &[S]) -> Self {
        let last: Option<&str> = existing.iter().map(|name| name.as_ref()).max();
        let next = last.and_then(leading_number).map_or(1, |n| n.saturating_add(1));
        Self(format!("{next:0width$}", width = SEQUENCE_WIDTH))
    }
}

impl fmt::Display for FolderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn leading_number(name: &str) -> Option<u64> {
    let trimmed = name.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    digits.parse().ok()
}

/// Name a file is stored under on the drive, exactly as submitted.
///
/// Drive names are labels, not paths, so slashes and dots pass through.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct FileName(String);

impl FileName {
    pub fn try_new(value: String) -> Result<Self, TypeConstraintError> {
        if value.is_empty() {
            return Err(TypeConstraintError::EmptyFileName);
        }
        Ok(Self(value))
    }

    pub fn try_from_str(value: &str) -> Result<Self, TypeConstraintError> {
        Self::try_new(value.to_string())
    }

    /// Name for a part that arrived without a usable file name.
    pub fn generated() -> Self {
        Self(format!("upload-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One file received in an upload request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadFile {
    name: FileName,
    content_type: String,
    content: Bytes,
}

impl UploadFile {
    pub fn new(name: FileName, content_type: Option<String>, content: Bytes) -> Self {
        Self {
            name,
            content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            content,
        }
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// File stored on the drive as part of an upload batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UploadedFile {
    id: FileId,
    name: FileName,
}

impl UploadedFile {
    pub fn new(id: FileId, name: FileName) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> &FileId {
        &self.id
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    pub fn into_parts(self) -> (FileId, FileName) {
        (self.id, self.name)
    }
}

/// Remote folder node with its resolved identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FolderRef {
    pub id: FolderId,
    pub name: FolderName,
}


#[derive(Debug, Error)]
pub enum TypeConstraintError {
    #[error("folder name must not be empty")]
    EmptyFolderName,
    #[error("file name must not be empty")]
    EmptyFileName,
}
